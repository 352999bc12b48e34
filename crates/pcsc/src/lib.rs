//! PC/SC engine for card-triggered actions
//!
//! This crate watches every smart card reader attached to the system, reports
//! card insertions, removals and reader topology changes over a channel, and
//! runs short APDU exchanges against freshly inserted cards.
//!
//! # Features
//!
//! - `mock`: expose [`mock::MockBackend`], a scriptable in-memory backend
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cardaction_pcsc::{MonitorConfig, MonitorEvent, PcscDeviceManager, SessionConfig, event_channel};
//!
//! let manager = PcscDeviceManager::new()?;
//! let transmitter = manager.transmitter(SessionConfig::default());
//!
//! let (tx, rx) = event_channel();
//! let handle = manager.monitor(MonitorConfig::default()).spawn(tx)?;
//!
//! let mut roster = Default::default();
//! for event in rx.iter() {
//!     match event {
//!         MonitorEvent::ReaderListChanged(new) => roster = new,
//!         MonitorEvent::CardInserted(id) => {
//!             if let Some(reader) = roster.get(id) {
//!                 let responses = transmitter.exchange(&reader.name, &["00A4040000"]);
//!                 println!("{}: {:?}", reader.name, responses);
//!                 break;
//!             }
//!         }
//!         MonitorEvent::CardRemoved(_) => {}
//!     }
//! }
//!
//! handle.shutdown();
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
pub mod event;
mod manager;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod monitor;
mod reader;
mod session;

pub use backend::{CardBackend, CardHandle, Framing, WaitSlot};
pub use config::{MonitorConfig, SessionConfig, ShareMode};
pub use error::PcscError;
pub use event::{EventReceiver, EventSender, MonitorEvent, event_channel};
pub use manager::PcscDeviceManager;
pub use monitor::{MonitorHandle, StatusChangeMonitor};
pub use reader::{build_roster, rebuild_roster};
pub use session::CardSessionTransmitter;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols, State};
