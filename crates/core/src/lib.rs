//! Core types for smart card insertion actions
//!
//! This crate holds the hardware-independent pieces of the card action
//! engine:
//!
//! - [`ReaderRoster`] and [`ReaderId`], the generation-tagged reader snapshot
//!   the monitor hands to its consumer
//! - [`MonitorEvent`], the closed set of events flowing from the monitor
//! - [`CardResponse`] and the hex codec used for APDUs and their responses
//! - [`render_command`], the `{n}` placeholder substitution for action commands
//! - [`ActionConfig`], the immutable action configuration
//!
//! ```
//! use cardaction_core::{decode_hex, encode_hex, render_command};
//!
//! let apdu = decode_hex("00A4040000").unwrap();
//! assert_eq!(apdu.len(), 5);
//!
//! let response = encode_hex(&[0x90, 0x00]);
//! assert_eq!(render_command("echo {1}", &[response]), "echo 9000");
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod response;
pub mod roster;
mod template;

pub use codec::{decode_hex, encode_hex};
pub use config::{ActionConfig, InsertionTrigger, MonitorSettings};
pub use error::ConfigError;
pub use event::MonitorEvent;
pub use response::CardResponse;
pub use roster::{ReaderId, ReaderRecord, ReaderRoster};
pub use template::render_command;
