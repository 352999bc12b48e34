//! Event delivery from the monitor thread to the handling context

pub mod channel;
pub use channel::*;

pub use cardaction_core::MonitorEvent;
