//! Entry point owning the PC/SC resource manager context

use cardaction_core::ReaderRoster;
use pcsc::{Context, Scope};

use crate::config::{MonitorConfig, SessionConfig};
use crate::error::PcscError;
use crate::monitor::StatusChangeMonitor;
use crate::reader::{build_roster, enumerate};
use crate::session::CardSessionTransmitter;

/// Manager for PC/SC device operations
///
/// The monitor and transmitter it hands out share one context.
#[allow(missing_debug_implementations)]
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
}

impl PcscDeviceManager {
    /// Establish a user-scope context with the resource manager
    pub fn new() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User).map_err(PcscError::ContextUnavailable)?;
        Ok(Self { context })
    }

    /// Enumerate readers and check each for a card
    pub fn list_readers(&self) -> Result<ReaderRoster, PcscError> {
        let names = enumerate(&self.context)?;
        Ok(build_roster(&self.context, &names, 1))
    }

    /// Create a status-change monitor
    pub fn monitor(&self, config: MonitorConfig) -> StatusChangeMonitor<Context> {
        StatusChangeMonitor::new(self.context.clone(), config)
    }

    /// Create an APDU transmitter
    pub fn transmitter(&self, config: SessionConfig) -> CardSessionTransmitter<Context> {
        CardSessionTransmitter::new(self.context.clone(), config)
    }

    /// The underlying PC/SC context
    pub const fn context(&self) -> &Context {
        &self.context
    }
}
