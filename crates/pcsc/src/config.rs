//! Configuration options for the monitor and card sessions

use std::time::Duration;

use cardaction_core::{InsertionTrigger, MonitorSettings};
use pcsc::{Protocols, ShareMode as PcscShareMode};

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card
    Shared,
    /// Direct connection to the reader
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// Options for the sessions opened on card insertion
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sharing mode for the session
    pub share_mode: ShareMode,
    /// Protocols offered when connecting
    pub protocols: Protocols,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Exclusive,
            protocols: Protocols::T0 | Protocols::T1,
        }
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the offered protocols
    pub const fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }
}

/// Options for the status-change monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Bound on each status-change wait; shutdown is observed within one interval
    pub timeout: Duration,
    /// Pause before retrying after an enumeration or wait failure
    pub retry_delay: Duration,
    /// Rule used to classify insertions
    pub insertion_trigger: InsertionTrigger,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&MonitorSettings::default())
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            retry_delay: settings.retry_delay(),
            insertion_trigger: settings.insertion_trigger,
        }
    }
}

impl MonitorConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wait timeout
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry delay
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the insertion rule
    pub const fn with_insertion_trigger(mut self, trigger: InsertionTrigger) -> Self {
        self.insertion_trigger = trigger;
        self
    }
}
