//! Error types for the PC/SC engine

use std::fmt;

/// Failures that cannot be absorbed into a degraded result
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    Pcsc(#[from] pcsc::Error),

    /// The PC/SC resource manager context could not be established
    ContextUnavailable(#[source] pcsc::Error),

    /// The monitor thread could not be started
    MonitorSpawn(#[source] std::io::Error),
}

impl fmt::Display for PcscError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcsc(e) => write!(f, "PC/SC error: {}", e),
            Self::ContextUnavailable(e) => {
                write!(f, "Failed to establish smart card context: {}", e)
            }
            Self::MonitorSpawn(e) => write!(f, "Failed to start card monitor: {}", e),
        }
    }
}
