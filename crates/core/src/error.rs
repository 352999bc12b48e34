//! Error types for configuration

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The status-change wait needs a non-zero bound to observe shutdown
    #[error("monitor timeout_ms must be greater than zero")]
    ZeroTimeout,
}
