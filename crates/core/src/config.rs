//! Action configuration
//!
//! The configuration is read once at startup and is immutable afterwards.
//! Absent or empty fields fall back to documented defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[cfg(windows)]
const DEFAULT_INSERT_COMMAND: &str = r"cmd.exe /c echo Card inserted > %TEMP%\card_inserted.txt";
#[cfg(windows)]
const DEFAULT_REMOVE_COMMAND: &str = r"cmd.exe /c echo Card removed > %TEMP%\card_removed.txt";
#[cfg(not(windows))]
const DEFAULT_INSERT_COMMAND: &str = "echo Card inserted > ${TMPDIR:-/tmp}/card_inserted.txt";
#[cfg(not(windows))]
const DEFAULT_REMOVE_COMMAND: &str = "echo Card removed > ${TMPDIR:-/tmp}/card_removed.txt";

const DEFAULT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Rule used to decide that a changed reader slot means a card was inserted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertionTrigger {
    /// The card became in use, outside of an exclusive session
    #[default]
    InUse,
    /// The card became present
    Presence,
}

/// Timing and classification settings for the reader monitor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Bound on each status-change wait, in milliseconds
    pub timeout_ms: u64,
    /// Delay before retrying after an enumeration or wait failure, in milliseconds
    pub retry_delay_ms: u64,
    /// Insertion classification rule
    pub insertion_trigger: InsertionTrigger,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            insertion_trigger: InsertionTrigger::default(),
        }
    }
}

impl MonitorSettings {
    /// Bound on each status-change wait
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retrying a failed cycle
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// What to do when cards come and go
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct ActionConfig {
    /// Hex-encoded APDUs sent, in order, to a freshly inserted card
    pub insert_apdus: Vec<String>,
    /// Command line run on insertion; `{n}` is replaced by the n-th response
    pub insert_command: String,
    /// Command line run on removal, verbatim
    pub remove_command: String,
    /// Monitor settings
    pub monitor: MonitorSettings,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            insert_apdus: Vec::new(),
            insert_command: DEFAULT_INSERT_COMMAND.to_string(),
            remove_command: DEFAULT_REMOVE_COMMAND.to_string(),
            monitor: MonitorSettings::default(),
        }
    }
}

/// APDUs may be written as a list or as one comma-separated string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApduList {
    Joined(String),
    List(Vec<String>),
}

impl Default for ApduList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ApduList {
    /// Split on commas, strip all whitespace and drop empty entries
    fn normalize(self) -> Vec<String> {
        let entries = match self {
            Self::Joined(s) => vec![s],
            Self::List(v) => v,
        };
        entries
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(|apdu| apdu.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|apdu| !apdu.is_empty())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InsertSection {
    command: Option<String>,
    apdus: ApduList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoveSection {
    command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    on_insert: InsertSection,
    on_remove: RemoveSection,
    monitor: MonitorSettings,
}

fn or_default(command: Option<String>, default: &str) -> String {
    match command {
        Some(c) if !c.trim().is_empty() => c,
        _ => default.to_string(),
    }
}

impl TryFrom<RawConfig> for ActionConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        if raw.monitor.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let config = Self {
            insert_apdus: raw.on_insert.apdus.normalize(),
            insert_command: or_default(raw.on_insert.command, DEFAULT_INSERT_COMMAND),
            remove_command: or_default(raw.on_remove.command, DEFAULT_REMOVE_COMMAND),
            monitor: raw.monitor,
        };
        tracing::debug!(apdus = config.insert_apdus.len(), "loaded action config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<ActionConfig, toml::de::Error> {
        toml::from_str(s)
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(parse("").unwrap(), ActionConfig::default());
    }

    #[test]
    fn test_full_document() {
        let config = parse(
            r#"
            [on_insert]
            command = "echo {1}"
            apdus = ["00A4040000", " 00CA 0000 00 "]

            [on_remove]
            command = "echo gone"

            [monitor]
            timeout_ms = 250
            insertion_trigger = "presence"
            "#,
        )
        .unwrap();

        assert_eq!(config.insert_apdus, ["00A4040000", "00CA000000"]);
        assert_eq!(config.insert_command, "echo {1}");
        assert_eq!(config.remove_command, "echo gone");
        assert_eq!(config.monitor.timeout(), Duration::from_millis(250));
        assert_eq!(config.monitor.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.monitor.insertion_trigger, InsertionTrigger::Presence);
    }

    #[test]
    fn test_comma_separated_apdus() {
        let config = parse(
            r#"
            [on_insert]
            apdus = "00A4040000, ,00B0000000,"
            "#,
        )
        .unwrap();
        assert_eq!(config.insert_apdus, ["00A4040000", "00B0000000"]);
    }

    #[test]
    fn test_empty_commands_fall_back() {
        let config = parse(
            r#"
            [on_insert]
            command = "  "
            [on_remove]
            command = ""
            "#,
        )
        .unwrap();
        assert_eq!(config.insert_command, DEFAULT_INSERT_COMMAND);
        assert_eq!(config.remove_command, DEFAULT_REMOVE_COMMAND);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = parse("[monitor]\ntimeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
