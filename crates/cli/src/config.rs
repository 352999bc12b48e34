//! Configuration loading

use std::path::{Path, PathBuf};

use cardaction_core::ActionConfig;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

/// Prefix for environment overrides, e.g. `CARDACTION_ON_INSERT__COMMAND`
const ENV_PREFIX: &str = "CARDACTION_";

/// The running executable's path with a `.toml` extension
pub(crate) fn default_config_path() -> eyre::Result<PathBuf> {
    Ok(std::env::current_exe()?.with_extension("toml"))
}

/// Load the action configuration from `path` merged with environment overrides.
///
/// A missing file is not an error; every field then takes its default.
pub(crate) fn load_config(path: &Path) -> eyre::Result<ActionConfig> {
    Ok(Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardaction_core::InsertionTrigger;
    use figment::Jail;
    use std::time::Duration;

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_| {
            let config = load_config(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config, ActionConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_are_merged() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cardaction.toml",
                r#"
                [on_insert]
                command = "notify {1} {2}"
                apdus = "00A4 0400 00, 00CA9F7F00"

                [on_remove]
                command = "notify removed"

                [monitor]
                timeout_ms = 250
                insertion_trigger = "presence"
                "#,
            )?;
            jail.set_env("CARDACTION_ON_REMOVE__COMMAND", "lock-screen");

            let config = load_config(Path::new("cardaction.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.insert_command, "notify {1} {2}");
            assert_eq!(config.insert_apdus, ["00A4040000", "00CA9F7F00"]);
            assert_eq!(config.remove_command, "lock-screen");
            assert_eq!(config.monitor.timeout(), Duration::from_millis(250));
            assert_eq!(config.monitor.insertion_trigger, InsertionTrigger::Presence);
            Ok(())
        });
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("cardaction.toml", "[monitor]\ntimeout_ms = 0\n")?;
            let err = load_config(Path::new("cardaction.toml")).unwrap_err();
            assert!(err.to_string().contains("timeout_ms"));
            Ok(())
        });
    }
}
