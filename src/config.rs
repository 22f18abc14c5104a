//! Plugin settings, read from the environment when Unity loads the plugin.
//!
//! Unity gives native plugins no configuration channel of their own, so the knobs live in
//! environment variables of the editor or player process:
//!
//! - `UNITY_TEXTURE_READER_LOG`: log level spec in `flexi_logger` syntax (`info`,
//!   `texture_reader=trace`, ...).
//! - `UNITY_TEXTURE_READER_LOG_DIR`: directory receiving the log file.
//! - `UNITY_TEXTURE_READER_LOG_TO_FILE`: set to `0`, `false`, `no` or `off` to disable logging.

use std::path::PathBuf;

pub const LOG_SPEC_VAR: &str = "UNITY_TEXTURE_READER_LOG";
pub const LOG_DIR_VAR: &str = "UNITY_TEXTURE_READER_LOG_DIR";
pub const LOG_TO_FILE_VAR: &str = "UNITY_TEXTURE_READER_LOG_TO_FILE";

#[cfg(debug_assertions)]
const DEFAULT_LOG_SPEC: &str = "debug";
#[cfg(not(debug_assertions))]
const DEFAULT_LOG_SPEC: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub log_spec: String,
    pub log_directory: Option<PathBuf>,
    pub log_to_file: bool,
    /// Variables that were set to something unusable, as `(name, value)`. Reported once the
    /// logger is up.
    pub unrecognized: Vec<(&'static str, String)>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            log_spec: DEFAULT_LOG_SPEC.to_owned(),
            log_directory: None,
            log_to_file: true,
            unrecognized: Vec::new(),
        }
    }
}

impl PluginConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(log_spec) = lookup(LOG_SPEC_VAR) {
            config.log_spec = log_spec;
        }

        config.log_directory = lookup(LOG_DIR_VAR).map(PathBuf::from);

        if let Some(value) = lookup(LOG_TO_FILE_VAR) {
            match parse_toggle(&value) {
                Some(enabled) => config.log_to_file = enabled,
                None => config.unrecognized.push((LOG_TO_FILE_VAR, value)),
            }
        }

        config
    }

    pub fn with_log_to_file(mut self, log_to_file: bool) -> Self {
        self.log_to_file = log_to_file;
        self
    }
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> PluginConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        PluginConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config_from(&[]), PluginConfig::default());
        assert!(PluginConfig::default().log_to_file);
        assert!(PluginConfig::default().log_directory.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            (LOG_SPEC_VAR, "texture_reader=trace"),
            (LOG_DIR_VAR, "C:/Logs/Unity"),
            (LOG_TO_FILE_VAR, "yes"),
        ]);

        assert_eq!(config.log_spec, "texture_reader=trace");
        assert_eq!(config.log_directory, Some(PathBuf::from("C:/Logs/Unity")));
        assert!(config.log_to_file);
    }

    #[test]
    fn file_logging_can_be_switched_off() {
        for value in ["0", "false", "OFF", " No "] {
            assert!(!config_from(&[(LOG_TO_FILE_VAR, value)]).log_to_file);
        }
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = config_from(&[(LOG_SPEC_VAR, "   "), (LOG_DIR_VAR, "")]);

        assert_eq!(config, PluginConfig::default());
    }

    #[test]
    fn unknown_toggle_is_kept_for_reporting() {
        let config = config_from(&[(LOG_TO_FILE_VAR, " sometimes ")]);

        assert!(config.log_to_file);
        assert_eq!(
            config.unrecognized,
            vec![(LOG_TO_FILE_VAR, "sometimes".to_owned())]
        );
    }
}
