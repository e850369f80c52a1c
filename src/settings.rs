//! Optional `cfgtree.toml` settings file.
//!
//! Every key may be left out; missing keys (or a missing file) fall back to
//! [`Settings::default`]. Command-line flags override whatever is loaded.

use crate::cli::CliArgs;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Fail loading on unresolved parents or inheritance cycles.
    pub strict: bool,
    /// File name collected when a directory is given.
    pub config_file_name: String,
    /// Print reports as JSON.
    pub json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_owned(),
            strict: true,
            config_file_name: "config.cpp".to_owned(),
            json: false,
        }
    }
}

impl Settings {
    pub const DEFAULT_PATH: &'static str = "cfgtree.toml";

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }
        if args.json {
            self.json = true;
        }
        if args.lenient {
            self.strict = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Command;

    fn args() -> CliArgs {
        CliArgs {
            settings: None,
            log_level: None,
            json: false,
            lenient: false,
            command: Command::Check { paths: Vec::new() },
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("cfgtree.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfgtree.toml");
        std::fs::write(&path, "strict = false\nconfig_file_name = \"mod.cpp\"\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert!(!settings.strict);
        assert_eq!(settings.config_file_name, "mod.cpp");
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfgtree.toml");
        std::fs::write(&path, "strict = maybe").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_cli_override() {
        let mut settings = Settings::default();
        let args = CliArgs {
            log_level: Some("debug".to_owned()),
            json: true,
            lenient: true,
            ..args()
        };
        settings.apply_cli_overrides(&args);
        assert_eq!(settings.log_level, "debug");
        assert!(settings.json);
        assert!(!settings.strict);
    }

    #[test]
    fn test_cli_no_override() {
        let mut settings = Settings::default();
        settings.apply_cli_overrides(&args());
        assert_eq!(settings, Settings::default());
    }
}
