use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::registry::DEFAULT_FALLBACK_COLOUR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Editor-level knobs for the type checker.
///
/// ```toml
/// gc_debounce_ms = 500
/// fallback_colour = "RosyBrown"
/// warning = "this expression contains type errors"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_gc_debounce_ms")]
    pub gc_debounce_ms: u64,
    #[serde(default = "default_fallback_colour")]
    pub fallback_colour: String,
    #[serde(default = "default_warning")]
    pub warning: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gc_debounce_ms: default_gc_debounce_ms(),
            fallback_colour: default_fallback_colour(),
            warning: default_warning(),
        }
    }
}

fn default_gc_debounce_ms() -> u64 {
    500
}

fn default_fallback_colour() -> String {
    DEFAULT_FALLBACK_COLOUR.to_string()
}

fn default_warning() -> String {
    "this expression contains type errors".to_string()
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn gc_debounce(&self) -> Duration {
        Duration::from_millis(self.gc_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
        assert_eq!(Config::default().gc_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str("gc_debounce_ms = 20\nfallback_colour = \"Silver\"").unwrap();
        assert_eq!(config.gc_debounce_ms, 20);
        assert_eq!(config.fallback_colour, "Silver");
        assert_eq!(config.warning, Config::default().warning);
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(matches!(
            Config::from_toml_str("gc_debounce_ms = \"soon\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
