//! Runtime-wide configuration.
//!
//! Configuration comes from the environment (`DYNK_DEBUG`,
//! `DYNK_THROW_COMPAT`) or from a TOML file with a `[runtime]` table:
//!
//! ```toml
//! [runtime]
//! debug = true
//! throw_compat = "name_error"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape of the error raised by an uncaught `throw` on the primary thread.
///
/// Both shapes are historical behaviors of the language; one is selected for
/// the whole runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrowCompat {
    /// Raise a `NameError` carrying the tag as its name
    NameError,
    /// Raise an `ArgumentError`
    #[default]
    ArgumentError,
}

impl ThrowCompat {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name_error" => Some(ThrowCompat::NameError),
            "argument_error" => Some(ThrowCompat::ArgumentError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Global debug flag: raise prints a one-line summary when set
    pub debug: bool,
    pub throw_compat: ThrowCompat,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    runtime: RuntimeConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error reading {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (used by `from_env`).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = lookup("DYNK_DEBUG").is_some();
        let throw_compat = lookup("DYNK_THROW_COMPAT")
            .and_then(|v| ThrowCompat::from_env_value(&v))
            .unwrap_or_default();
        Self {
            debug,
            throw_compat,
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        Ok(file.runtime)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Render as a config file that `from_toml_str` accepts
    pub fn to_toml_string(&self) -> String {
        let file = ConfigFile { runtime: *self };
        toml::to_string(&file).unwrap_or_default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_throw_compat(mut self, throw_compat: ThrowCompat) -> Self {
        self.throw_compat = throw_compat;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert!(!config.debug);
        assert_eq!(config.throw_compat, ThrowCompat::ArgumentError);
    }

    #[test]
    fn test_from_lookup() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("DYNK_DEBUG", "1"),
            ("DYNK_THROW_COMPAT", "Name_Error"),
        ]));
        assert!(config.debug);
        assert_eq!(config.throw_compat, ThrowCompat::NameError);
    }

    #[test]
    fn test_from_lookup_ignores_unknown_mode() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[("DYNK_THROW_COMPAT", "strict")]));
        assert!(!config.debug);
        assert_eq!(config.throw_compat, ThrowCompat::ArgumentError);
    }

    #[test]
    fn test_from_toml_str() {
        let config = RuntimeConfig::from_toml_str(
            r#"
[runtime]
debug = true
throw_compat = "name_error"
"#,
        )
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.throw_compat, ThrowCompat::NameError);
    }

    #[test]
    fn test_from_toml_str_empty_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_mode() {
        let err = RuntimeConfig::from_toml_str("[runtime]\nthrow_compat = \"loose\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn test_to_toml_string_is_accepted_back() {
        let config = RuntimeConfig::default()
            .with_debug(true)
            .with_throw_compat(ThrowCompat::NameError);
        let text = config.to_toml_string();
        assert!(text.contains("throw_compat = \"name_error\""), "{}", text);
        assert_eq!(RuntimeConfig::from_toml_str(&text).unwrap(), config);
    }
}
