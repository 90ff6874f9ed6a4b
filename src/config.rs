//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! lenient_fields = true
//! lines_per_page = 60
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Upper bound for `max_eval_depth`. Deeper evaluation would exhaust the
/// thread stack before the limit is reached.
pub const MAX_EVAL_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Render undeclared fields as a visible sentinel instead of failing
    pub lenient_fields: bool,
    pub max_eval_depth: usize,
    /// Default for groups that do not set `case_sensitive`
    pub case_sensitive_order: bool,
    pub lines_per_page: usize,
    pub drop_trailing_empty_page: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lenient_fields: false,
            max_eval_depth: 64,
            case_sensitive_order: true,
            lines_per_page: 40,
            drop_trailing_empty_page: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lines_per_page == 0 {
            return Err(ConfigError::Invalid("lines_per_page must be at least 1".into()));
        }
        if self.max_eval_depth == 0 {
            return Err(ConfigError::Invalid("max_eval_depth must be at least 1".into()));
        }
        if self.max_eval_depth > MAX_EVAL_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "max_eval_depth must be at most {}, got {}",
                MAX_EVAL_DEPTH, self.max_eval_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = EngineConfig::from_toml_str("lenient_fields = true").unwrap();
        assert!(config.lenient_fields);
        assert_eq!(config.lines_per_page, 40);
        assert_eq!(config.max_eval_depth, 64);
    }

    #[test]
    fn rejects_unknown_keys_and_zero_page_height() {
        assert!(matches!(
            EngineConfig::from_toml_str("page_height = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("lines_per_page = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
