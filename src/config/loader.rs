//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ObservabilityConfig;
use crate::config::validation::{normalize, ValidationWarning};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse and normalize a TOML document, returning the adjustments made.
pub fn parse_config_with_warnings(
    content: &str,
) -> Result<(ObservabilityConfig, Vec<ValidationWarning>), ConfigError> {
    let mut config: ObservabilityConfig = toml::from_str(content)?;
    let warnings = normalize(&mut config);
    Ok((config, warnings))
}

/// Read a TOML file without logging. Used before the subscriber exists.
pub fn read_config(path: &Path) -> Result<(ObservabilityConfig, Vec<ValidationWarning>), ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_with_warnings(&content)
}

pub fn log_warnings(warnings: &[ValidationWarning]) {
    for warning in warnings {
        tracing::warn!(field = warning.field, "Config value adjusted: {}", warning.message);
    }
}

/// Parse and normalize a TOML document. Adjustments are logged as warnings.
pub fn parse_config(content: &str) -> Result<ObservabilityConfig, ConfigError> {
    let (config, warnings) = parse_config_with_warnings(content)?;
    log_warnings(&warnings);
    Ok(config)
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ObservabilityConfig, ConfigError> {
    let (config, warnings) = read_config(path)?;
    log_warnings(&warnings);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/ledger-obs.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_config("[logger\nmin_level = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_parse_normalizes() {
        let (config, warnings) = parse_config_with_warnings("[buffer]\nmax_size = 0\n").unwrap();
        assert_eq!(config.buffer.max_size, 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "buffer.max_size");
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("ledger-obs-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "log_level = \"debug\"\n[admin]\nenabled = true\n").unwrap();
        let config = load_config(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(config.log_level, "debug");
        assert!(config.admin.enabled);
    }
}
