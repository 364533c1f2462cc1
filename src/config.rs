use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;

use crate::error::{Result, VaultError};

pub const VAULT_PATH_ENV: &str = "VAULT_PATH";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Process configuration. The engine itself only needs `vault_path`;
/// `log_level` is consumed by the binary's logger setup.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultConfig {
    pub vault_path: PathBuf,
    pub log_level: LevelFilter,
}

impl VaultConfig {
    pub fn new(vault_path: impl Into<PathBuf>) -> Self {
        Self {
            vault_path: vault_path.into(),
            log_level: LevelFilter::Info,
        }
    }

    /// Load from `VAULT_PATH` (required) and `LOG_LEVEL` (default `info`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vault_path = lookup(VAULT_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| VaultError::Config(format!("{} environment variable is required", VAULT_PATH_ENV)))?;

        let log_level = match lookup(LOG_LEVEL_ENV) {
            Some(level) if !level.trim().is_empty() => parse_log_level(&level)?,
            _ => LevelFilter::Info,
        };

        Ok(Self {
            vault_path: PathBuf::from(vault_path),
            log_level,
        })
    }
}

fn parse_log_level(level: &str) -> Result<LevelFilter> {
    // Python-style names are accepted as aliases.
    let level = match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        other => other.to_string(),
    };
    LevelFilter::from_str(&level)
        .map_err(|_| VaultError::Config(format!("invalid {}: {:?}", LOG_LEVEL_ENV, level)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_vault_path_is_required() {
        let err = VaultConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err.kind(), "config");

        let err = VaultConfig::from_lookup(lookup(&[("VAULT_PATH", "  ")])).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_defaults_to_info() {
        let config = VaultConfig::from_lookup(lookup(&[("VAULT_PATH", "/vault")])).unwrap();
        assert_eq!(config, VaultConfig::new("/vault"));
    }

    #[test]
    fn test_log_level_parsing() {
        for (raw, expected) in [
            ("DEBUG", LevelFilter::Debug),
            ("warning", LevelFilter::Warn),
            ("Error", LevelFilter::Error),
            ("off", LevelFilter::Off),
        ] {
            let config =
                VaultConfig::from_lookup(lookup(&[("VAULT_PATH", "/v"), ("LOG_LEVEL", raw)])).unwrap();
            assert_eq!(config.log_level, expected, "LOG_LEVEL={}", raw);
        }

        let err = VaultConfig::from_lookup(lookup(&[("VAULT_PATH", "/v"), ("LOG_LEVEL", "loud")]))
            .unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
