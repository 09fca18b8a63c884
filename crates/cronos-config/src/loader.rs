//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};

use crate::error::ConfigError;
use crate::schema::Config;

/// `~/.cronos/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".cronos").join("config.toml"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a TOML file, falling back to defaults when it
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a string.
    ///
    /// `${VAR}` references are expanded inside string values only, after
    /// parsing, so comments and keys are never touched.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let mut document: toml::Value = toml::from_str(content)?;
        Self::expand_env_vars(&mut document)?;
        let config: Config = document.try_into()?;
        Ok(config)
    }

    /// Expand `${VAR}` in every string of a parsed document.
    fn expand_env_vars(document: &mut toml::Value) -> Result<(), ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "pattern".to_string(),
            message: e.to_string(),
        })?;
        expand_value(document, &re)
    }

    /// Expand shell-style paths (e.g., `~/.cronos`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

fn expand_value(value: &mut toml::Value, re: &Regex) -> Result<(), ConfigError> {
    match value {
        toml::Value::String(text) => *text = expand_str(text, re)?,
        toml::Value::Array(items) => {
            for item in items {
                expand_value(item, re)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_value(item, re)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn expand_str(text: &str, re: &Regex) -> Result<String, ConfigError> {
    let mut missing = None;
    let expanded = re.replace_all(text, |caps: &Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        })
    });
    match missing {
        Some(name) => Err(ConfigError::EnvVarNotSet(name)),
        None => Ok(expanded.into_owned()),
    }
}
