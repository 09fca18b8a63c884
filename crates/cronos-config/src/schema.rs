//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use cronos_core::{AgentModel, ExecutionSettings, ShellSettings};

use crate::error::ConfigError;
use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    /// Storage root with `~` expanded.
    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.storage.root))
    }

    /// PID file path, defaulting to `<storage root>/cronos.pid`.
    pub fn pid_file(&self) -> PathBuf {
        match &self.daemon.pid_file {
            Some(path) => PathBuf::from(ConfigLoader::expand_path(path)),
            None => self.storage_root().join("cronos.pid"),
        }
    }

    /// Directory for the daemon's own rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.storage_root().join("debug")
    }

    /// Execution settings derived from the `[execution]` section.
    pub fn execution_settings(&self) -> Result<ExecutionSettings, ConfigError> {
        let default_model = self
            .execution
            .default_model
            .parse::<AgentModel>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "execution.default_model".to_string(),
                message: e.to_string(),
            })?;

        Ok(ExecutionSettings {
            shell: ShellSettings {
                path: PathBuf::from(ConfigLoader::expand_path(&self.execution.shell)),
                login: self.execution.login_shell,
                interactive: self.execution.interactive_shell,
            },
            default_model,
            agent_binary: self.execution.agent_binary.clone(),
        })
    }
}

/// Where jobs, run history and logs are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> String {
    "~/.cronos".to_string()
}

/// How job commands are launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default = "default_true")]
    pub login_shell: bool,

    #[serde(default = "default_true")]
    pub interactive_shell: bool,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_agent_binary")]
    pub agent_binary: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            login_shell: true,
            interactive_shell: true,
            default_model: default_model(),
            agent_binary: default_agent_binary(),
        }
    }
}

fn default_shell() -> String {
    cronos_core::settings::DEFAULT_SHELL.to_string()
}

fn default_model() -> String {
    AgentModel::default().as_str().to_string()
}

fn default_agent_binary() -> String {
    cronos_core::settings::DEFAULT_AGENT_BINARY.to_string()
}

fn default_true() -> bool {
    true
}

/// Run-completion notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `log`, `desktop` or `none`.
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_backend(),
        }
    }
}

fn default_backend() -> String {
    "desktop".to_string()
}

/// Daemon log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write daily-rotated log files under `<storage root>/debug`.
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: true,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Daemon process settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub pid_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.root, "~/.cronos");
        assert_eq!(config.execution.shell, "/bin/zsh");
        assert!(config.execution.login_shell);
        assert!(config.execution.interactive_shell);
        assert_eq!(config.execution.default_model, "sonnet");
        assert_eq!(config.notifications.backend, "desktop");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_storage_root_is_expanded() {
        let config = Config::default();
        assert!(!config.storage_root().to_string_lossy().starts_with('~'));
        assert!(config.storage_root().ends_with(".cronos"));
    }

    #[test]
    fn test_pid_file_defaults_under_root() {
        let config = Config::default();
        assert_eq!(config.pid_file(), config.storage_root().join("cronos.pid"));
    }

    #[test]
    fn test_execution_settings() {
        let mut config = Config::default();
        config.execution.shell = "/bin/bash".to_string();
        config.execution.interactive_shell = false;
        config.execution.default_model = "Haiku".to_string();

        let settings = config.execution_settings().unwrap();
        assert_eq!(settings.shell.path, PathBuf::from("/bin/bash"));
        assert!(settings.shell.login);
        assert!(!settings.shell.interactive);
        assert_eq!(settings.default_model, AgentModel::Haiku);
    }

    #[test]
    fn test_execution_settings_rejects_unknown_model() {
        let mut config = Config::default();
        config.execution.default_model = "gpt".to_string();
        assert!(matches!(
            config.execution_settings(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
