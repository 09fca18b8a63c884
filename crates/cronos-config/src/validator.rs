//! Configuration validation.

use std::path::Path;

use cronos_core::settings::KNOWN_SHELLS;
use cronos_core::AgentModel;

use crate::loader::ConfigLoader;
use crate::schema::Config;

const NOTIFICATION_BACKENDS: [&str; 3] = ["log", "desktop", "none"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_storage(config, &mut result);
        Self::validate_execution(config, &mut result);
        Self::validate_notifications(config, &mut result);

        result
    }

    fn validate_storage(config: &Config, result: &mut ValidationResult) {
        if config.storage.root.trim().is_empty() {
            result.add_error(ValidationError::new(
                "storage.root",
                "Storage root cannot be empty",
            ));
        }
    }

    fn validate_execution(config: &Config, result: &mut ValidationResult) {
        let shell = &config.execution.shell;
        if shell.is_empty() {
            result.add_error(ValidationError::new("execution.shell", "Shell cannot be empty"));
        } else if !shell.starts_with('/') && !shell.starts_with('~') {
            result.add_error(ValidationError::new(
                "execution.shell",
                format!("Shell must be an absolute path, got '{}'", shell),
            ));
        } else if !KNOWN_SHELLS.contains(&shell.as_str()) {
            result.add_warning(ValidationWarning::new(
                "execution.shell",
                format!("'{}' is not one of the usual shells {:?}", shell, KNOWN_SHELLS),
            ));
        }

        let expanded = ConfigLoader::expand_path(shell);
        if !shell.is_empty() && !Path::new(&expanded).exists() {
            result.add_warning(ValidationWarning::new(
                "execution.shell",
                format!("Shell does not exist: {}", expanded),
            ));
        }

        if config.execution.default_model.parse::<AgentModel>().is_err() {
            result.add_error(ValidationError::new(
                "execution.default_model",
                format!(
                    "Unknown model '{}', valid values: {:?}",
                    config.execution.default_model,
                    AgentModel::ALL.map(|m| m.as_str())
                ),
            ));
        }

        if config.execution.agent_binary.trim().is_empty() {
            result.add_error(ValidationError::new(
                "execution.agent_binary",
                "Agent binary cannot be empty",
            ));
        }
    }

    fn validate_notifications(config: &Config, result: &mut ValidationResult) {
        let backend = config.notifications.backend.as_str();
        if !NOTIFICATION_BACKENDS.contains(&backend) {
            result.add_error(ValidationError::new(
                "notifications.backend",
                format!(
                    "Unknown notification backend '{}', valid values: {:?}",
                    backend, NOTIFICATION_BACKENDS
                ),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
