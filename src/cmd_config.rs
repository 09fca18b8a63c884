//! Configuration subcommand handlers for Cronos.

use std::path::Path;

use cronos_config::{Config, ConfigValidator};

use crate::cli::ConfigAction;

/// Handle config subcommands.
pub(crate) fn handle_config_command(
    action: ConfigAction,
    config_path: &Path,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Check => config_check(config_path, config),
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn config_check(config_path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() {
        println!("Config: {}", config_path.display());
    } else {
        println!("Config: {} (not found, using defaults)", config_path.display());
    }

    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if result.is_valid() {
        println!("Configuration is valid");
        Ok(())
    } else {
        Err(format!("{} configuration error(s)", result.errors.len()).into())
    }
}
