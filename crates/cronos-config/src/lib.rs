//! # Cronos Config
//!
//! TOML configuration for the Cronos daemon and CLI.
//!
//! ```toml
//! [storage]
//! root = "~/.cronos"
//!
//! [execution]
//! shell = "/bin/zsh"
//! default_model = "sonnet"
//!
//! [notifications]
//! backend = "desktop"
//! ```

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::{default_config_path, ConfigLoader};
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
