//! Execution settings.
//!
//! Passed explicitly into command materialization and process launch. The
//! daemon holds one instance and hands out a snapshot per run.

use std::path::PathBuf;

use crate::job::AgentModel;

/// Shells offered for job execution.
pub const KNOWN_SHELLS: [&str; 4] = ["/bin/zsh", "/bin/bash", "/opt/homebrew/bin/fish", "/bin/sh"];

pub const DEFAULT_SHELL: &str = "/bin/zsh";

pub const DEFAULT_AGENT_BINARY: &str = "claude";

/// How the shell is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub path: PathBuf,
    /// Pass `-l` so login startup files are read.
    pub login: bool,
    /// Pass `-i` so interactive startup files (aliases, PATH tweaks) are read.
    pub interactive: bool,
}

impl ShellSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Plain `<shell> -c` without login or interactive startup files.
    pub fn plain(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            login: false,
            interactive: false,
        }
    }

    /// Arguments that run `command` in this shell.
    pub fn args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(4);
        if self.login {
            args.push("-l".to_string());
        }
        if self.interactive {
            args.push("-i".to_string());
        }
        args.push("-c".to_string());
        args.push(command.to_string());
        args
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SHELL),
            login: true,
            interactive: true,
        }
    }
}

/// Settings consulted when a job's effective command is built and launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSettings {
    pub shell: ShellSettings,
    /// Model used by agent jobs without an override.
    pub default_model: AgentModel,
    /// Agent CLI executable name or path.
    pub agent_binary: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            shell: ShellSettings::default(),
            default_model: AgentModel::default(),
            agent_binary: DEFAULT_AGENT_BINARY.to_string(),
        }
    }
}
