//! Output and result types.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Decoded text read from one stream of a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub text: String,
}

/// How a process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Process exit code, or -1 when it was terminated by a signal.
    pub exit_code: i32,
    pub success: bool,
}

impl RunOutcome {
    pub fn from_code(code: Option<i32>) -> Self {
        let exit_code = code.unwrap_or(-1);
        Self {
            exit_code,
            success: exit_code == 0,
        }
    }

    /// Outcome recorded for a process that never started.
    pub fn launch_failure() -> Self {
        Self {
            exit_code: -1,
            success: false,
        }
    }
}
