//! # Cronos Runner
//!
//! Runs one job command in a shell and captures its output.
//!
//! Each chunk read from the child's stdout or stderr is appended to that
//! stream's log file as it arrives and, when a live channel is supplied,
//! forwarded as an [`OutputChunk`]. The call resolves once the process has
//! exited and both pipes are drained.

mod decode;
mod error;
mod output;
mod runner;

pub use decode::Utf8ChunkDecoder;
pub use error::RunnerError;
pub use output::{OutputChunk, OutputStream, RunOutcome};
pub use runner::{normalize_quotes, ProcessRunner, RunRequest};
