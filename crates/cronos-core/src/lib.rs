//! # Cronos Core
//!
//! Data model shared by every Cronos crate.
//!
//! - [`Schedule`]: the daily/weekly recurrence grammar and its next-run computation
//! - [`Job`] and [`CommandSpec`]: what runs, where, and when
//! - [`LogRun`]: one execution attempt with its timestamps and exit status
//! - [`ExecutionSettings`]: the shell and default agent model used to materialize commands

pub mod error;
pub mod ids;
pub mod job;
pub mod run;
pub mod schedule;
pub mod settings;
pub mod timestamp;

pub use error::CoreError;
pub use ids::{JobId, RunId};
pub use job::{AgentModel, CommandSpec, Job};
pub use run::LogRun;
pub use schedule::Schedule;
pub use settings::{ExecutionSettings, ShellSettings};
