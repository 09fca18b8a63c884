//! # Cronos Store
//!
//! File-backed persistence for job definitions and run history.
//!
//! ```text
//! {root}/
//! ├── jobs.json
//! └── logs/
//!     ├── index.json
//!     ├── {JOB-ID}.log / {JOB-ID}.err    (legacy, read-only)
//!     └── runs/
//!         ├── {RUN-ID}.stdout
//!         └── {RUN-ID}.stderr
//! ```
//!
//! Documents are replaced atomically (write to a temp file in the same
//! directory, fsync, rename) and the run index is re-read from disk on every
//! access.

mod atomic;
mod error;
mod layout;
mod store;

pub use error::StoreError;
pub use layout::{LogPaths, StoreLayout};
pub use store::{JobStore, RunLogs};
