//! Cronos - scheduled job runner.
//!
//! Main entry point for the Cronos CLI and daemon.

mod cli;
mod cmd_config;
mod cmd_daemon;
mod cmd_history;
mod cmd_job;

use std::path::PathBuf;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cronos_config::{default_config_path, Config, ConfigLoader};

use crate::cli::{Cli, Commands};

/// Initialize tracing with console and, for the daemon, file output.
///
/// Log files are written to `<storage root>/debug/` with daily rotation.
fn init_tracing(config: &Config, to_file: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = if to_file && config.logging.file {
        let log_dir = config.log_dir();
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("cronos")
            .filename_suffix("log")
            .max_log_files(30)
            .build(&log_dir)?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Keeps the background writer alive for the program duration.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(default_config_path()?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config)?;
    let config = ConfigLoader::load_or_default(&config_path)?;

    init_tracing(&config, matches!(cli.command, Commands::Run))?;

    match cli.command {
        Commands::Run => cmd_daemon::daemon_run(config_path, config).await,
        Commands::Stop { force } => cmd_daemon::daemon_stop(&config, force).await,
        Commands::Status => cmd_daemon::daemon_status(&config).await,
        Commands::Job { action } => cmd_job::handle_job_command(action, &config).await,
        Commands::History { job_id, limit } => {
            cmd_history::show_history(&config, job_id, limit).await
        }
        Commands::Logs {
            run_id,
            stdout,
            stderr,
        } => cmd_history::show_logs(&config, run_id, stdout, stderr).await,
        Commands::Config { action } => {
            cmd_config::handle_config_command(action, &config_path, &config)
        }
    }
}
