//! CLI definitions for Cronos.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use cronos_core::schedule::weekday_name;
use cronos_core::{AgentModel, CommandSpec, CoreError, JobId, RunId, Schedule};

/// Cronos CLI.
#[derive(Parser)]
#[command(name = "cronos")]
#[command(about = "Scheduled job runner with streamed logs and run history")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.cronos/config.toml)
    #[arg(short, long, global = true, env = "CRONOS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler daemon in the foreground
    Run,

    /// Stop a running daemon
    Stop {
        /// Send SIGKILL instead of SIGTERM
        #[arg(long)]
        force: bool,
    },

    /// Show daemon and job status
    Status,

    /// Job management commands
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// List the runs of a job, newest first
    History {
        /// Job ID
        job_id: JobId,

        /// Maximum number of runs to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the captured output of a run
    Logs {
        /// Run ID
        run_id: RunId,

        /// Only print stderr
        #[arg(long, conflicts_with = "stdout")]
        stderr: bool,

        /// Only print stdout
        #[arg(long)]
        stdout: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum JobAction {
    /// Add a new job
    Add {
        /// Job name
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        command: CommandArgs,

        /// Working directory
        #[arg(short = 'd', long, default_value = "~")]
        dir: String,

        #[command(flatten)]
        schedule: ScheduleArgs,

        /// Create the job disabled
        #[arg(long)]
        disabled: bool,
    },

    /// List jobs
    List {
        /// Only show jobs whose name, command or prompt contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show one job with its next fire time and latest run
    Show {
        /// Job ID
        job_id: JobId,
    },

    /// Change fields of an existing job
    Edit {
        /// Job ID
        job_id: JobId,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New shell command (turns the job into a command job)
        #[arg(long, conflicts_with = "prompt")]
        command: Option<String>,

        /// New agent prompt (turns the job into an agent job)
        #[arg(long)]
        prompt: Option<String>,

        /// New working directory
        #[arg(short = 'd', long)]
        dir: Option<String>,

        /// New time of day, HH:MM
        #[arg(long, value_parser = parse_time)]
        at: Option<(u8, u8)>,

        /// New weekday (makes the job weekly)
        #[arg(long, value_parser = parse_weekday, conflicts_with = "daily")]
        weekday: Option<u8>,

        /// Make the job daily
        #[arg(long)]
        daily: bool,
    },

    /// Delete a job with its run history
    Remove {
        /// Job ID
        job_id: JobId,
    },

    /// Enable a job
    Enable {
        /// Job ID
        job_id: JobId,
    },

    /// Disable a job
    Disable {
        /// Job ID
        job_id: JobId,
    },

    /// Run a job now and stream its output
    Run {
        /// Job ID
        job_id: JobId,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Validate the configuration file
    Check,

    /// Print the effective configuration
    Show,
}

/// What a new job runs.
#[derive(Args)]
pub(crate) struct CommandArgs {
    /// Shell command to run
    #[arg(long, required_unless_present = "prompt", conflicts_with = "prompt")]
    pub command: Option<String>,

    /// Prompt for an agent job
    #[arg(long)]
    pub prompt: Option<String>,

    /// Agent model override
    #[arg(long, requires = "prompt")]
    pub model: Option<AgentModel>,

    /// Extra directory handed to the agent (repeatable)
    #[arg(long = "context-dir", requires = "prompt")]
    pub context_dirs: Vec<String>,
}

impl CommandArgs {
    pub fn into_spec(self) -> CommandSpec {
        match (self.command, self.prompt) {
            (Some(command), _) => CommandSpec::custom(command),
            (None, prompt) => CommandSpec::Agent {
                prompt: prompt.unwrap_or_default(),
                model: self.model,
                context_directories: self.context_dirs,
                command: String::new(),
            },
        }
    }
}

/// When a new job runs.
#[derive(Args)]
pub(crate) struct ScheduleArgs {
    /// Time of day, HH:MM
    #[arg(long, value_parser = parse_time)]
    pub at: (u8, u8),

    /// Run weekly on this day (sun..sat or 1..7, Sunday = 1) instead of daily
    #[arg(long, value_parser = parse_weekday)]
    pub weekday: Option<u8>,
}

impl ScheduleArgs {
    pub fn to_schedule(&self) -> Result<Schedule, CoreError> {
        let (hour, minute) = self.at;
        match self.weekday {
            Some(weekday) => Schedule::weekly(weekday, hour, minute),
            None => Schedule::daily(hour, minute),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

/// Parse `HH:MM` (24-hour clock).
pub(crate) fn parse_time(value: &str) -> Result<(u8, u8), String> {
    let (hour, minute) = value
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got '{}'", value))?;
    let hour: u8 = hour
        .parse()
        .map_err(|_| format!("invalid hour in '{}'", value))?;
    let minute: u8 = minute
        .parse()
        .map_err(|_| format!("invalid minute in '{}'", value))?;
    if hour > 23 || minute > 59 {
        return Err(format!("time out of range: '{}'", value));
    }
    Ok((hour, minute))
}

/// Parse a weekday given as 1..=7 (Sunday = 1) or an English name or its
/// three-letter prefix.
pub(crate) fn parse_weekday(value: &str) -> Result<u8, String> {
    let value = value.trim().to_lowercase();
    if let Ok(number) = value.parse::<u8>() {
        return if (1..=7).contains(&number) {
            Ok(number)
        } else {
            Err(format!("weekday must be 1..=7, got {}", number))
        };
    }
    (1..=7u8)
        .find(|&day| {
            let name = weekday_name(day).to_lowercase();
            value.len() >= 3 && name.starts_with(&value)
        })
        .ok_or_else(|| format!("unknown weekday '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:05"), Ok((9, 5)));
        assert_eq!(parse_time("23:59"), Ok((23, 59)));
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("9").is_err());
        assert!(parse_time("ab:cd").is_err());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("1"), Ok(1));
        assert_eq!(parse_weekday("Mon"), Ok(2));
        assert_eq!(parse_weekday("saturday"), Ok(7));
        assert!(parse_weekday("0").is_err());
        assert!(parse_weekday("su").is_err());
        assert!(parse_weekday("funday").is_err());
    }

    #[test]
    fn test_job_add_weekly_agent() {
        let cli = Cli::try_parse_from([
            "cronos", "job", "add", "--name", "Digest", "--prompt", "summarize", "--model",
            "opus", "--at", "08:30", "--weekday", "mon",
        ])
        .unwrap();

        let Commands::Job {
            action: JobAction::Add {
                name,
                command,
                schedule,
                ..
            },
        } = cli.command
        else {
            panic!("expected job add");
        };
        assert_eq!(name, "Digest");
        assert_eq!(
            schedule.to_schedule().unwrap(),
            Schedule::weekly(2, 8, 30).unwrap()
        );
        match command.into_spec() {
            CommandSpec::Agent { prompt, model, .. } => {
                assert_eq!(prompt, "summarize");
                assert_eq!(model, Some(AgentModel::Opus));
            }
            other => panic!("expected agent spec, got {:?}", other),
        }
    }

    #[test]
    fn test_job_add_requires_command_or_prompt() {
        let result = Cli::try_parse_from(["cronos", "job", "add", "--name", "x", "--at", "01:00"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "cronos", "job", "add", "--name", "x", "--at", "01:00", "--command", "true",
            "--prompt", "hi",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_logs_rejects_bad_run_id() {
        assert!(Cli::try_parse_from(["cronos", "logs", "not-a-uuid"]).is_err());
    }
}
