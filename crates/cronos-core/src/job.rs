//! Job definitions and effective-command materialization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::ids::JobId;
use crate::schedule::Schedule;
use crate::settings::ExecutionSettings;
use crate::timestamp;

/// Model selection for agent invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentModel {
    #[default]
    Sonnet,
    Opus,
    Haiku,
}

impl AgentModel {
    pub const ALL: [AgentModel; 3] = [AgentModel::Sonnet, AgentModel::Opus, AgentModel::Haiku];

    /// Value passed to `--model`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentModel::Sonnet => "sonnet",
            AgentModel::Opus => "opus",
            AgentModel::Haiku => "haiku",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentModel::Sonnet => "Sonnet",
            AgentModel::Opus => "Opus",
            AgentModel::Haiku => "Haiku",
        }
    }
}

impl fmt::Display for AgentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentModel::ALL
            .into_iter()
            .find(|model| model.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownModel(s.to_string()))
    }
}

/// What a job executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Literal shell command text.
    Custom { command: String },
    /// Non-interactive agent CLI invocation.
    Agent {
        prompt: String,
        /// Overrides the default model from [`ExecutionSettings`] when set.
        model: Option<AgentModel>,
        /// Extra directories handed to the agent. Empty entries are skipped.
        context_directories: Vec<String>,
        /// Shell command text the document carried alongside the prompt.
        /// Never executed; written back so a re-save is lossless.
        command: String,
    },
}

impl CommandSpec {
    pub fn custom(command: impl Into<String>) -> Self {
        CommandSpec::Custom {
            command: command.into(),
        }
    }

    pub fn agent(prompt: impl Into<String>) -> Self {
        CommandSpec::Agent {
            prompt: prompt.into(),
            model: None,
            context_directories: Vec::new(),
            command: String::new(),
        }
    }

    /// The shell command string actually run for this spec.
    ///
    /// Agent invocations become
    /// `<agent> --model <model> -p '<prompt>' '<dir>'...` with every value
    /// single-quoted for the shell and context directories tilde-expanded.
    pub fn effective_command(&self, settings: &ExecutionSettings) -> String {
        match self {
            CommandSpec::Custom { command } => command.clone(),
            CommandSpec::Agent {
                prompt,
                model,
                context_directories,
                ..
            } => {
                let model = model.unwrap_or(settings.default_model);
                let mut cmd = format!(
                    "{} --model {} -p {}",
                    settings.agent_binary,
                    model.as_str(),
                    shell_quote(prompt)
                );
                for dir in context_directories.iter().filter(|d| !d.is_empty()) {
                    let expanded = shellexpand::tilde(dir);
                    cmd.push(' ');
                    cmd.push_str(&shell_quote(&expanded));
                }
                cmd
            }
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, CommandSpec::Agent { .. })
    }
}

/// Wrap `value` in single quotes, escaping embedded single quotes as `'\''`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// A scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub command: CommandSpec,
    /// May start with `~`; expanded when the job runs.
    pub working_directory: String,
    pub schedule: Schedule,
    pub is_enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_run_successful: Option<bool>,
}

impl Job {
    /// Create an enabled job that has never run.
    pub fn new(
        name: impl Into<String>,
        command: CommandSpec,
        working_directory: impl Into<String>,
        schedule: Schedule,
    ) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            command,
            working_directory: working_directory.into(),
            schedule,
            is_enabled: true,
            last_run: None,
            last_run_successful: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    pub fn effective_command(&self, settings: &ExecutionSettings) -> String {
        self.command.effective_command(settings)
    }

    /// Record the outcome of a finished run.
    pub fn record_run(&mut self, at: DateTime<Utc>, success: bool) {
        self.last_run = Some(at);
        self.last_run_successful = Some(success);
    }

    /// Case-insensitive match against name, command text and prompt.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let detail = match &self.command {
            CommandSpec::Custom { command } => command.as_str(),
            CommandSpec::Agent { prompt, .. } => prompt.as_str(),
        };
        [self.name.as_str(), detail]
            .iter()
            .any(|text| text.to_lowercase().contains(&query))
    }
}

/// Filter a job list the way the job browser does.
pub fn filter_jobs<'a>(jobs: &'a [Job], query: &str) -> Vec<&'a Job> {
    jobs.iter().filter(|job| job.matches_search(query)).collect()
}

// Persisted form. Flat record with camelCase keys, readable by older
// documents that lack `jobType` or still carry a single `contextDirectory`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum JobType {
    #[serde(rename = "claude")]
    Agent,
    #[default]
    #[serde(rename = "customCommand")]
    CustomCommand,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobRecord {
    id: JobId,
    name: String,
    #[serde(default)]
    command: String,
    working_directory: String,
    schedule: Schedule,
    is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_run_successful: Option<bool>,
    #[serde(default)]
    job_type: JobType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claude_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claude_model: Option<AgentModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context_directories: Option<Vec<String>>,
    #[serde(default, skip_serializing)]
    context_directory: Option<String>,
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        let (job_type, command, claude_prompt, claude_model, context_directories) =
            match &job.command {
                CommandSpec::Custom { command } => {
                    (JobType::CustomCommand, command.clone(), None, None, Vec::new())
                }
                CommandSpec::Agent {
                    prompt,
                    model,
                    context_directories,
                    command,
                } => (
                    JobType::Agent,
                    command.clone(),
                    Some(prompt.clone()),
                    *model,
                    context_directories.clone(),
                ),
            };

        Self {
            id: job.id,
            name: job.name.clone(),
            command,
            working_directory: job.working_directory.clone(),
            schedule: job.schedule,
            is_enabled: job.is_enabled,
            last_run: job.last_run,
            last_run_successful: job.last_run_successful,
            job_type,
            claude_prompt,
            claude_model,
            context_directories: Some(context_directories),
            context_directory: None,
        }
    }
}

impl From<JobRecord> for Job {
    fn from(record: JobRecord) -> Self {
        let command = match record.job_type {
            JobType::CustomCommand => CommandSpec::Custom {
                command: record.command,
            },
            JobType::Agent => {
                let legacy = record.context_directory;
                let context_directories = match (record.context_directories, legacy) {
                    (Some(dirs), _) => dirs,
                    (None, Some(dir)) if !dir.is_empty() => vec![dir],
                    _ => Vec::new(),
                };
                CommandSpec::Agent {
                    prompt: record.claude_prompt.unwrap_or_default(),
                    model: record.claude_model,
                    context_directories,
                    command: record.command,
                }
            }
        };

        Self {
            id: record.id,
            name: record.name,
            command,
            working_directory: record.working_directory,
            schedule: record.schedule,
            is_enabled: record.is_enabled,
            last_run: record.last_run,
            last_run_successful: record.last_run_successful,
        }
    }
}

impl Serialize for Job {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        JobRecord::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Job {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JobRecord::deserialize(deserializer).map(Job::from)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
