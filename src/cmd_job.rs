//! Job subcommand handlers for Cronos.

use std::io::Write;

use chrono::{Local, Utc};
use tracing::warn;

use cronos_config::Config;
use cronos_core::job::filter_jobs;
use cronos_core::{CommandSpec, Job, JobId, LogRun, Schedule};
use cronos_daemon::{notifier_from_config, run_once, DaemonError};
use cronos_runner::{OutputStream, ProcessRunner};
use cronos_store::JobStore;

use crate::cli::{JobAction, OutputFormat};
use crate::cmd_daemon::notify_daemon;

/// Handle job subcommands.
pub(crate) async fn handle_job_command(
    action: JobAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = JobStore::open(config.storage_root()).await?;

    match action {
        JobAction::Add {
            name,
            command,
            dir,
            schedule,
            disabled,
        } => {
            let schedule = schedule.to_schedule()?;
            let job = Job::new(name, command.into_spec(), dir, schedule).with_enabled(!disabled);
            job_add(&store, config, job).await
        }
        JobAction::List { search, format } => {
            job_list(&store, search.as_deref().unwrap_or(""), format).await
        }
        JobAction::Show { job_id } => job_show(&store, job_id).await,
        JobAction::Edit {
            job_id,
            name,
            command,
            prompt,
            dir,
            at,
            weekday,
            daily,
        } => {
            let edit = JobEdit {
                name,
                command,
                prompt,
                dir,
                at,
                weekday,
                daily,
            };
            modify_job(&store, config, job_id, |job| edit.apply(job)).await
        }
        JobAction::Remove { job_id } => job_remove(&store, config, job_id).await,
        JobAction::Enable { job_id } => {
            modify_job(&store, config, job_id, |job| {
                job.is_enabled = true;
                Ok(())
            })
            .await
        }
        JobAction::Disable { job_id } => {
            modify_job(&store, config, job_id, |job| {
                job.is_enabled = false;
                Ok(())
            })
            .await
        }
        JobAction::Run { job_id } => job_run(store, config, job_id).await,
    }
}

/// Optional field changes from `job edit`.
struct JobEdit {
    name: Option<String>,
    command: Option<String>,
    prompt: Option<String>,
    dir: Option<String>,
    at: Option<(u8, u8)>,
    weekday: Option<u8>,
    daily: bool,
}

impl JobEdit {
    fn apply(self, job: &mut Job) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(name) = self.name {
            job.name = name;
        }
        if let Some(command) = self.command {
            job.command = CommandSpec::custom(command);
        }
        if let Some(prompt) = self.prompt {
            job.command = match job.command.clone() {
                CommandSpec::Agent {
                    model,
                    context_directories,
                    command,
                    ..
                } => CommandSpec::Agent {
                    prompt,
                    model,
                    context_directories,
                    command,
                },
                // The old command text stays in the document, unused.
                CommandSpec::Custom { command } => CommandSpec::Agent {
                    prompt,
                    model: None,
                    context_directories: Vec::new(),
                    command,
                },
            };
        }
        if let Some(dir) = self.dir {
            job.working_directory = dir;
        }

        let (hour, minute) = self.at.unwrap_or((job.schedule.hour(), job.schedule.minute()));
        let weekday = if self.daily {
            None
        } else {
            self.weekday.or(job.schedule.weekday())
        };
        job.schedule = match weekday {
            Some(weekday) => Schedule::weekly(weekday, hour, minute)?,
            None => Schedule::daily(hour, minute)?,
        };
        Ok(())
    }
}

async fn job_add(
    store: &JobStore,
    config: &Config,
    job: Job,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut jobs = store.load_jobs().await?;
    let id = job.id;
    let summary = format!("{} ({})", job.name, job.schedule);
    jobs.push(job);
    store.save_jobs(&jobs).await?;
    notify_daemon(config);

    println!("Added job {}: {}", id, summary);
    Ok(())
}

async fn job_list(
    store: &JobStore,
    search: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = store.load_jobs().await?;
    let matching = filter_jobs(&jobs, search);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&matching)?);
        return Ok(());
    }

    if matching.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!(
        "{:<36}  {:<24}  {:<32}  {:<8}  LAST RUN",
        "ID", "NAME", "SCHEDULE", "ENABLED"
    );
    for job in matching {
        println!(
            "{:<36}  {:<24}  {:<32}  {:<8}  {}",
            job.id,
            truncate(&job.name, 24),
            job.schedule.display_string(),
            if job.is_enabled { "yes" } else { "no" },
            last_run_summary(job)
        );
    }
    Ok(())
}

async fn job_show(store: &JobStore, job_id: JobId) -> Result<(), Box<dyn std::error::Error>> {
    let job = find_job(store, job_id).await?;

    println!("Job {}", job.id);
    println!("  Name:       {}", job.name);
    match &job.command {
        CommandSpec::Custom { command } => println!("  Command:    {}", command),
        CommandSpec::Agent {
            prompt,
            model,
            context_directories,
            ..
        } => {
            println!("  Prompt:     {}", prompt);
            if let Some(model) = model {
                println!("  Model:      {}", model.display_name());
            }
            for dir in context_directories {
                println!("  Context:    {}", dir);
            }
        }
    }
    println!("  Directory:  {}", job.working_directory);
    println!("  Schedule:   {}", job.schedule);
    println!("  Enabled:    {}", if job.is_enabled { "yes" } else { "no" });
    if job.is_enabled {
        let next = job.schedule.next_run(Local::now());
        println!("  Next run:   {}", next.format("%Y-%m-%d %H:%M"));
    }
    println!("  Last run:   {}", last_run_summary(&job));

    if let Some(run) = store.latest_run(&job.id).await? {
        println!("  Latest run: {}", run_summary(&run));
    } else {
        let legacy = store.read_legacy_log(&job.id).await?;
        if !legacy.stdout.is_empty() || !legacy.stderr.is_empty() {
            println!("  Legacy log: {}", store.legacy_log_paths(&job.id).stdout.display());
        }
    }
    Ok(())
}

async fn job_remove(
    store: &JobStore,
    config: &Config,
    job_id: JobId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut jobs = store.load_jobs().await?;
    let Some(index) = jobs.iter().position(|job| job.id == job_id) else {
        return Err(Box::new(DaemonError::JobNotFound(job_id)));
    };
    let job = jobs.remove(index);
    store.save_jobs(&jobs).await?;

    let removed = store.delete_runs_for(&job_id).await?;
    store.delete_legacy_log(&job_id).await;
    notify_daemon(config);

    println!("Removed job '{}' and {} run(s)", job.name, removed);
    Ok(())
}

/// Load, change and save one job, then tell the daemon.
async fn modify_job<F>(
    store: &JobStore,
    config: &Config,
    job_id: JobId,
    change: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut Job) -> Result<(), Box<dyn std::error::Error>>,
{
    let mut jobs = store.load_jobs().await?;
    let job = jobs
        .iter_mut()
        .find(|job| job.id == job_id)
        .ok_or(DaemonError::JobNotFound(job_id))?;
    change(job)?;
    let summary = format!(
        "{} ({}, {})",
        job.name,
        job.schedule,
        if job.is_enabled { "enabled" } else { "disabled" }
    );

    store.save_jobs(&jobs).await?;
    notify_daemon(config);

    println!("Updated job {}: {}", job_id, summary);
    Ok(())
}

/// Run a job in this process and stream its output to the terminal.
///
/// No timers are armed here. Only the job's last-run fields are written
/// back, so a running daemon's own updates to the document survive.
async fn job_run(
    store: JobStore,
    config: &Config,
    job_id: JobId,
) -> Result<(), Box<dyn std::error::Error>> {
    let job = find_job(&store, job_id).await?;
    let settings = config.execution_settings()?;
    let notifier = notifier_from_config(&config.notifications);

    eprintln!("Running job '{}'", job.name);
    let mut write_error = None;
    let result = run_once(
        &store,
        &ProcessRunner::new(),
        notifier.as_ref(),
        &settings,
        &job,
        |chunk| match chunk.stream {
            OutputStream::Stdout => {
                let mut stdout = std::io::stdout();
                if let Err(e) = stdout
                    .write_all(chunk.text.as_bytes())
                    .and_then(|()| stdout.flush())
                {
                    write_error.get_or_insert(e);
                }
            }
            OutputStream::Stderr => eprint!("{}", chunk.text),
        },
    )
    .await?;
    if let Some(e) = write_error {
        warn!("output not fully written: {}", e);
    }

    if let Some(message) = &result.launch_error {
        eprintln!("Error: {}", message);
    }
    if result.recorded {
        notify_daemon(config);
    }

    let run = result.run;
    eprintln!("{}", run_summary(&run));
    if run.success == Some(true) {
        Ok(())
    } else {
        Err(format!("Job exited with code {}", run.exit_code.unwrap_or(-1)).into())
    }
}

async fn find_job(store: &JobStore, job_id: JobId) -> Result<Job, Box<dyn std::error::Error>> {
    store
        .load_jobs()
        .await?
        .into_iter()
        .find(|job| job.id == job_id)
        .ok_or_else(|| Box::new(DaemonError::JobNotFound(job_id)) as Box<dyn std::error::Error>)
}

fn last_run_summary(job: &Job) -> String {
    match (job.last_run, job.last_run_successful) {
        (Some(at), Some(success)) => format!(
            "{} ({})",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            if success { "ok" } else { "failed" }
        ),
        (Some(at), None) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        (None, _) => "never".to_string(),
    }
}

pub(crate) fn run_summary(run: &LogRun) -> String {
    let started = run.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    match (run.success, run.exit_code) {
        (Some(true), _) => format!(
            "{} {} succeeded in {}",
            run.id,
            started,
            run.duration_string().unwrap_or_default()
        ),
        (Some(false), code) => format!(
            "{} {} failed (exit {}) after {}",
            run.id,
            started,
            code.unwrap_or(-1),
            run.duration_string().unwrap_or_default()
        ),
        (None, _) => {
            let elapsed = (Utc::now() - run.started_at).num_seconds().max(0);
            format!("{} {} in progress ({}s)", run.id, started, elapsed)
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}\u{2026}", kept)
}
