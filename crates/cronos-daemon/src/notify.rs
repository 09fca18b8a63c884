//! Run-completion notifications.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use cronos_config::NotificationConfig;
use cronos_core::JobId;

use crate::error::DaemonError;

const PREVIEW_LINES: usize = 3;
const PREVIEW_MAX_CHARS: usize = 100;

/// What a sink is told after a run completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNotification {
    pub job_id: JobId,
    pub job_name: String,
    pub success: bool,
    pub output_preview: String,
}

impl JobNotification {
    pub fn title(&self) -> &'static str {
        if self.success {
            "Job Succeeded"
        } else {
            "Job Failed"
        }
    }

    pub fn body(&self) -> String {
        match (self.success, self.output_preview.is_empty()) {
            (true, true) => format!("Job '{}' completed successfully", self.job_name),
            (true, false) => format!("Job '{}'\n{}", self.job_name, self.output_preview),
            (false, true) => format!("Job '{}' failed", self.job_name),
            (false, false) => format!("Job '{}' failed\n{}", self.job_name, self.output_preview),
        }
    }
}

/// Last few lines of `output`, shortened from the front when too long.
pub fn output_preview(output: &str) -> String {
    let lines: Vec<&str> = output.trim().lines().collect();
    let tail = lines[lines.len().saturating_sub(PREVIEW_LINES)..].join("\n");

    let count = tail.chars().count();
    if count <= PREVIEW_MAX_CHARS {
        return tail;
    }
    let kept: String = tail.chars().skip(count - (PREVIEW_MAX_CHARS - 1)).collect();
    format!("{}\u{2026}", kept)
}

/// Receives one notification per completed run. Delivery is best effort.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, notification: &JobNotification) -> Result<(), DaemonError>;
}

/// Writes notifications to the tracing log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &JobNotification) -> Result<(), DaemonError> {
        if notification.success {
            info!(
                job_id = %notification.job_id,
                job = %notification.job_name,
                "{}",
                notification.body()
            );
        } else {
            warn!(
                job_id = %notification.job_id,
                job = %notification.job_name,
                "{}",
                notification.body()
            );
        }
        Ok(())
    }
}

/// Posts a desktop notification through `osascript` or `notify-send`.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

#[async_trait]
impl NotificationSink for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn notify(&self, notification: &JobNotification) -> Result<(), DaemonError> {
        let title = notification.title();
        let body = notification.body();

        let output = if cfg!(target_os = "macos") {
            let script = format!(
                r#"display notification "{}" with title "{}""#,
                body.replace('"', r#"\""#),
                title
            );
            Command::new("osascript").args(["-e", script.as_str()]).output().await?
        } else if cfg!(target_os = "linux") {
            Command::new("notify-send").args([title, body.as_str()]).output().await?
        } else {
            return Err(DaemonError::Custom(
                "Desktop notifications not supported on this platform".to_string(),
            ));
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(DaemonError::Custom(format!(
                "Failed to send desktop notification: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Discards every notification.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    fn name(&self) -> &str {
        "none"
    }

    async fn notify(&self, _notification: &JobNotification) -> Result<(), DaemonError> {
        Ok(())
    }
}

/// Build the sink selected by the `[notifications]` section.
pub fn notifier_from_config(config: &NotificationConfig) -> Arc<dyn NotificationSink> {
    if !config.enabled {
        return Arc::new(NullNotifier);
    }
    match config.backend.as_str() {
        "desktop" => Arc::new(DesktopNotifier),
        "none" => Arc::new(NullNotifier),
        "log" => Arc::new(LogNotifier),
        other => {
            warn!(backend = other, "unknown notification backend, using log");
            Arc::new(LogNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(success: bool, preview: &str) -> JobNotification {
        JobNotification {
            job_id: JobId::new(),
            job_name: "Backup".to_string(),
            success,
            output_preview: preview.to_string(),
        }
    }

    #[test]
    fn test_preview_keeps_last_three_lines() {
        let preview = output_preview("\n one\ntwo\nthree\nfour\n\n");
        assert_eq!(preview, "two\nthree\nfour");
    }

    #[test]
    fn test_preview_of_blank_output_is_empty() {
        assert_eq!(output_preview("  \n\t\n"), "");
    }

    #[test]
    fn test_preview_truncates_from_the_front() {
        let long = "x".repeat(150) + "END";
        let preview = output_preview(&long);

        assert_eq!(preview.chars().count(), 100);
        assert!(preview.ends_with("END\u{2026}"));
    }

    #[test]
    fn test_preview_at_limit_is_untouched() {
        let exact = "y".repeat(100);
        assert_eq!(output_preview(&exact), exact);
    }

    #[test]
    fn test_body_variants() {
        assert_eq!(
            notification(true, "").body(),
            "Job 'Backup' completed successfully"
        );
        assert_eq!(notification(true, "done").body(), "Job 'Backup'\ndone");
        assert_eq!(notification(false, "").body(), "Job 'Backup' failed");
        assert_eq!(
            notification(false, "boom").body(),
            "Job 'Backup' failed\nboom"
        );
        assert_eq!(notification(false, "").title(), "Job Failed");
    }

    #[test]
    fn test_notifier_from_config() {
        let mut config = NotificationConfig::default();
        assert_eq!(notifier_from_config(&config).name(), "desktop");

        config.backend = "log".to_string();
        assert_eq!(notifier_from_config(&config).name(), "log");

        config.enabled = false;
        assert_eq!(notifier_from_config(&config).name(), "none");
    }

    #[tokio::test]
    async fn test_log_and_null_notifiers_succeed() {
        let n = notification(false, "boom");
        assert!(LogNotifier.notify(&n).await.is_ok());
        assert!(NullNotifier.notify(&n).await.is_ok());
    }
}
