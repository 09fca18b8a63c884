//! Run history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, RunId};
use crate::timestamp;

/// One execution attempt of a job.
///
/// A run is in flight until [`LogRun::complete`] sets its end time, exit code
/// and success flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRun {
    pub id: RunId,
    pub job_id: JobId,
    #[serde(with = "timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl LogRun {
    /// Start a run now.
    pub fn new(job_id: JobId) -> Self {
        Self::started_at(job_id, timestamp::now())
    }

    pub fn started_at(job_id: JobId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: RunId::new(),
            job_id,
            started_at,
            ended_at: None,
            exit_code: None,
            success: None,
        }
    }

    pub fn complete(&mut self, ended_at: DateTime<Utc>, exit_code: i32, success: bool) {
        self.ended_at = Some(ended_at);
        self.exit_code = Some(exit_code);
        self.success = Some(success);
    }

    pub fn is_in_flight(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn stdout_file_name(&self) -> String {
        stdout_file_name(&self.id)
    }

    pub fn stderr_file_name(&self) -> String {
        stderr_file_name(&self.id)
    }

    /// Wall time of a completed run.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|ended| ended - self.started_at)
    }

    /// Short duration such as `<1s`, `42s`, `3m 5s` or `2h 10m`.
    pub fn duration_string(&self) -> Option<String> {
        self.duration().map(format_duration)
    }
}

pub fn stdout_file_name(id: &RunId) -> String {
    format!("{}.stdout", id)
}

pub fn stderr_file_name(id: &RunId) -> String {
    format!("{}.stderr", id)
}

fn format_duration(duration: chrono::Duration) -> String {
    if duration < chrono::Duration::seconds(1) {
        return "<1s".to_string();
    }
    let secs = duration.num_seconds();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_lasting(millis: i64) -> LogRun {
        let start: DateTime<Utc> = "2024-01-01T10:00:00Z".parse().unwrap();
        let mut run = LogRun::started_at(JobId::new(), start);
        run.complete(start + chrono::Duration::milliseconds(millis), 0, true);
        run
    }

    #[test]
    fn test_new_run_is_in_flight() {
        let run = LogRun::new(JobId::new());
        assert!(run.is_in_flight());
        assert!(run.duration().is_none());
        assert!(run.duration_string().is_none());
    }

    #[test]
    fn test_complete_sets_all_fields() {
        let run = run_lasting(1500);
        assert!(!run.is_in_flight());
        assert_eq!(run.exit_code, Some(0));
        assert_eq!(run.success, Some(true));
    }

    #[test]
    fn test_duration_strings() {
        assert_eq!(run_lasting(400).duration_string().unwrap(), "<1s");
        assert_eq!(run_lasting(42_000).duration_string().unwrap(), "42s");
        assert_eq!(run_lasting(185_000).duration_string().unwrap(), "3m 5s");
        assert_eq!(run_lasting(7_830_000).duration_string().unwrap(), "2h 10m");
    }

    #[test]
    fn test_log_file_names_follow_run_id() {
        let run = LogRun::new(JobId::new());
        assert_eq!(run.stdout_file_name(), format!("{}.stdout", run.id));
        assert_eq!(run.stderr_file_name(), format!("{}.stderr", run.id));
    }

    #[test]
    fn test_in_flight_fields_are_omitted() {
        let run = LogRun::new(JobId::new());
        let value = serde_json::to_value(&run).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("jobId"));
        assert!(obj.contains_key("startedAt"));
        assert!(!obj.contains_key("endedAt"));
        assert!(!obj.contains_key("exitCode"));
    }

    #[test]
    fn test_timestamps_written_in_whole_seconds() {
        let start: DateTime<Utc> = "2024-01-01T10:00:00.250Z".parse().unwrap();
        let mut run = LogRun::started_at(JobId::new(), start);
        run.complete(start + chrono::Duration::milliseconds(61_500), 0, true);

        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["startedAt"], "2024-01-01T10:00:00Z");
        assert_eq!(value["endedAt"], "2024-01-01T10:01:01Z");
    }
}
