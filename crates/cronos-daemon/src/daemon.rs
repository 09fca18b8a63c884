//! Foreground daemon lifecycle.

use std::path::PathBuf;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use cronos_config::{Config, ConfigLoader};
use cronos_store::JobStore;

use crate::error::DaemonError;
use crate::manager::{JobManager, JobManagerHandle};
use crate::notify::notifier_from_config;
use crate::pid::PidFile;
use crate::signal::{DaemonSignal, SignalHandler};

/// Runs the job manager until a shutdown signal arrives.
///
/// SIGHUP re-reads the configuration file and the jobs document. Changes to
/// the storage root or the notification backend need a restart.
pub struct Daemon {
    config_path: PathBuf,
    config: Config,
    signals: SignalHandler,
    signal_rx: broadcast::Receiver<DaemonSignal>,
}

impl Daemon {
    pub fn new(config_path: impl Into<PathBuf>, config: Config) -> Self {
        let signals = SignalHandler::new();
        // Subscribe up front so signals sent during startup are not lost.
        let signal_rx = signals.subscribe();
        Self {
            config_path: config_path.into(),
            config,
            signals,
            signal_rx,
        }
    }

    /// Handle for requesting shutdown or reload from inside the process.
    pub fn signal_handler(&self) -> SignalHandler {
        self.signals.clone()
    }

    pub async fn run(mut self) -> Result<(), DaemonError> {
        let mut pid_file = PidFile::new(self.config.pid_file());
        pid_file.try_acquire()?;

        self.signals.setup_os_signals()?;

        let store = JobStore::open(self.config.storage_root()).await?;
        let manager = JobManager::new(store)
            .with_notifier(notifier_from_config(&self.config.notifications))
            .with_settings(self.config.execution_settings()?)
            .start()
            .await?;

        info!(
            root = %self.config.storage_root().display(),
            pid = std::process::id(),
            "daemon started"
        );

        loop {
            match self.signal_rx.recv().await {
                Ok(DaemonSignal::Shutdown) | Err(RecvError::Closed) => break,
                Ok(DaemonSignal::Reload) => self.reload(&manager).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "signal receiver lagged");
                }
            }
        }

        info!("daemon shutting down");
        manager.shutdown().await?;
        pid_file.remove()?;
        Ok(())
    }

    async fn reload(&mut self, manager: &JobManagerHandle) {
        match ConfigLoader::load_or_default(&self.config_path) {
            Ok(config) => match config.execution_settings() {
                Ok(settings) => {
                    if config.storage_root() != self.config.storage_root() {
                        warn!("storage root changed, restart the daemon to apply it");
                    }
                    manager.update_settings(settings);
                    self.config = config;
                }
                Err(e) => warn!("Keeping previous execution settings: {}", e),
            },
            Err(e) => warn!("Failed to reload {}: {}", self.config_path.display(), e),
        }

        match manager.reload().await {
            Ok(count) => info!(jobs = count, "reload complete"),
            Err(e) => warn!("Failed to reload jobs: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.root = dir.path().to_string_lossy().into_owned();
        config.notifications.backend = "none".to_string();
        config
    }

    async fn wait_for(path: &std::path::Path, present: bool) {
        for _ in 0..200 {
            if path.exists() == present {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {}", path.display());
    }

    #[tokio::test]
    async fn test_daemon_runs_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pid_path = config.pid_file();

        let daemon = Daemon::new(dir.path().join("config.toml"), config);
        let signals = daemon.signal_handler();
        let task = tokio::spawn(daemon.run());

        wait_for(&pid_path, true).await;
        signals.request_reload();
        signals.request_shutdown();

        task.await.unwrap().unwrap();
        assert!(!pid_path.exists());
    }

    #[tokio::test]
    async fn test_second_daemon_is_refused() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        std::fs::write(config.pid_file(), std::process::id().to_string()).unwrap();

        let err = Daemon::new(dir.path().join("config.toml"), config)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning { .. }));
    }
}
