//! OS signal handling for the daemon.
//!
//! SIGTERM and SIGINT stop the daemon. SIGHUP makes it re-read its
//! configuration and the jobs document, which is how the CLI announces edits.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::DaemonError;

const SIGNAL_CHANNEL_CAPACITY: usize = 16;

/// What the daemon was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonSignal {
    /// Stop scheduling and exit (SIGTERM, SIGINT).
    Shutdown,
    /// Re-read config and jobs (SIGHUP).
    Reload,
}

impl DaemonSignal {
    /// Name of the OS signal that carries this request between processes.
    pub fn os_name(&self) -> &'static str {
        match self {
            DaemonSignal::Shutdown => "SIGTERM",
            DaemonSignal::Reload => "SIGHUP",
        }
    }

    #[cfg(unix)]
    fn nix_signal(&self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;

        match self {
            DaemonSignal::Shutdown => Signal::SIGTERM,
            DaemonSignal::Reload => Signal::SIGHUP,
        }
    }
}

impl fmt::Display for DaemonSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonSignal::Shutdown => f.write_str("shutdown"),
            DaemonSignal::Reload => f.write_str("reload"),
        }
    }
}

/// Delivers daemon signals, from the OS or from inside the process, to every
/// subscriber. Clones share one channel.
#[derive(Clone)]
pub struct SignalHandler {
    sender: broadcast::Sender<DaemonSignal>,
    stopping: Arc<AtomicBool>,
}

impl SignalHandler {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        Self {
            sender,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonSignal> {
        self.sender.subscribe()
    }

    pub fn send(&self, signal: DaemonSignal) {
        if signal == DaemonSignal::Shutdown {
            self.stopping.store(true, Ordering::SeqCst);
        }
        // Nobody listening yet is fine; the daemon subscribes before it starts.
        let receivers = self.sender.send(signal).unwrap_or(0);
        debug!(%signal, receivers, "daemon signal sent");
    }

    pub fn request_shutdown(&self) {
        self.send(DaemonSignal::Shutdown);
    }

    pub fn request_reload(&self) {
        self.send(DaemonSignal::Reload);
    }

    /// True once a shutdown has been requested by any clone.
    pub fn is_shutdown_requested(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Forward SIGTERM, SIGINT and SIGHUP into this handler.
    #[cfg(unix)]
    pub fn setup_os_signals(&self) -> Result<(), DaemonError> {
        use tokio::signal::unix::{signal, SignalKind};

        let routes = [
            (SignalKind::terminate(), "SIGTERM", DaemonSignal::Shutdown),
            (SignalKind::interrupt(), "SIGINT", DaemonSignal::Shutdown),
            (SignalKind::hangup(), "SIGHUP", DaemonSignal::Reload),
        ];

        for (kind, name, mapped) in routes {
            let mut stream = signal(kind).map_err(|e| DaemonError::SignalSetup(e.to_string()))?;
            let handler = self.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    info!(signal = name, "received {}, requesting {}", name, mapped);
                    handler.send(mapped);
                }
            });
        }

        debug!("OS signal routes installed");
        Ok(())
    }

    /// Only Ctrl+C is available off Unix.
    #[cfg(not(unix))]
    pub fn setup_os_signals(&self) -> Result<(), DaemonError> {
        let handler = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, requesting shutdown");
                handler.request_shutdown();
            }
        });
        Ok(())
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver `signal` to the daemon process `pid`.
#[cfg(unix)]
pub fn send_signal_to_pid(pid: u32, signal: DaemonSignal) -> Result<(), DaemonError> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| DaemonError::Custom(format!("PID {} out of range", pid)))?;

    kill(Pid::from_raw(raw), signal.nix_signal()).map_err(|e| {
        DaemonError::Custom(format!(
            "Failed to send {} to PID {}: {}",
            signal.os_name(),
            pid,
            e
        ))
    })?;

    info!(pid, "sent {} to daemon", signal.os_name());
    Ok(())
}

#[cfg(not(unix))]
pub fn send_signal_to_pid(_pid: u32, signal: DaemonSignal) -> Result<(), DaemonError> {
    Err(DaemonError::Custom(format!(
        "Cannot send {} on this platform",
        signal.os_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_names() {
        assert_eq!(DaemonSignal::Shutdown.to_string(), "shutdown");
        assert_eq!(DaemonSignal::Reload.os_name(), "SIGHUP");
    }

    #[test]
    fn test_only_shutdown_marks_stopping() {
        let handler = SignalHandler::new();
        handler.request_reload();
        assert!(!handler.is_shutdown_requested());

        handler.clone().request_shutdown();
        assert!(handler.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let handler = SignalHandler::new();
        let mut daemon_rx = handler.subscribe();
        let mut other_rx = handler.subscribe();

        handler.request_reload();
        handler.request_shutdown();

        assert_eq!(daemon_rx.recv().await.unwrap(), DaemonSignal::Reload);
        assert_eq!(daemon_rx.recv().await.unwrap(), DaemonSignal::Shutdown);
        assert_eq!(other_rx.recv().await.unwrap(), DaemonSignal::Reload);
    }

    #[test]
    fn test_send_without_subscribers() {
        SignalHandler::new().request_reload();
    }

    #[cfg(unix)]
    #[test]
    fn test_send_to_missing_process_fails() {
        let err = send_signal_to_pid(i32::MAX as u32, DaemonSignal::Reload).unwrap_err();
        assert!(err.to_string().contains("SIGHUP"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sighup_becomes_reload() {
        let handler = SignalHandler::new();
        let mut rx = handler.subscribe();
        handler.setup_os_signals().unwrap();

        send_signal_to_pid(std::process::id(), DaemonSignal::Reload).unwrap();

        let signal = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal, DaemonSignal::Reload);
    }
}
