//! Shell process execution.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cronos_core::ShellSettings;

use crate::decode::Utf8ChunkDecoder;
use crate::error::RunnerError;
use crate::output::{OutputChunk, OutputStream, RunOutcome};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Everything needed to launch one command.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub command: String,
    /// May start with `~`.
    pub working_directory: String,
    pub shell: ShellSettings,
}

/// Replace typographic quotes with their ASCII equivalents.
///
/// Text pasted from rich-text sources often carries “ ” ‘ ’, which a shell
/// treats as literal characters rather than quoting.
pub fn normalize_quotes(command: &str) -> String {
    command
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

/// Runs commands through the configured shell.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    chunk_size: usize,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            chunk_size: READ_CHUNK_SIZE,
        }
    }

    /// Use a different read buffer size. Mostly useful in tests.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run `request`, writing stdout and stderr to the given files.
    ///
    /// Both files are created (or truncated) before launch. When `live` is
    /// set, decoded chunks are sent on it in the order they were read from
    /// each stream. A closed receiver stops forwarding but not file capture.
    ///
    /// Resolves after the process exits and both pipes reach end of file.
    pub async fn run(
        &self,
        request: &RunRequest,
        stdout_path: &Path,
        stderr_path: &Path,
        live: Option<mpsc::Sender<OutputChunk>>,
    ) -> Result<RunOutcome, RunnerError> {
        let stdout_sink = open_sink(stdout_path).await?;
        let stderr_sink = open_sink(stderr_path).await?;

        let command = normalize_quotes(&request.command);
        let cwd = PathBuf::from(shellexpand::tilde(&request.working_directory).as_ref());
        let shell = &request.shell.path;

        match tokio::fs::metadata(&cwd).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(launch_error(shell, format!("{} is not a directory", cwd.display())));
            }
            Err(e) => {
                return Err(launch_error(
                    shell,
                    format!("working directory {}: {}", cwd.display(), e),
                ));
            }
        }

        let mut cmd = Command::new(shell);
        cmd.args(request.shell.args(&command))
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| launch_error(shell, e.to_string()))?;
        info!(
            shell = %shell.display(),
            cwd = %cwd.display(),
            pid = child.id().unwrap_or_default(),
            "process started"
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, stdout_result, stderr_result) = tokio::join!(
            child.wait(),
            pump(stdout, stdout_sink, OutputStream::Stdout, live.clone(), self.chunk_size),
            pump(stderr, stderr_sink, OutputStream::Stderr, live, self.chunk_size),
        );

        let status = status?;
        stdout_result?;
        stderr_result?;

        let outcome = RunOutcome::from_code(status.code());
        info!(
            exit_code = outcome.exit_code,
            success = outcome.success,
            "process exited"
        );
        Ok(outcome)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn launch_error(shell: &Path, reason: String) -> RunnerError {
    RunnerError::Launch {
        shell: shell.to_path_buf(),
        reason,
    }
}

async fn open_sink(path: &Path) -> Result<File, RunnerError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| RunnerError::LogFile {
                path: path.to_path_buf(),
                source,
            })?;
    }
    File::create(path).await.map_err(|source| RunnerError::LogFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy one pipe into its sink until end of file, forwarding decoded text.
async fn pump<R>(
    reader: Option<R>,
    mut sink: File,
    stream: OutputStream,
    mut live: Option<mpsc::Sender<OutputChunk>>,
    chunk_size: usize,
) -> Result<(), RunnerError>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut buf = vec![0u8; chunk_size];
    let mut decoder = Utf8ChunkDecoder::new();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        sink.write_all(&buf[..n]).await?;

        if let Some(tx) = &live {
            let text = decoder.decode(&buf[..n]);
            if !text.is_empty() && tx.send(OutputChunk { stream, text }).await.is_err() {
                debug!(%stream, "live output receiver dropped");
                live = None;
            }
        }
    }

    if decoder.pending_len() > 0 {
        warn!(%stream, "dropping incomplete UTF-8 sequence at end of output");
        decoder.finish();
    }
    sink.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
