//! Tokio-backed [`ProcessHandle`] shared by the platform spawners.
//!
//! The worker's stdout and stderr are piped and forwarded line by line to
//! `tracing` under the `launchguard::worker` target, so a worker that dies
//! during startup leaves its last words in the log.

use crate::config::LaunchSpec;
use crate::error::LaunchError;
use crate::process::ProcessHandle;
use anyhow::Result;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Build the base command for `spec` with piped output streams
pub fn command_for(spec: &LaunchSpec) -> Command {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);

    if let Some(dir) = &spec.working_directory {
        cmd.current_dir(dir);
    }

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Collapse an exit status into a single code.
///
/// Signal terminations on Unix follow the shell convention `128 + signal`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

#[derive(Debug)]
pub struct ChildProcessHandle {
    child: Child,
    command: String,
}

impl ChildProcessHandle {
    /// Spawn `cmd` and start forwarding its output
    pub fn spawn(mut cmd: Command, spec: &LaunchSpec) -> Result<Self, LaunchError> {
        let mut child = cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
            command: spec.command.clone(),
            source,
        })?;

        info!(
            pid = ?child.id(),
            command = %spec.command,
            args = ?spec.args,
            "Spawned worker process"
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, spec.command.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, spec.command.clone(), "stderr"));
        }

        Ok(Self {
            child,
            command: spec.command.clone(),
        })
    }
}

#[async_trait]
impl ProcessHandle for ChildProcessHandle {
    fn os_pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn command(&self) -> &str {
        &self.command
    }

    async fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(exit_code_of))
    }

    async fn wait(&mut self) -> std::io::Result<i32> {
        let status = self.child.wait().await?;
        Ok(exit_code_of(status))
    }

    async fn destroy(&mut self) -> Result<()> {
        self.child
            .start_kill()
            .map_err(|e| anyhow::anyhow!("Failed to kill process {}: {}", self.command, e))
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(io: R, command: String, stream: &'static str) {
    let mut frames = FramedRead::new(io, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(line) => {
                info!(target: "launchguard::worker", command = %command, stream, "{line}");
            }
            Err(e) => {
                warn!(command = %command, stream, "Stopped reading worker output: {e}");
                return;
            }
        }
    }

    debug!(command = %command, stream, "Worker output closed");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> LaunchSpec {
        LaunchSpec::builder()
            .command("sh")
            .args(["-c", script])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_exit_code_is_captured() {
        let spec = shell("echo starting; exit 81");
        let mut handle = ChildProcessHandle::spawn(command_for(&spec), &spec).unwrap();

        assert_eq!(handle.command(), "sh");
        assert_eq!(handle.wait().await.unwrap(), 81);
        assert_eq!(handle.try_exit_code().await.unwrap(), Some(81));
    }

    #[tokio::test]
    async fn test_destroy_reports_signal_exit() {
        let spec = shell("sleep 30; true");
        let mut handle = ChildProcessHandle::spawn(command_for(&spec), &spec).unwrap();

        assert!(handle.os_pid().is_some());
        assert_eq!(handle.try_exit_code().await.unwrap(), None);

        handle.destroy().await.unwrap();
        assert_eq!(handle.wait().await.unwrap(), 128 + 9);
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let spec = LaunchSpec::builder()
            .command("/nonexistent/launchguard-worker")
            .build()
            .unwrap();

        let result = ChildProcessHandle::spawn(command_for(&spec), &spec);
        assert!(matches!(result, Err(LaunchError::SpawnFailed { .. })));
    }
}
