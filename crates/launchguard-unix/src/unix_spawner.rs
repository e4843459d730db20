use anyhow::Result;
use async_trait::async_trait;
use launchguard_core::{
    ChildProcessHandle, LaunchError, LaunchSpec, ProcessHandle, ProcessSpawner, command_for,
};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use tracing::{debug, info, warn};

/// Starts each worker as the leader of its own process group
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProcessSpawner;

#[async_trait]
impl ProcessSpawner for UnixProcessSpawner {
    type Handle = UnixProcessHandle;

    async fn spawn(&self, spec: &LaunchSpec) -> Result<UnixProcessHandle, LaunchError> {
        let mut cmd = command_for(spec);
        cmd.process_group(0);

        Ok(UnixProcessHandle {
            inner: ChildProcessHandle::spawn(cmd, spec)?,
        })
    }
}

/// Unix worker handle; destroy sends SIGTERM to the whole process group
#[derive(Debug)]
pub struct UnixProcessHandle {
    inner: ChildProcessHandle,
}

#[async_trait]
impl ProcessHandle for UnixProcessHandle {
    fn os_pid(&self) -> Option<u32> {
        self.inner.os_pid()
    }

    fn command(&self) -> &str {
        self.inner.command()
    }

    async fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        self.inner.try_exit_code().await
    }

    async fn wait(&mut self) -> std::io::Result<i32> {
        self.inner.wait().await
    }

    async fn destroy(&mut self) -> Result<()> {
        let Some(pid) = self.inner.os_pid() else {
            debug!("Worker {} was already reaped", self.inner.command());
            return Ok(());
        };

        match signal::killpg(NixPid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {
                info!("Sent SIGTERM to process group {pid}");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                info!("Process group {pid} not found (already terminated)");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send SIGTERM to process group {pid}: {e}; killing the worker");
                self.inner.destroy().await
            }
        }
    }
}

#[cfg(test)]
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
    async fn test_destroy_terminates_worker() {
        let mut handle = UnixProcessSpawner
            .spawn(&shell("sleep 30; true"))
            .await
            .unwrap();
        assert_eq!(handle.try_exit_code().await.unwrap(), None);

        handle.destroy().await.unwrap();

        assert_eq!(handle.wait().await.unwrap(), 128 + 15);
    }

    #[tokio::test]
    async fn test_destroy_after_exit_is_harmless() {
        let mut handle = UnixProcessSpawner.spawn(&shell("exit 3")).await.unwrap();
        assert_eq!(handle.wait().await.unwrap(), 3);

        assert!(handle.destroy().await.is_ok());
    }
}
