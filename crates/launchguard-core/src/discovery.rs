use crate::error::LaunchError;
use crate::process::{ProcessHandle, ProcessId, ProcessIdProbe, ProcessQuery};
use std::time::Duration;
use tracing::debug;

/// What a discovery run learned about the freshly spawned worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// The process terminated with this exit code
    Exited(i32),
    /// The probe cannot look up pids on this platform
    Unsupported,
    /// The process is alive and its pid is visible
    Found(ProcessId),
    /// The process stayed alive but its pid never became visible
    NotFound,
}

/// Bounded polling for exit status and pid visibility
#[derive(Debug, Clone, Copy)]
pub struct PidDiscovery {
    max_tries: u32,
    interval: Duration,
}

impl PidDiscovery {
    pub fn new(max_tries: u32, interval: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            interval,
        }
    }

    pub async fn run<H, P>(
        &self,
        handle: &mut H,
        probe: &P,
        query: &ProcessQuery,
    ) -> Result<Discovery, LaunchError>
    where
        H: ProcessHandle + ?Sized,
        P: ProcessIdProbe + ?Sized,
    {
        let mut try_count = 0;
        loop {
            try_count += 1;
            debug!("Trying to find pid, attempt #{try_count}");

            if let Some(code) = handle
                .try_exit_code()
                .await
                .map_err(LaunchError::ExitStatus)?
            {
                return Ok(Discovery::Exited(code));
            }

            if !probe.can_find_pid() {
                debug!(
                    "The {} process id probe does not support finding the pid",
                    probe.name()
                );
                return Ok(Discovery::Unsupported);
            }

            if let Some(pid) = probe.find_pid(query).await? {
                return Ok(Discovery::Found(pid));
            }

            if try_count >= self.max_tries {
                return Ok(Discovery::NotFound);
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
