//! One spawn of a worker process, classified into a retry decision.
//!
//! A [`LaunchAttempt`] spawns the worker, waits out the platform startup
//! grace when the probe asks for it, runs [`PidDiscovery`] and turns what it
//! observed into a [`LaunchOutcome`]:
//!
//! | observation                              | outcome            |
//! |------------------------------------------|--------------------|
//! | died with the known transient exit code  | `TransientFailure` |
//! | died with any other exit code            | `PermanentFailure` |
//! | alive, pid lookup supported but no match | `TransientFailure` (worker destroyed) |
//! | alive, pid found or lookup unsupported   | `Success`          |
//!
//! Spawn errors and probe errors are not outcomes; they are returned as
//! [`LaunchError`].

use crate::config::{LaunchSettings, LaunchSpec};
use crate::discovery::{Discovery, PidDiscovery};
use crate::error::LaunchError;
use crate::process::{ProcessHandle, ProcessId, ProcessIdProbe, ProcessQuery, ProcessSpawner};
use tracing::{debug, info, warn};

/// A worker that survived its launch attempt
#[derive(Debug)]
pub struct StartedProcess<H> {
    handle: H,
    pid: Option<ProcessId>,
}

impl<H> StartedProcess<H> {
    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    /// Confirmed pid, None when the probe cannot look pids up
    pub fn pid(&self) -> Option<ProcessId> {
        self.pid
    }

    pub fn into_parts(self) -> (H, Option<ProcessId>) {
        (self.handle, self.pid)
    }
}

/// Three-way decision handed to the retry driver
#[derive(Debug)]
pub enum LaunchOutcome<H> {
    Success(StartedProcess<H>),
    /// A new attempt may succeed
    TransientFailure { reason: String },
    /// Retrying is pointless
    PermanentFailure { reason: String },
}

impl<H> LaunchOutcome<H> {
    pub fn is_success(&self) -> bool {
        matches!(self, LaunchOutcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LaunchOutcome::TransientFailure { .. })
    }
}

/// Runs launch attempts one at a time and remembers what the last one saw
#[derive(Debug, Clone, Default)]
pub struct LaunchAttempt {
    settings: LaunchSettings,
    exit_code: Option<i32>,
    process_id: Option<ProcessId>,
}

impl LaunchAttempt {
    pub fn new(settings: LaunchSettings) -> Result<Self, LaunchError> {
        settings.validate()?;
        Ok(Self {
            settings,
            exit_code: None,
            process_id: None,
        })
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Exit code observed by the last attempt
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Pid resolved by the last attempt
    pub fn process_id(&self) -> Option<ProcessId> {
        self.process_id
    }

    pub async fn run<S, P>(
        &mut self,
        spawner: &S,
        spec: &LaunchSpec,
        query: &ProcessQuery,
        probe: &P,
    ) -> Result<LaunchOutcome<S::Handle>, LaunchError>
    where
        S: ProcessSpawner + ?Sized,
        P: ProcessIdProbe + ?Sized,
    {
        self.exit_code = None;
        self.process_id = None;

        let mut handle = spawner.spawn(spec).await?;

        // FreeBSD workers hang on their first connection unless left alone
        // for a while after spawn. The cause is unknown.
        if probe.requires_startup_grace() {
            debug!(
                "Waiting {:?} for process to start ({} probe)",
                self.settings.startup_grace(),
                probe.name()
            );
            tokio::time::sleep(self.settings.startup_grace()).await;
        }

        let discovery = PidDiscovery::new(
            self.settings.max_pid_lookups,
            self.settings.pid_lookup_interval(),
        );
        match discovery.run(&mut handle, probe, query).await {
            Ok(Discovery::Exited(code)) => self.exit_code = Some(code),
            Ok(Discovery::Found(pid)) => self.process_id = Some(pid),
            Ok(Discovery::Unsupported | Discovery::NotFound) => {}
            Err(e) => {
                destroy_quietly(&mut handle).await;
                return Err(e);
            }
        }

        if let Some(code) = self.exit_code {
            if code == self.settings.transient_exit_code {
                warn!("Worker process died with exit code {code}; restarting it");
                return Ok(LaunchOutcome::TransientFailure {
                    reason: format!("Worker process died with exit code {code}"),
                });
            }

            return Ok(LaunchOutcome::PermanentFailure {
                reason: format!("Worker process died with exit code: {code}"),
            });
        }

        if probe.can_find_pid() && self.process_id.is_none() {
            destroy_quietly(&mut handle).await;
            let reason = format!(
                "A process with argument '{}' started but its pid could not be found",
                query.argument()
            );
            warn!("{reason}; restarting it");
            return Ok(LaunchOutcome::TransientFailure { reason });
        }

        info!(
            command = %handle.command(),
            pid = ?self.process_id,
            "Worker process started"
        );
        Ok(LaunchOutcome::Success(StartedProcess {
            handle,
            pid: self.process_id,
        }))
    }
}

/// Destroy a worker that failed its attempt. Errors are logged and never
/// replace the failure being reported.
async fn destroy_quietly<H: ProcessHandle + ?Sized>(handle: &mut H) {
    if let Err(e) = handle.destroy().await {
        warn!("Unable to destroy the process: {e:#}");
    }
}
