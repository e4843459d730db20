use anyhow::Result;
use async_trait::async_trait;
use launchguard_core::{ProcessId, ProcessIdProbe, ProcessQuery};
use std::sync::Mutex;
use sysinfo::{Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

/// Finds worker pids by scanning the process table for a matching command line
pub struct UnixProcessIdProbe {
    system: Mutex<System>,
}

impl Default for UnixProcessIdProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl UnixProcessIdProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn scan(&self, query: &ProcessQuery) -> Result<Option<ProcessId>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("process table lock poisoned"))?;
        // A forked child shows its parent's argv until it execs, so the
        // command line is read again on every scan.
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let pid = system
            .processes()
            .iter()
            .filter(|(_, process)| is_live_process(process))
            .filter(|(_, process)| query.matches(&argv(process)))
            .map(|(pid, _)| pid.as_u32())
            .min();

        debug!(
            command = query.command(),
            argument = query.argument(),
            pid = ?pid,
            "Scanned process table"
        );
        Ok(pid.map(ProcessId::from))
    }
}

#[async_trait]
impl ProcessIdProbe for UnixProcessIdProbe {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn can_find_pid(&self) -> bool {
        true
    }

    async fn find_pid(&self, query: &ProcessQuery) -> Result<Option<ProcessId>> {
        self.scan(query)
    }
}

/// Unix probe that also asks for a startup grace period before the first
/// lookup.
///
/// Without the pause, a worker started on FreeBSD accepts its first
/// connection only after several minutes. Nobody has found out why yet.
#[derive(Default)]
pub struct FreeBsdProcessIdProbe {
    inner: UnixProcessIdProbe,
}

impl FreeBsdProcessIdProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessIdProbe for FreeBsdProcessIdProbe {
    fn name(&self) -> &'static str {
        "freebsd"
    }

    fn can_find_pid(&self) -> bool {
        self.inner.can_find_pid()
    }

    async fn find_pid(&self, query: &ProcessQuery) -> Result<Option<ProcessId>> {
        self.inner.find_pid(query).await
    }

    fn requires_startup_grace(&self) -> bool {
        true
    }
}

fn is_live_process(process: &Process) -> bool {
    process.thread_kind().is_none()
        && !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

fn argv(process: &Process) -> Vec<String> {
    process
        .cmd()
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_capabilities() {
        let unix = UnixProcessIdProbe::new();
        assert!(unix.can_find_pid());
        assert!(!unix.requires_startup_grace());

        let freebsd = FreeBsdProcessIdProbe::new();
        assert!(freebsd.can_find_pid());
        assert!(freebsd.requires_startup_grace());
    }

    #[tokio::test]
    async fn test_unknown_query_is_not_found() {
        let probe = UnixProcessIdProbe::new();
        let query = ProcessQuery::new("launchguard-no-such-worker", "--token=0d5c41e2");

        assert_eq!(probe.find_pid(&query).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finds_spawned_worker() {
        let token = format!("launchguard-probe-{}", std::process::id());
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "sleep 30; true", token.as_str()])
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let probe = UnixProcessIdProbe::new();
        let query = ProcessQuery::new("sh", token.as_str());
        let pid = probe.find_pid(&query).await.unwrap();

        assert_eq!(pid, child.id().map(ProcessId::from));

        let other_program = ProcessQuery::new("bash", token.as_str());
        assert_eq!(probe.find_pid(&other_program).await.unwrap(), None);
        child.kill().await.unwrap();
    }
}
