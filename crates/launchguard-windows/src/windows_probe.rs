use anyhow::Result;
use async_trait::async_trait;
use launchguard_core::{ProcessId, ProcessIdProbe, ProcessQuery};
use std::sync::Mutex;
use sysinfo::{Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

/// Finds worker pids in the Windows process list.
///
/// Image names and arguments are compared case-insensitively. The image
/// name stands in for the first argv element, which Windows command lines
/// often quote or omit.
pub struct WindowsProcessIdProbe {
    system: Mutex<System>,
}

impl Default for WindowsProcessIdProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowsProcessIdProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

#[async_trait]
impl ProcessIdProbe for WindowsProcessIdProbe {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn can_find_pid(&self) -> bool {
        true
    }

    async fn find_pid(&self, query: &ProcessQuery) -> Result<Option<ProcessId>> {
        let query = ProcessQuery::new(
            query.command().to_lowercase(),
            query.argument().to_lowercase(),
        );

        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("process list lock poisoned"))?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let pid = system
            .processes()
            .iter()
            .filter(|(_, process)| query.matches(&searchable_argv(process)))
            .map(|(pid, _)| pid.as_u32())
            .min();

        debug!(pid = ?pid, "Scanned Windows process list");
        Ok(pid.map(ProcessId::from))
    }
}

/// Lowercased argv with the image name in place of the first element
fn searchable_argv(process: &Process) -> Vec<String> {
    std::iter::once(process.name().to_string_lossy().to_lowercase())
        .chain(
            process
                .cmd()
                .iter()
                .skip(1)
                .map(|arg| arg.to_string_lossy().to_lowercase()),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_query_is_not_found() {
        let probe = WindowsProcessIdProbe::new();
        assert!(probe.can_find_pid());
        assert!(!probe.requires_startup_grace());

        let query = ProcessQuery::new("LaunchGuard-No-Such-Worker.exe", "--token=7f1e");
        assert_eq!(probe.find_pid(&query).await.unwrap(), None);
    }
}
