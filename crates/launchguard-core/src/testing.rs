//! Scripted doubles for spawner, handle and probe.

use crate::config::LaunchSpec;
use crate::error::LaunchError;
use crate::process::{ProcessHandle, ProcessId, ProcessIdProbe, ProcessQuery, ProcessSpawner};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// How a scripted worker behaves
#[derive(Debug, Clone, Copy, Default)]
pub struct Script {
    /// Exit with `.1` once `.0` exit checks reported it running
    pub exit_after: Option<(u32, i32)>,
    pub destroy_fails: bool,
    /// Every exit check fails with an I/O error
    pub exit_check_fails: bool,
}

impl Script {
    pub fn alive() -> Self {
        Self::default()
    }

    pub fn exits_immediately(code: i32) -> Self {
        Self {
            exit_after: Some((0, code)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct HandleLog {
    pub spawned: AtomicU32,
    pub exit_checks: AtomicU32,
    pub destroyed: AtomicU32,
    pub first_check_at: Mutex<Option<Instant>>,
}

impl HandleLog {
    pub fn exit_checks(&self) -> u32 {
        self.exit_checks.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> u32 {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn first_check_at(&self) -> Option<Instant> {
        *self.first_check_at.lock().unwrap()
    }
}

#[derive(Debug)]
pub struct ScriptedHandle {
    script: Script,
    checks: u32,
    exited: Option<i32>,
    log: Arc<HandleLog>,
}

#[async_trait]
impl ProcessHandle for ScriptedHandle {
    fn os_pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn command(&self) -> &str {
        "scripted-worker"
    }

    async fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        self.log.exit_checks.fetch_add(1, Ordering::SeqCst);
        self.log
            .first_check_at
            .lock()
            .unwrap()
            .get_or_insert_with(Instant::now);

        if self.script.exit_check_fails {
            return Err(std::io::Error::other("wait status unavailable"));
        }
        if let Some((after, code)) = self.script.exit_after {
            if self.checks >= after {
                self.exited = Some(code);
            }
        }
        self.checks += 1;
        Ok(self.exited)
    }

    async fn wait(&mut self) -> std::io::Result<i32> {
        Ok(self.exited.unwrap_or(0))
    }

    async fn destroy(&mut self) -> Result<()> {
        self.log.destroyed.fetch_add(1, Ordering::SeqCst);
        if self.script.destroy_fails {
            anyhow::bail!("operation not permitted");
        }
        self.exited = Some(143);
        Ok(())
    }
}

/// Hands out one scripted handle per spawn, in order
pub struct ScriptedSpawner {
    scripts: Mutex<VecDeque<Script>>,
    pub log: Arc<HandleLog>,
}

impl ScriptedSpawner {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            log: Arc::new(HandleLog::default()),
        }
    }
}

#[async_trait]
impl ProcessSpawner for ScriptedSpawner {
    type Handle = ScriptedHandle;

    async fn spawn(&self, spec: &LaunchSpec) -> Result<ScriptedHandle, LaunchError> {
        let script = self.scripts.lock().unwrap().pop_front().ok_or_else(|| {
            LaunchError::SpawnFailed {
                command: spec.command.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no script left"),
            }
        })?;
        self.log.spawned.fetch_add(1, Ordering::SeqCst);

        Ok(ScriptedHandle {
            script,
            checks: 0,
            exited: None,
            log: self.log.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub struct ScriptedProbe {
    pub can_find: bool,
    pub grace: bool,
    /// Report the pid on this lookup (1-based); never when None
    pub found_on: Option<u32>,
    pub fails: bool,
    lookups: AtomicU32,
}

impl ScriptedProbe {
    pub fn finding_on(lookup: u32) -> Self {
        Self {
            can_find: true,
            found_on: Some(lookup),
            ..Self::default()
        }
    }

    pub fn never_finding() -> Self {
        Self {
            can_find: true,
            ..Self::default()
        }
    }

    pub fn unsupported() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            can_find: true,
            fails: true,
            ..Self::default()
        }
    }

    pub fn with_grace(mut self) -> Self {
        self.grace = true;
        self
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessIdProbe for ScriptedProbe {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn can_find_pid(&self) -> bool {
        self.can_find
    }

    async fn find_pid(&self, _query: &ProcessQuery) -> Result<Option<ProcessId>> {
        let lookup = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fails {
            anyhow::bail!("process table unavailable");
        }
        Ok(match self.found_on {
            Some(n) if lookup >= n => Some(ProcessId(4242)),
            _ => None,
        })
    }

    fn requires_startup_grace(&self) -> bool {
        self.grace
    }
}

pub fn spec() -> LaunchSpec {
    LaunchSpec::builder()
        .command("scripted-worker")
        .args(["--accept=pipe,name=office1"])
        .build()
        .unwrap()
}

pub fn query() -> ProcessQuery {
    ProcessQuery::new("scripted-worker", "--accept=pipe,name=office1")
}
