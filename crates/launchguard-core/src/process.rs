use crate::config::LaunchSpec;
use crate::error::LaunchError;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Operating-system process identifier confirmed by a [`ProcessIdProbe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Describes how to recognize a spawned worker among the processes visible
/// to the operating system.
///
/// `command` is the executable name as it shows up in the process table and
/// `argument` is the identifying string handed to the worker at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessQuery {
    command: String,
    argument: String,
}

impl ProcessQuery {
    pub fn new(command: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            argument: argument.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn argument(&self) -> &str {
        &self.argument
    }

    /// Check whether a process argv belongs to this query.
    ///
    /// The program file name must be `command`, optionally followed by an
    /// extension (`soffice.bin` matches `soffice`). One of the remaining
    /// arguments must contain `argument`.
    pub fn matches<S: AsRef<str>>(&self, argv: &[S]) -> bool {
        let Some((program, args)) = argv.split_first() else {
            return false;
        };

        let wanted = file_name(&self.command);
        let program = file_name(program.as_ref());
        let program_matches = program == wanted
            || program
                .strip_prefix(wanted)
                .is_some_and(|rest| rest.starts_with('.'));

        program_matches && args.iter().any(|arg| arg.as_ref().contains(&self.argument))
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Handle to a spawned worker process owned by exactly one launch attempt
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Pid reported by the spawn primitive (None once the child was reaped)
    fn os_pid(&self) -> Option<u32>;

    /// Get the command that started this process
    fn command(&self) -> &str;

    /// Exit code if the process already terminated, without blocking
    async fn try_exit_code(&mut self) -> std::io::Result<Option<i32>>;

    /// Wait for the process to exit and return its exit code
    async fn wait(&mut self) -> std::io::Result<i32>;

    /// Ask the operating system to terminate the process
    async fn destroy(&mut self) -> Result<()>;
}

/// Creates fresh process handles from a [`LaunchSpec`]
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// The type of process handle this spawner produces
    type Handle: ProcessHandle;

    async fn spawn(&self, spec: &LaunchSpec) -> Result<Self::Handle, LaunchError>;
}

/// Platform capability for looking up a process id by [`ProcessQuery`].
///
/// A probe that cannot find pids is not an error: launch attempts simply
/// succeed without a confirmed id.
#[async_trait]
pub trait ProcessIdProbe: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &'static str;

    /// Whether this platform supports pid lookup at all
    fn can_find_pid(&self) -> bool;

    /// Look up the pid of the process matching `query`, if it is visible yet
    async fn find_pid(&self, query: &ProcessQuery) -> Result<Option<ProcessId>>;

    /// Whether a fixed grace period must elapse before the first lookup
    fn requires_startup_grace(&self) -> bool {
        false
    }
}

/// Probe for platforms without a process table implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPidLookup;

#[async_trait]
impl ProcessIdProbe for NoPidLookup {
    fn name(&self) -> &'static str {
        "none"
    }

    fn can_find_pid(&self) -> bool {
        false
    }

    async fn find_pid(&self, _query: &ProcessQuery) -> Result<Option<ProcessId>> {
        Ok(None)
    }
}

#[async_trait]
impl<P: ProcessIdProbe + ?Sized> ProcessIdProbe for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn can_find_pid(&self) -> bool {
        (**self).can_find_pid()
    }

    async fn find_pid(&self, query: &ProcessQuery) -> Result<Option<ProcessId>> {
        (**self).find_pid(query).await
    }

    fn requires_startup_grace(&self) -> bool {
        (**self).requires_startup_grace()
    }
}
