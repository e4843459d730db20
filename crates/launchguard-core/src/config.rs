use crate::error::LaunchError;
use crate::process::ProcessQuery;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Timing and classification constants of a single launch attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSettings {
    /// Maximum number of pid lookups per attempt
    #[serde(default = "default_max_pid_lookups")]
    pub max_pid_lookups: u32,

    /// Pause between two pid lookups (in milliseconds)
    #[serde(default = "default_pid_lookup_interval_ms")]
    pub pid_lookup_interval_ms: u64,

    /// Pause before the first lookup when the probe asks for it (in milliseconds)
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    /// Exit code of the known crash that is worth a new attempt
    #[serde(default = "default_transient_exit_code")]
    pub transient_exit_code: i32,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            max_pid_lookups: default_max_pid_lookups(),
            pid_lookup_interval_ms: default_pid_lookup_interval_ms(),
            startup_grace_ms: default_startup_grace_ms(),
            transient_exit_code: default_transient_exit_code(),
        }
    }
}

impl LaunchSettings {
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.max_pid_lookups == 0 {
            return Err(LaunchError::InvalidSettings(
                "max_pid_lookups must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn pid_lookup_interval(&self) -> Duration {
        Duration::from_millis(self.pid_lookup_interval_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }
}

/// Configuration for the retry loop wrapped around launch attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Minimum delay between attempts (in milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum delay between attempts (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Total number of attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to use exponential backoff (true) or a fixed delay (false)
    #[serde(default = "default_use_exponential_backoff")]
    pub use_exponential_backoff: bool,

    /// Whether to randomize delays
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            use_exponential_backoff: default_use_exponential_backoff(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Many quick attempts, for workers that crash often at startup
    pub fn aggressive() -> Self {
        Self {
            min_delay_ms: 50,
            max_delay_ms: 10_000,
            max_attempts: 10,
            use_exponential_backoff: true,
            jitter: true,
        }
    }

    /// Few attempts with a fixed delay
    pub fn conservative() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 2_000,
            max_attempts: 2,
            use_exponential_backoff: false,
            jitter: false,
        }
    }

    /// A single attempt, transient failures included
    pub fn no_retry() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: 1,
            use_exponential_backoff: false,
            jitter: false,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!(
                "min_delay_ms cannot be greater than max_delay_ms"
            ));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("max_attempts must be at least 1"));
        }

        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Number of attempts made after the first one
    pub fn retries(&self) -> usize {
        self.max_attempts.saturating_sub(1) as usize
    }
}

/// What to hand to the operating system to start a worker
#[derive(Default, Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option))]
pub struct LaunchSpec {
    pub command: String,
    #[builder(default)]
    #[builder(setter(custom))]
    pub args: Vec<String>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn builder() -> LaunchSpecBuilder {
        LaunchSpecBuilder::default()
    }
}

impl LaunchSpecBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());
        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

/// Everything the retrying launcher needs to start one worker
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct LauncherConfig {
    pub spec: LaunchSpec,
    pub query: ProcessQuery,
    #[builder(default)]
    pub settings: LaunchSettings,
    #[builder(default)]
    pub retry: RetryConfig,
}

impl LauncherConfig {
    pub fn builder() -> LauncherConfigBuilder {
        LauncherConfigBuilder::default()
    }
}

// Default value functions for serde
fn default_max_pid_lookups() -> u32 {
    10
}
fn default_pid_lookup_interval_ms() -> u64 {
    250
}
fn default_startup_grace_ms() -> u64 {
    2_000
}
fn default_transient_exit_code() -> i32 {
    81
}
fn default_min_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_use_exponential_backoff() -> bool {
    false
}
