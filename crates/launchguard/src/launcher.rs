use crate::factory::{PlatformSpawner, platform_probe};
use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder, Retryable};
use launchguard_core::{
    LaunchAttempt, LaunchError, LaunchOutcome, LauncherConfig, ProcessIdProbe, ProcessSpawner,
    RetryConfig, StartError, StartedProcess,
};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Starts a worker, repeating launch attempts while they fail transiently
pub struct WorkerLauncher<S = PlatformSpawner, P = Box<dyn ProcessIdProbe>> {
    config: LauncherConfig,
    spawner: S,
    probe: P,
    attempt: Mutex<LaunchAttempt>,
}

impl WorkerLauncher {
    /// Create a launcher using the spawner and probe of the current platform
    pub fn new(config: LauncherConfig) -> Result<Self, LaunchError> {
        Self::with_platform(config, PlatformSpawner::default(), platform_probe())
    }
}

impl<S: ProcessSpawner, P: ProcessIdProbe> WorkerLauncher<S, P> {
    pub fn with_platform(config: LauncherConfig, spawner: S, probe: P) -> Result<Self, LaunchError> {
        config
            .retry
            .validate()
            .map_err(|e| LaunchError::InvalidSettings(e.to_string()))?;
        let attempt = LaunchAttempt::new(config.settings.clone())?;

        Ok(Self {
            config,
            spawner,
            probe,
            attempt: Mutex::new(attempt),
        })
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Exit code seen by the most recent attempt
    pub async fn last_exit_code(&self) -> Option<i32> {
        self.attempt.lock().await.exit_code()
    }

    /// Run attempts until one succeeds, one fails permanently or the retry
    /// budget is spent.
    pub async fn start(&self) -> Result<StartedProcess<S::Handle>, StartError> {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let operation = move || async move {
            let number = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Starting {}, attempt #{number}", self.config.spec.command);

            let mut attempt = self.attempt.lock().await;
            let outcome = attempt
                .run(
                    &self.spawner,
                    &self.config.spec,
                    &self.config.query,
                    &self.probe,
                )
                .await;

            match outcome {
                Ok(LaunchOutcome::Success(process)) => Ok(process),
                Ok(LaunchOutcome::TransientFailure { reason }) => Err(StartError::Transient(reason)),
                Ok(LaunchOutcome::PermanentFailure { reason }) => Err(StartError::Permanent(reason)),
                Err(e) => Err(StartError::Launch(e)),
            }
        };

        let result = drive(operation, &self.config.retry).await;

        let attempts = attempts.load(Ordering::SeqCst);
        match &result {
            Ok(process) => info!(
                pid = ?process.pid(),
                "{} started after {attempts} attempt(s)",
                self.config.spec.command
            ),
            Err(e) => error!(
                "Giving up on {} after {attempts} attempt(s): {e}",
                self.config.spec.command
            ),
        }
        result
    }
}

/// Hand the attempt loop to backon with a policy derived from `retry`
async fn drive<T, F, Fut>(operation: F, retry: &RetryConfig) -> Result<T, StartError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StartError>>,
{
    if retry.use_exponential_backoff {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(retry.min_delay())
            .with_max_delay(retry.max_delay())
            .with_max_times(retry.retries());
        if retry.jitter {
            builder = builder.with_jitter();
        }
        with_backoff(operation, builder).await
    } else {
        let mut builder = ConstantBuilder::default()
            .with_delay(retry.min_delay())
            .with_max_times(retry.retries());
        if retry.jitter {
            builder = builder.with_jitter();
        }
        with_backoff(operation, builder).await
    }
}

async fn with_backoff<T, F, Fut, B>(operation: F, backoff: B) -> Result<T, StartError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StartError>>,
    B: BackoffBuilder,
{
    operation
        .retry(backoff)
        .when(StartError::is_retryable)
        .notify(|e: &StartError, delay| warn!("{e}; retrying in {delay:?}"))
        .await
}
