use thiserror::Error;

/// Errors that escape a launch attempt instead of being classified into a
/// [`LaunchOutcome`](crate::LaunchOutcome).
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to spawn process {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to query process exit status: {0}")]
    ExitStatus(#[source] std::io::Error),

    #[error("Process id lookup failed: {0}")]
    ProbeFailed(#[from] anyhow::Error),

    #[error("Invalid launch settings: {0}")]
    InvalidSettings(String),
}

/// Error returned by the retry-driving launcher once it gives up.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("Transient start failure: {0}")]
    Transient(String),

    #[error("Permanent start failure: {0}")]
    Permanent(String),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl StartError {
    /// Check if a new attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StartError::Transient(_))
    }

    /// Check if this error must abort the retry loop
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }
}
