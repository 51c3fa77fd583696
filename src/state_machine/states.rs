use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of one batch's execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Created, waiting for its first concurrency slot
    #[default]
    Pending,
    /// Holding a slot while the worker is invoked
    Running,
    /// Failed retryably, waiting out its backoff delay
    RetryWaiting,
    /// Worker returned an output
    Succeeded,
    /// Failed permanently or ran out of attempts
    Failed,
}

impl BatchState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::RetryWaiting => write!(f, "retry_waiting"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "retry_waiting" => Ok(Self::RetryWaiting),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid batch state: {s}")),
        }
    }
}
