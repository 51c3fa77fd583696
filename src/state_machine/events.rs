use crate::worker::WorkerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that drive batch state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BatchEvent {
    /// A concurrency slot was granted
    Admit,
    /// The worker returned an output
    Complete(Value),
    /// The worker returned a classified failure
    Fail(WorkerError),
}

impl BatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Admit => "admit",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
        }
    }
}
