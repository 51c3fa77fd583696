//! # Orchestration Types
//!
//! Work units that flow from discovery through partitioning to the workers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// One unit of discovered work, usually a page locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn locator(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkItem {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorkItem {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Contiguous, ordered slice of the workload dispatched as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    index: usize,
    items: Vec<WorkItem>,
}

impl Batch {
    pub fn new(index: usize, items: Vec<WorkItem>) -> Self {
        Self { index, items }
    }

    /// Position of this batch in partition order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }

    /// Wire form sent to a worker
    pub fn payload(&self) -> BatchPayload {
        BatchPayload {
            url: self.items.iter().map(|item| item.locator().to_string()).collect(),
        }
    }
}

/// Worker invocation payload: the batch's locators in order under `url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub url: Vec<String>,
}

impl BatchPayload {
    /// JSON object exactly as serde serializes the payload
    pub fn to_value(&self) -> Value {
        json!(self)
    }
}
