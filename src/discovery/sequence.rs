use super::DiscoveryProducer;
use crate::error::DiscoveryError;
use crate::orchestration::types::WorkItem;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Producer over a pre-enumerated list of items
#[derive(Debug, Clone, Default)]
pub struct SequenceDiscovery {
    remaining: VecDeque<WorkItem>,
}

impl SequenceDiscovery {
    pub fn new(items: impl IntoIterator<Item = impl Into<WorkItem>>) -> Self {
        Self {
            remaining: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

#[async_trait]
impl DiscoveryProducer for SequenceDiscovery {
    async fn next_item(&mut self) -> Result<Option<WorkItem>, DiscoveryError> {
        Ok(self.remaining.pop_front())
    }
}
