//! # Workload Discovery
//!
//! Producers yield work items one at a time and signal the end of the
//! workload with `None`. A producer is drained exactly once, before
//! partitioning; any error aborts the run before dispatch.

pub mod link_follower;
pub mod sequence;

pub use link_follower::{LinkFollowingDiscovery, PageSource, StaticPageSource};
pub use sequence::SequenceDiscovery;

use crate::error::DiscoveryError;
use crate::orchestration::types::WorkItem;
use async_trait::async_trait;
use tracing::debug;

/// Lazy, finite, non-restartable sequence of work items
#[async_trait]
pub trait DiscoveryProducer: Send {
    /// Next item, or `None` once the workload is exhausted
    async fn next_item(&mut self) -> Result<Option<WorkItem>, DiscoveryError>;
}

/// Drain `producer` into a vector, preserving production order
pub async fn collect_work_items<P>(producer: &mut P) -> Result<Vec<WorkItem>, DiscoveryError>
where
    P: DiscoveryProducer + ?Sized,
{
    let mut items = Vec::new();
    while let Some(item) = producer.next_item().await? {
        items.push(item);
    }
    debug!(items = items.len(), "Discovery finished");
    Ok(items)
}
