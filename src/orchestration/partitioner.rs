//! # Partitioner
//!
//! Splits an ordered workload into balanced, order-preserving batches.
//!
//! With `N` items and `batch_count` batches, `q, r = N / batch_count,
//! N % batch_count`: the first `r` batches receive `q + 1` items and the
//! rest receive `q`. Batches that would be empty are dropped, so the result
//! has `min(N, batch_count)` entries and any two sizes differ by at most one.

use crate::error::PartitionError;
use crate::orchestration::types::{Batch, WorkItem};

/// Partition `items` into at most `batch_count` balanced batches
pub fn partition(items: Vec<WorkItem>, batch_count: usize) -> Result<Vec<Batch>, PartitionError> {
    if batch_count == 0 {
        return Err(PartitionError::InvalidBatchCount { batch_count });
    }

    let sizes = batch_sizes(items.len(), batch_count);
    let mut remaining = items.into_iter();

    Ok(sizes
        .into_iter()
        .enumerate()
        .map(|(index, size)| Batch::new(index, remaining.by_ref().take(size).collect()))
        .collect())
}

/// Non-empty batch sizes for `total` items over `batch_count` batches
pub fn batch_sizes(total: usize, batch_count: usize) -> Vec<usize> {
    if batch_count == 0 {
        return Vec::new();
    }

    let quotient = total / batch_count;
    let remainder = total % batch_count;

    (0..batch_count)
        .map(|i| if i < remainder { quotient + 1 } else { quotient })
        .filter(|size| *size > 0)
        .collect()
}
