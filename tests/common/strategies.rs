use fanout_core::worker::ErrorKind;
use proptest::prelude::*;
use std::time::Duration;

/// Workload sizes, including the empty workload
pub fn item_count_strategy() -> impl Strategy<Value = usize> {
    0usize..500
}

pub fn batch_count_strategy() -> impl Strategy<Value = usize> {
    1usize..64
}

pub fn concurrency_cap_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}

/// Per-batch worker latencies between 1ms and 50ms
pub fn latency_profile_strategy() -> impl Strategy<Value = Vec<Duration>> {
    prop::collection::vec((1u64..=50).prop_map(Duration::from_millis), 1..40)
}

pub fn error_kind_strategy() -> impl Strategy<Value = ErrorKind> {
    prop::sample::select(ErrorKind::ALL.to_vec())
}
