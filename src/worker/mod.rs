//! # Worker Capability
//!
//! The stateless processing side of a run. The orchestrator only sees the
//! [`BatchWorker`] contract: one batch in, an opaque JSON output or a
//! classified [`WorkerError`] out.

pub mod throttle;
pub mod traits;

pub use throttle::ReservedConcurrencyWorker;
pub use traits::{BatchWorker, ErrorKind, FnWorker, WorkerError};
