use crate::orchestration::types::Batch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Failure classes a worker invocation can report
///
/// Retryability is not a property of the kind itself; it comes from
/// membership in the active [`RetryPolicy`](crate::orchestration::RetryPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The worker service itself failed
    ServiceException,
    /// The invoking client failed before or while calling the worker
    ClientException,
    /// The worker refused the invocation because it is at capacity
    ThrottlingException,
    /// The worker ran and reported an unhandled failure
    GenericTaskFailure,
    /// The failure could not be classified further
    UnknownTransientError,
    /// The invocation exceeded its per-attempt timeout
    Timeout,
    /// The worker rejected the batch payload
    InvalidPayload,
    /// The caller is not allowed to invoke the worker
    AccessDenied,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        Self::ServiceException,
        Self::ClientException,
        Self::ThrottlingException,
        Self::GenericTaskFailure,
        Self::UnknownTransientError,
        Self::Timeout,
        Self::InvalidPayload,
        Self::AccessDenied,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceException => "ServiceException",
            Self::ClientException => "ClientException",
            Self::ThrottlingException => "ThrottlingException",
            Self::GenericTaskFailure => "GenericTaskFailure",
            Self::UnknownTransientError => "UnknownTransientError",
            Self::Timeout => "Timeout",
            Self::InvalidPayload => "InvalidPayload",
            Self::AccessDenied => "AccessDenied",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Invalid error kind: {s}"))
    }
}

/// Classified failure returned by a worker invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct WorkerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl WorkerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ThrottlingException, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }
}

/// Stateless capability that processes one batch
///
/// Implementations must tolerate being invoked again with the same batch;
/// the orchestrator retries without deduplicating side effects.
#[async_trait]
pub trait BatchWorker: Send + Sync {
    async fn invoke(&self, batch: &Batch) -> Result<Value, WorkerError>;

    /// Name used in logs and reports
    fn worker_name(&self) -> &str {
        "batch_worker"
    }
}

#[async_trait]
impl<T: BatchWorker + ?Sized> BatchWorker for Arc<T> {
    async fn invoke(&self, batch: &Batch) -> Result<Value, WorkerError> {
        (**self).invoke(batch).await
    }

    fn worker_name(&self) -> &str {
        (**self).worker_name()
    }
}

/// Adapter turning an async closure into a [`BatchWorker`]
pub struct FnWorker<F> {
    name: String,
    handler: F,
}

impl<F, Fut> FnWorker<F>
where
    F: Fn(Batch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, WorkerError>> + Send,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> BatchWorker for FnWorker<F>
where
    F: Fn(Batch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, WorkerError>> + Send,
{
    async fn invoke(&self, batch: &Batch) -> Result<Value, WorkerError> {
        (self.handler)(batch.clone()).await
    }

    fn worker_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::types::WorkItem;
    use serde_json::json;

    #[test]
    fn test_error_kind_string_conversion() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.to_string().parse::<ErrorKind>().unwrap(), kind);
        }
        assert!("Lambda.Unknown".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_error_kind_serde() {
        let json = serde_json::to_string(&ErrorKind::ThrottlingException).unwrap();
        assert_eq!(json, "\"ThrottlingException\"");
    }

    #[test]
    fn test_worker_error_display() {
        let err = WorkerError::throttled("reserved concurrency reached");
        assert_eq!(err.to_string(), "ThrottlingException: reserved concurrency reached");
    }

    #[tokio::test]
    async fn test_fn_worker_invokes_closure() {
        let worker = FnWorker::new("echo", |batch: Batch| async move {
            Ok(json!({ "count": batch.len() }))
        });
        let batch = Batch::new(0, vec![WorkItem::new("a"), WorkItem::new("b")]);

        let output = worker.invoke(&batch).await.unwrap();

        assert_eq!(output, json!({ "count": 2 }));
        assert_eq!(worker.worker_name(), "echo");
    }
}
