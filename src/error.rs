use thiserror::Error;

/// Failure reported by the remote log service for anything that is not a
/// recognised conflict.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {message}")]
pub struct ServiceError {
    pub operation: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        ServiceError {
            operation,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PutEventsError {
    /// The token sent with the request is stale; the service reports the one
    /// it expects next.
    #[error("invalid sequence token, expected {expected:?}")]
    InvalidSequenceToken { expected: Option<String> },

    /// The batch was already stored by an earlier request.
    #[error("batch already accepted, expected {expected:?}")]
    DataAlreadyAccepted { expected: Option<String> },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Error)]
pub enum AppenderError {
    #[error("appender is already started")]
    AlreadyStarted,

    #[error("event queue was lost when the worker failed")]
    QueueUnavailable,

    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}
