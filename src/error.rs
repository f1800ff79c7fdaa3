//! Error types for the polling consumer and its collaborators.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Errors raised by a [`Queue`](crate::queue::Queue) implementation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Connection to the broker failed or was lost.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The transport gave up waiting for the broker.
    #[error("queue operation timed out")]
    Timeout,
    /// Any other transport error.
    #[error("queue error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by a subscriber while handling a notification.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler refused the message.
    #[error("rejected: {0}")]
    Rejected(String),
    /// A terminal operation called from inside the handler failed.
    #[error("consumer error: {0}")]
    Consumer(Box<ConsumerError>),
    /// Other error.
    #[error("handler error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<ConsumerError> for HandlerError {
    fn from(err: ConsumerError) -> Self {
        HandlerError::Consumer(Box::new(err))
    }
}

/// Errors surfaced by [`PollingConsumer`](crate::PollingConsumer).
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Bad input, e.g. a negative prefetch limit or a zero tick interval.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is not valid in the consumer's current state (usually closed).
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// The queue failed to fetch or terminalize a message.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// A subscriber failed while a message was being dispatched.
    #[error("subscriber failed: {0}")]
    Handler(#[from] HandlerError),
}

impl ConsumerError {
    pub(crate) fn closed(operation: &str) -> Self {
        ConsumerError::IllegalState(format!("{} called on a closed consumer", operation))
    }

    /// True for [`ConsumerError::IllegalState`].
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, ConsumerError::IllegalState(_))
    }

    /// True for [`ConsumerError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ConsumerError::InvalidArgument(_))
    }
}
