//! Error types for lazy-stream
//!
//! Failures here are local to the call that triggered them. Nothing is
//! retried; values that fail to compute travel as `Err` items through a
//! `Functor<Result<T, E>>` and are recovered with `catch`.

/// Main error type for stream operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    /// `push` on a stream whose source cannot be written to
    #[error("Attempt to push to unpushable stream")]
    Unwritable,
    /// `start` on a stream whose source cannot be started
    #[error("Attempt to start unstartable stream")]
    Unstartable,
    /// `push` or `start` after the stream began stopping or completed
    #[error("Cannot push to or start a stopped stream")]
    Stopped,
    /// The stream was dropped before it completed
    #[error("Stream dropped before completion")]
    Cancelled,
    /// Push beyond a configured buffer maximum
    #[error("Buffer overflow: capacity {0} exceeded")]
    BackpressureOverflow(usize),
    /// Bad argument to a combinator
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Custom error with message
    #[error("Stream error: {0}")]
    Custom(String),
}

/// Result type for lazy-stream operations
pub type StreamResult<T> = Result<T, StreamError>;
