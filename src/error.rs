//! Error taxonomy shared by futures, schedulers, and channels.

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced through rejected futures.
///
/// Settlers may carry their own domain failures through [`Error::Failed`];
/// the remaining variants are produced by the runtime itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A timeout future expired before the work it raced completed
    #[error("operation timed out")]
    TimedOut,

    /// The channel direction needed for this operation has been closed
    #[error("channel closed")]
    Closed,

    /// The operation was abandoned before completion
    #[error("operation cancelled")]
    Cancelled,

    /// A composite future could not settle because of its children
    #[error("dependency failed: {0}")]
    DependencyFailed(String),

    /// Generic failure carrying a caller-supplied message
    #[error("{0}")]
    Failed(String),
}

impl Error {
    /// Creates a generic failure with the given message.
    pub fn failed(message: impl Into<String>) -> Self {
        Error::Failed(message.into())
    }

    /// Creates a dependency failure with the given message.
    pub fn dependency_failed(message: impl Into<String>) -> Self {
        Error::DependencyFailed(message.into())
    }
}
