use std::time::Duration;

/// Contract violations reported by [`TimerHandle`](crate::TimerHandle) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The timeout interval can't be added to the monotonic clock.
    #[error("timeout interval {0:?} overflows the monotonic clock")]
    InvalidArgument(Duration),

    /// The operation is not valid in the timer's current state.
    #[error("invalid timer state: {0}")]
    InvalidState(&'static str),
}

/// Result type returns by this crate functions.
pub type Result<T> = std::result::Result<T, Error>;
