//! Error types for the interface watcher system
//!
//! Two failure classes exist. Consumer-side failures (overlapping pulls,
//! falling behind, disconnecting) surface here as terminal watcher errors.
//! Producer contract violations are not represented at all: they are
//! defects and abort instead of returning an error.

use std::fmt;

use thiserror::Error;

/// Result type alias for interface watcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a watcher stopped serving events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The consumer let more than the queue capacity of events pile up
    QueueOverflow,
    /// The consumer issued a pull while another one was outstanding
    PendingWatch,
    /// Every consumer handle was dropped
    PeerClosed,
    /// The owning event loop shut down
    Shutdown,
    /// The serving side is gone; seen from the consumer handle only
    Disconnected,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::QueueOverflow => "too many unconsumed events",
            CloseReason::PendingWatch => "watch called while a call was already pending",
            CloseReason::PeerClosed => "peer closed",
            CloseReason::Shutdown => "event loop shut down",
            CloseReason::Disconnected => "disconnected",
        };
        f.write_str(reason)
    }
}

/// Core error type for the interface watcher system
#[derive(Error, Debug)]
pub enum Error {
    /// A pull was issued while another pull on the same watcher was pending
    #[error("not allowed to call watch when a call is already pending")]
    WatchPending,

    /// The watcher has been torn down and will not yield further events
    #[error("watcher closed: {0}")]
    WatcherClosed(CloseReason),

    /// The event loop is no longer accepting notifications or registrations
    #[error("interface watcher event loop is closed")]
    LoopClosed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors (from change sources)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a watcher-closed error
    pub fn closed(reason: CloseReason) -> Self {
        Self::WatcherClosed(reason)
    }

    /// Whether the watcher that produced this error is permanently unusable
    ///
    /// Every watcher error tears the watcher down; there is no retryable
    /// pull failure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::WatchPending | Error::WatcherClosed(_))
    }

    /// The close reason, for errors produced by a torn-down watcher
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self {
            Error::WatcherClosed(reason) => Some(*reason),
            Error::WatchPending => Some(CloseReason::PendingWatch),
            _ => None,
        }
    }
}
