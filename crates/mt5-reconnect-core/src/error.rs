//! Error taxonomy shared by the executors.
//!
//! A call through an executor ends in exactly one of these classifications:
//!
//! - [`ExecutorError::Api`]: the terminal answered with a business error. The
//!   code and message are carried through untouched.
//! - [`ExecutorError::Connect`]: the session could not be re-established, so
//!   the call was never retried.
//! - [`ExecutorError::Transport`]: the transport failed in a way that is not
//!   recoverable by reconnecting, or recovery was already spent.
//! - [`ExecutorError::Cancelled`]: the caller asked the call to stop.
//! - [`ExecutorError::DeadlineExceeded`]: an attempt ran past its deadline.
//!
//! # Pattern Matching
//!
//! ```rust
//! use mt5_reconnect_core::ExecutorError;
//!
//! fn describe(error: &ExecutorError<std::io::Error>) -> String {
//!     match error {
//!         ExecutorError::Api(api) => format!("terminal said {}", api.code()),
//!         ExecutorError::Connect(e) => format!("could not recover: {}", e),
//!         ExecutorError::Transport(e) => format!("transport: {}", e),
//!         ExecutorError::Cancelled => "stopped".to_string(),
//!         ExecutorError::DeadlineExceeded => "too slow".to_string(),
//!     }
//! }
//! ```

use thiserror::Error;

/// Error code the terminal uses when it no longer knows the caller's
/// instance id.
pub const TERMINAL_INSTANCE_NOT_FOUND: &str = "TERMINAL_INSTANCE_NOT_FOUND";

/// Boxed error used for collaborator failures of unknown type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A business error decoded from an otherwise successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{code}: {message}")]
pub struct ApiError {
    code: String,
    message: String,
}

impl ApiError {
    /// Creates a business error from its code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates the error the terminal sends for an unknown instance id.
    pub fn instance_not_found(message: impl Into<String>) -> Self {
        Self::new(TERMINAL_INSTANCE_NOT_FOUND, message)
    }

    /// Returns the error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if this error carries the given stale-session marker.
    pub fn is_stale_session(&self, marker: &str) -> bool {
        self.code == marker
    }
}

/// Failure of the reconnect primitive.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The reconnect did not finish before the call deadline.
    #[error("reconnect did not complete before the deadline")]
    Timeout,

    /// The session server answered the connect request with a business error.
    #[error("session rejected: {0}")]
    Rejected(#[source] ApiError),

    /// The connect request failed in transport.
    #[error("session transport failed: {0}")]
    Transport(#[source] BoxError),
}

impl ConnectError {
    /// Wraps any error as a transport-level connect failure.
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        ConnectError::Transport(error.into())
    }

    /// Returns `true` if the reconnect ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectError::Timeout)
    }
}

/// Errors returned by the unary and streaming executors.
///
/// `E` is the transport error type of the wrapped calls, for example
/// `tonic::Status`.
#[derive(Debug, Error)]
pub enum ExecutorError<E> {
    /// The reply carried a business error.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Reconnecting the session failed.
    #[error("reconnect failed: {0}")]
    Connect(#[from] ConnectError),

    /// The transport failed and the failure was not recovered.
    #[error("transport error: {0}")]
    Transport(#[source] E),

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// The attempt did not complete before its deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl<E> ExecutorError<E> {
    /// Returns `true` if this is a business error.
    pub fn is_api(&self) -> bool {
        matches!(self, ExecutorError::Api(_))
    }

    /// Returns `true` if reconnecting failed.
    pub fn is_connect(&self) -> bool {
        matches!(self, ExecutorError::Connect(_))
    }

    /// Returns `true` if this is an unrecovered transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, ExecutorError::Transport(_))
    }

    /// Returns `true` if the caller cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutorError::Cancelled)
    }

    /// Returns `true` if an attempt ran past its deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ExecutorError::DeadlineExceeded)
    }

    /// Returns `true` if this is a business error with the given stale-session
    /// marker, i.e. recovery was attempted and the session was still unknown.
    pub fn is_stale_session(&self, marker: &str) -> bool {
        matches!(self, ExecutorError::Api(api) if api.is_stale_session(marker))
    }

    /// Returns the business error, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ExecutorError::Api(api) => Some(api),
            _ => None,
        }
    }

    /// Extracts the transport error, if this is a `Transport` variant.
    pub fn into_transport(self) -> Option<E> {
        match self {
            ExecutorError::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the transport error using a function.
    ///
    /// ```
    /// use mt5_reconnect_core::ExecutorError;
    ///
    /// let err: ExecutorError<String> = ExecutorError::Transport("reset".to_string());
    /// let mapped: ExecutorError<usize> = err.map_transport(|s| s.len());
    /// assert_eq!(mapped.into_transport(), Some(5));
    /// ```
    pub fn map_transport<F, T>(self, f: F) -> ExecutorError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ExecutorError::Api(api) => ExecutorError::Api(api),
            ExecutorError::Connect(e) => ExecutorError::Connect(e),
            ExecutorError::Transport(e) => ExecutorError::Transport(f(e)),
            ExecutorError::Cancelled => ExecutorError::Cancelled,
            ExecutorError::DeadlineExceeded => ExecutorError::DeadlineExceeded,
        }
    }
}
