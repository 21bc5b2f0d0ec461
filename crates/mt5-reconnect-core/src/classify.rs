//! Transport failure classification.
//!
//! Executors only reconnect on transport failures that mean "the peer went
//! away". Everything else is surfaced to the caller as-is.

/// A transport error that can tell whether reconnecting may fix it.
pub trait TransportFailure: std::error::Error + Send + Sync + 'static {
    /// Returns `true` if the failure means the channel is unavailable and a
    /// reconnect followed by a retry may succeed.
    fn is_transient(&self) -> bool;
}

impl TransportFailure for std::io::Error {
    fn is_transient(&self) -> bool {
        use std::io::ErrorKind;

        matches!(
            self.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
        )
    }
}

#[cfg(feature = "tonic")]
impl TransportFailure for tonic::Status {
    fn is_transient(&self) -> bool {
        self.code() == tonic::Code::Unavailable
    }
}
