//! Core infrastructure for mt5-reconnect.
//!
//! This crate holds the pieces shared by the unary and streaming executors
//! that carry no retry logic of their own:
//! - Error taxonomy ([`ExecutorError`], [`ApiError`], [`ConnectError`])
//! - Transport failure classification ([`TransportFailure`])
//! - Cooperative cancellation ([`CancellationSignal`])
//! - Event system for observability

pub mod cancel;
pub mod classify;
pub mod error;
pub mod events;

pub use cancel::CancellationSignal;
pub use classify::TransportFailure;
pub use error::{ApiError, BoxError, ConnectError, ExecutorError, TERMINAL_INSTANCE_NOT_FOUND};
pub use events::{EventListener, EventListeners, ExecutorEvent, FnListener};
