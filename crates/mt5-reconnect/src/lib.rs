//! Session-aware reconnect executors for MetaTrader 5 gRPC calls.
//!
//! Every call to the terminal is routed by the id of a session. When the
//! channel drops, or the terminal answers that it no longer knows that id,
//! the session has to be re-established before the call can succeed. This
//! crate wraps calls so that this happens transparently and at most a
//! bounded number of times per call.
//!
//! - [`UnaryExecutor`]: request/response calls.
//! - [`StreamExecutor`]: server-streaming subscriptions, re-opened after a
//!   reconnect.
//! - [`Session`]: the shared, atomically replaced [`ConnectionContext`] and
//!   the coalescing reconnect primitive, backed by a [`SessionManager`].
//! - [`ReconnectLayer`]: the unary executor as Tower middleware.
//!
//! # Outcomes
//!
//! | Condition | Result |
//! |-----------|--------|
//! | reply without business error | payload |
//! | transient transport failure | reconnect, retry |
//! | stale-session business error | reconnect, retry |
//! | any other business error | [`ExecutorError::Api`] |
//! | reconnect failed | [`ExecutorError::Connect`] |
//! | cancellation observed | [`ExecutorError::Cancelled`] (streams end cleanly) |
//!
//! # Example
//!
//! ```rust
//! use futures::future::{BoxFuture, FutureExt};
//! use futures::StreamExt;
//! use mt5_reconnect::{
//!     ApiError, ConnectError, ExecutorConfig, ReconnectPolicy, Session, SessionManager,
//!     StreamExecutor,
//! };
//! use std::time::Duration;
//!
//! struct Terminal;
//!
//! impl SessionManager for Terminal {
//!     fn connect(
//!         &self,
//!         _deadline: Option<tokio::time::Instant>,
//!     ) -> BoxFuture<'_, Result<String, ConnectError>> {
//!         async { Ok("instance-1".to_string()) }.boxed()
//!     }
//! }
//!
//! struct TickEnvelope {
//!     error: Option<ApiError>,
//!     bid: Option<f64>,
//! }
//!
//! # tokio_test::block_on(async {
//! let session = Session::connect(Terminal, None).await.unwrap();
//! let config = ExecutorConfig::builder()
//!     .name("ticks")
//!     .policy(ReconnectPolicy::exponential(
//!         Duration::from_millis(100),
//!         Duration::from_secs(5),
//!     ))
//!     .build();
//! let executor = StreamExecutor::new(session, config);
//!
//! let ticks = executor.execute(
//!     "EURUSD",
//!     |_symbol, _ctx| async {
//!         let frames = vec![
//!             Ok::<_, std::io::Error>(TickEnvelope { error: None, bid: Some(1.0841) }),
//!             Ok(TickEnvelope { error: None, bid: None }),
//!             Ok(TickEnvelope { error: None, bid: Some(1.0843) }),
//!         ];
//!         Ok::<_, std::io::Error>(futures::stream::iter(frames))
//!     },
//!     |envelope: &TickEnvelope| envelope.error.clone(),
//!     |envelope: TickEnvelope| envelope.bid,
//!     None,
//! );
//!
//! let bids: Vec<f64> = ticks.map(Result::unwrap).collect().await;
//! assert_eq!(bids, vec![1.0841, 1.0843]);
//! # });
//! ```
//!
//! # Feature Flags
//!
//! - `tracing`: log attempts, reconnects and failures
//! - `metrics`: `mt5_calls_total`, `mt5_reconnects_total` and
//!   `mt5_stream_items_total` counters
//! - `serde`: serialize [`ConnectionState`] and [`ApiError`]
//! - `tonic`: build stamped [`tonic::Request`]s from a [`CallContext`] and
//!   classify `tonic::Status`

pub mod backoff;
mod config;
mod context;
mod events;
#[cfg(feature = "tonic")]
mod grpc;
mod layer;
mod policy;
mod recovery;
mod service;
mod session;
mod state;
mod streaming;
mod unary;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::{ExecutorConfig, ExecutorConfigBuilder};
pub use context::{CallContext, CallOptions, ConnectionContext, ROUTING_HEADER};
pub use events::{ReconnectEvent, ReconnectTrigger};
pub use layer::ReconnectLayer;
pub use policy::ReconnectPolicy;
pub use service::{ReconnectService, SessionRequest};
pub use session::{ReconnectOutcome, Session, SessionManager};
pub use state::{ConnectionState, ReconnectState};
pub use streaming::StreamExecutor;
pub use unary::UnaryExecutor;

pub use mt5_reconnect_core::{
    ApiError, BoxError, CancellationSignal, ConnectError, ExecutorError, TransportFailure,
    TERMINAL_INSTANCE_NOT_FOUND,
};
