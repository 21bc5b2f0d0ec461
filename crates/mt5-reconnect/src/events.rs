use mt5_reconnect_core::events::ExecutorEvent;
use std::fmt;
use std::time::Instant;

/// What made an executor reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectTrigger {
    /// The transport reported the channel as unavailable.
    Transport,
    /// The terminal no longer recognised the session.
    StaleSession,
}

impl ReconnectTrigger {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconnectTrigger::Transport => "transport",
            ReconnectTrigger::StaleSession => "stale_session",
        }
    }
}

impl fmt::Display for ReconnectTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the unary and streaming executors.
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// The session was re-established, or another call already had.
    Reconnected {
        executor_name: String,
        timestamp: Instant,
        trigger: ReconnectTrigger,
        generation: u64,
        /// `true` when a concurrent call had already refreshed the context.
        coalesced: bool,
    },
    /// The reconnect primitive failed.
    ReconnectFailed {
        executor_name: String,
        timestamp: Instant,
        trigger: ReconnectTrigger,
    },
    /// A call or stream ended with a business error.
    ApiError {
        executor_name: String,
        timestamp: Instant,
        code: String,
    },
    /// A call or stream stopped because the caller cancelled it.
    Cancelled {
        executor_name: String,
        timestamp: Instant,
    },
    /// A unary call returned its payload.
    Success {
        executor_name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// A stream subscription was opened again after a reconnect.
    StreamReopened {
        executor_name: String,
        timestamp: Instant,
        generation: u64,
    },
}

impl ExecutorEvent for ReconnectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::Reconnected { .. } => "reconnected",
            ReconnectEvent::ReconnectFailed { .. } => "reconnect_failed",
            ReconnectEvent::ApiError { .. } => "api_error",
            ReconnectEvent::Cancelled { .. } => "cancelled",
            ReconnectEvent::Success { .. } => "success",
            ReconnectEvent::StreamReopened { .. } => "stream_reopened",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::Reconnected { timestamp, .. }
            | ReconnectEvent::ReconnectFailed { timestamp, .. }
            | ReconnectEvent::ApiError { timestamp, .. }
            | ReconnectEvent::Cancelled { timestamp, .. }
            | ReconnectEvent::Success { timestamp, .. }
            | ReconnectEvent::StreamReopened { timestamp, .. } => *timestamp,
        }
    }

    fn executor_name(&self) -> &str {
        match self {
            ReconnectEvent::Reconnected { executor_name, .. }
            | ReconnectEvent::ReconnectFailed { executor_name, .. }
            | ReconnectEvent::ApiError { executor_name, .. }
            | ReconnectEvent::Cancelled { executor_name, .. }
            | ReconnectEvent::Success { executor_name, .. }
            | ReconnectEvent::StreamReopened { executor_name, .. } => executor_name,
        }
    }
}
