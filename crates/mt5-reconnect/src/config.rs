use crate::events::{ReconnectEvent, ReconnectTrigger};
use crate::policy::ReconnectPolicy;
use mt5_reconnect_core::events::{EventListeners, FnListener};
use mt5_reconnect_core::TERMINAL_INSTANCE_NOT_FOUND;
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Configuration shared by the unary and streaming executors.
#[derive(Clone)]
pub struct ExecutorConfig {
    pub(crate) name: String,
    pub(crate) max_reconnects: u32,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) attempt_timeout: Option<Duration>,
    pub(crate) stale_session_code: String,
    pub(crate) event_listeners: EventListeners<ReconnectEvent>,
}

impl ExecutorConfig {
    /// Creates a new builder with default settings.
    pub fn builder() -> ExecutorConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "mt5_calls_total",
                    "Total number of executor calls and streams by outcome"
                );
                describe_counter!(
                    "mt5_reconnects_total",
                    "Total number of reconnects triggered by executors"
                );
                describe_counter!(
                    "mt5_stream_items_total",
                    "Total number of items yielded by streaming executors"
                );
            });
        }
        ExecutorConfigBuilder::new()
    }

    /// Name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum reconnects one call may trigger.
    pub fn max_reconnects(&self) -> u32 {
        self.max_reconnects
    }

    /// Delay policy applied before each reconnect.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Relative bound on a single transport attempt.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Business error code that marks the session as stale.
    pub fn stale_session_code(&self) -> &str {
        &self.stale_session_code
    }

    pub(crate) fn emit(&self, event: &ReconnectEvent) {
        self.event_listeners.emit(event);
    }

    /// Combines a call deadline with the per-attempt timeout; the earlier wins.
    pub(crate) fn attempt_deadline(&self, call_deadline: Option<Instant>) -> Option<Instant> {
        let relative = self.attempt_timeout.map(|timeout| Instant::now() + timeout);
        match (call_deadline, relative) {
            (Some(call), Some(attempt)) => Some(call.min(attempt)),
            (call, attempt) => call.or(attempt),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("name", &self.name)
            .field("max_reconnects", &self.max_reconnects)
            .field("policy", &self.policy)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("stale_session_code", &self.stale_session_code)
            .field("listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for [`ExecutorConfig`].
pub struct ExecutorConfigBuilder {
    name: String,
    max_reconnects: u32,
    policy: ReconnectPolicy,
    attempt_timeout: Option<Duration>,
    stale_session_code: String,
    event_listeners: EventListeners<ReconnectEvent>,
}

impl ExecutorConfigBuilder {
    /// Creates a new builder.
    ///
    /// Defaults:
    /// - name: `"<unnamed>"`
    /// - max_reconnects: 1
    /// - policy: [`ReconnectPolicy::Immediate`]
    /// - attempt_timeout: none
    /// - stale_session_code: `TERMINAL_INSTANCE_NOT_FOUND`
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            max_reconnects: 1,
            policy: ReconnectPolicy::default(),
            attempt_timeout: None,
            stale_session_code: TERMINAL_INSTANCE_NOT_FOUND.to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name of this executor.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets how many reconnects a single call may trigger.
    ///
    /// `0` turns recovery off: transient and stale-session failures are
    /// returned to the caller directly.
    ///
    /// # Examples
    ///
    /// ```
    /// use mt5_reconnect::ExecutorConfig;
    ///
    /// let config = ExecutorConfig::builder().max_reconnects(2).build();
    /// assert_eq!(config.max_reconnects(), 2);
    /// ```
    pub fn max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.max_reconnects = max_reconnects;
        self
    }

    /// Sets the delay policy applied before each reconnect.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use mt5_reconnect::{ExecutorConfig, ReconnectPolicy};
    ///
    /// let config = ExecutorConfig::builder()
    ///     .policy(ReconnectPolicy::exponential(
    ///         Duration::from_millis(50),
    ///         Duration::from_secs(2),
    ///     ))
    ///     .build();
    /// ```
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bounds every transport attempt. Combined with the call deadline, the
    /// earlier of the two applies.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Overrides the business error code that marks a stale session.
    pub fn stale_session_code<S: Into<String>>(mut self, code: S) -> Self {
        self.stale_session_code = code.into();
        self
    }

    /// Registers a callback invoked after every successful reconnect.
    ///
    /// The callback receives the trigger and the new context generation.
    pub fn on_reconnect<F>(mut self, f: F) -> Self
    where
        F: Fn(ReconnectTrigger, u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Reconnected {
                trigger,
                generation,
                ..
            } = event
            {
                f(*trigger, *generation);
            }
        }));
        self
    }

    /// Registers a callback invoked when the reconnect primitive fails.
    pub fn on_reconnect_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(ReconnectTrigger) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::ReconnectFailed { trigger, .. } = event {
                f(*trigger);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call ends with a business error.
    pub fn on_api_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::ApiError { code, .. } = event {
                f(code);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call stops on cancellation.
    pub fn on_cancelled<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Cancelled { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked when a unary call succeeds, with the
    /// number of transport attempts it took.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when a stream is re-opened after a
    /// reconnect.
    pub fn on_stream_reopened<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::StreamReopened { generation, .. } = event {
                f(*generation);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ExecutorConfig {
        ExecutorConfig {
            name: self.name,
            max_reconnects: self.max_reconnects,
            policy: self.policy,
            attempt_timeout: self.attempt_timeout,
            stale_session_code: self.stale_session_code,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for ExecutorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
