//! Outcome classification and the reconnect step shared by both executors.

use crate::config::ExecutorConfig;
use crate::context::ConnectionContext;
use crate::events::{ReconnectEvent, ReconnectTrigger};
use crate::session::{Session, SessionManager};
use mt5_reconnect_core::{ApiError, CancellationSignal, ExecutorError, TransportFailure};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// How an executor should proceed with one transport result.
pub(crate) enum Verdict<R, E> {
    /// Reply carried no business error.
    Accept(R),
    /// Reconnect and try again; `cause` is returned if recovery is not allowed.
    Recover {
        trigger: ReconnectTrigger,
        cause: ExecutorError<E>,
    },
    Fail(ExecutorError<E>),
}

pub(crate) fn judge<R, E, Sel>(
    result: Result<R, E>,
    error_selector: &Sel,
    stale_code: &str,
) -> Verdict<R, E>
where
    E: TransportFailure,
    Sel: Fn(&R) -> Option<ApiError>,
{
    match result {
        Ok(reply) => match error_selector(&reply) {
            None => Verdict::Accept(reply),
            Some(api) if api.is_stale_session(stale_code) => Verdict::Recover {
                trigger: ReconnectTrigger::StaleSession,
                cause: ExecutorError::Api(api),
            },
            Some(api) => Verdict::Fail(ExecutorError::Api(api)),
        },
        Err(e) if e.is_transient() => Verdict::Recover {
            trigger: ReconnectTrigger::Transport,
            cause: ExecutorError::Transport(e),
        },
        Err(e) => Verdict::Fail(ExecutorError::Transport(e)),
    }
}

pub(crate) fn is_set(cancellation: Option<&CancellationSignal>) -> bool {
    cancellation.is_some_and(CancellationSignal::is_cancelled)
}

/// Reconnect budget of one call or stream.
pub(crate) struct Recovery<M> {
    session: Session<M>,
    config: Arc<ExecutorConfig>,
    used: u32,
}

impl<M: SessionManager> Recovery<M> {
    pub(crate) fn new(session: Session<M>, config: Arc<ExecutorConfig>) -> Self {
        Self {
            session,
            config,
            used: 0,
        }
    }

    /// Restores the full budget.
    pub(crate) fn reset(&mut self) {
        self.used = 0;
    }

    /// Reconnects after `observed` failed, or explains why not.
    ///
    /// Cancellation is checked before the delay and again after it. Once the
    /// budget is spent, `cause` is returned unchanged.
    pub(crate) async fn recover<E>(
        &mut self,
        observed: &ConnectionContext,
        trigger: ReconnectTrigger,
        cause: ExecutorError<E>,
        deadline: Option<tokio::time::Instant>,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Arc<ConnectionContext>, ExecutorError<E>> {
        if is_set(cancellation) {
            return Err(ExecutorError::Cancelled);
        }

        if self.used >= self.config.max_reconnects {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                executor = %self.config.name,
                trigger = %trigger,
                reconnects = self.used,
                "reconnect budget exhausted"
            );
            return Err(cause);
        }

        let delay = self.config.policy.delay_for_attempt(self.used as usize);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            if is_set(cancellation) {
                return Err(ExecutorError::Cancelled);
            }
        }

        self.used += 1;

        match self.session.reconnect(observed, deadline).await {
            Ok(outcome) => {
                let coalesced = outcome.is_coalesced();
                let context = outcome.into_context();

                #[cfg(feature = "tracing")]
                tracing::info!(
                    executor = %self.config.name,
                    trigger = %trigger,
                    generation = context.generation(),
                    coalesced,
                    "session reconnected"
                );

                #[cfg(feature = "metrics")]
                counter!(
                    "mt5_reconnects_total",
                    "executor" => self.config.name.clone(),
                    "outcome" => if coalesced { "coalesced" } else { "reconnected" }
                )
                .increment(1);

                self.config.emit(&ReconnectEvent::Reconnected {
                    executor_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    trigger,
                    generation: context.generation(),
                    coalesced,
                });

                Ok(context)
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    executor = %self.config.name,
                    trigger = %trigger,
                    error = %e,
                    "reconnect failed"
                );

                #[cfg(feature = "metrics")]
                counter!(
                    "mt5_reconnects_total",
                    "executor" => self.config.name.clone(),
                    "outcome" => "failed"
                )
                .increment(1);

                self.config.emit(&ReconnectEvent::ReconnectFailed {
                    executor_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    trigger,
                });

                Err(ExecutorError::Connect(e))
            }
        }
    }
}

pub(crate) fn report_success(config: &ExecutorConfig, attempts: u32) {
    #[cfg(feature = "tracing")]
    tracing::debug!(executor = %config.name, attempts, "call succeeded");

    #[cfg(feature = "metrics")]
    counter!("mt5_calls_total", "executor" => config.name.clone(), "outcome" => "success")
        .increment(1);

    config.emit(&ReconnectEvent::Success {
        executor_name: config.name.clone(),
        timestamp: Instant::now(),
        attempts,
    });
}

pub(crate) fn report_stream_end(config: &ExecutorConfig) {
    #[cfg(feature = "tracing")]
    tracing::debug!(executor = %config.name, "stream ended");

    #[cfg(feature = "metrics")]
    counter!("mt5_calls_total", "executor" => config.name.clone(), "outcome" => "completed")
        .increment(1);

    #[cfg(not(any(feature = "tracing", feature = "metrics")))]
    let _ = config;
}

pub(crate) fn report_cancelled(config: &ExecutorConfig) {
    #[cfg(feature = "tracing")]
    tracing::debug!(executor = %config.name, "call cancelled");

    #[cfg(feature = "metrics")]
    counter!("mt5_calls_total", "executor" => config.name.clone(), "outcome" => "cancelled")
        .increment(1);

    config.emit(&ReconnectEvent::Cancelled {
        executor_name: config.name.clone(),
        timestamp: Instant::now(),
    });
}

pub(crate) fn report_failure<E>(config: &ExecutorConfig, error: &ExecutorError<E>)
where
    E: std::fmt::Display,
{
    if error.is_cancelled() {
        report_cancelled(config);
        return;
    }

    #[cfg(feature = "tracing")]
    tracing::warn!(executor = %config.name, error = %error, "call failed");

    #[cfg(feature = "metrics")]
    counter!(
        "mt5_calls_total",
        "executor" => config.name.clone(),
        "outcome" => outcome_label(error)
    )
    .increment(1);

    if let ExecutorError::Api(api) = error {
        config.emit(&ReconnectEvent::ApiError {
            executor_name: config.name.clone(),
            timestamp: Instant::now(),
            code: api.code().to_string(),
        });
    }
}

#[cfg(feature = "metrics")]
fn outcome_label<E>(error: &ExecutorError<E>) -> &'static str {
    match error {
        ExecutorError::Api(_) => "api_error",
        ExecutorError::Connect(_) => "connect_error",
        ExecutorError::Transport(_) => "transport_error",
        ExecutorError::Cancelled => "cancelled",
        ExecutorError::DeadlineExceeded => "deadline_exceeded",
    }
}
