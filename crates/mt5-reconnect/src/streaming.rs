//! Reconnect-aware executor for server-streaming calls.
//!
//! The executor turns an opener (a function that subscribes to a stream of
//! reply envelopes) into a stream of items. When the transport drops, or an
//! envelope reports that the terminal no longer knows the session, the
//! current subscription is dropped, the session is reconnected and the
//! subscription is opened again with the refreshed context. Envelopes that
//! were in flight on the old subscription are lost; nothing is replayed.
//!
//! Items are yielded in the order the transport delivers envelopes. No order
//! is promised across a re-open.

use crate::config::ExecutorConfig;
use crate::context::{CallContext, ConnectionContext};
use crate::events::{ReconnectEvent, ReconnectTrigger};
use crate::recovery::{self, judge, Recovery, Verdict};
use crate::session::{Session, SessionManager};
use futures::future::Either;
use futures::stream::{self, FusedStream, Stream, StreamExt};
use mt5_reconnect_core::{ApiError, CancellationSignal, ExecutorError, TransportFailure};
use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Runs server-streaming subscriptions against a [`Session`].
pub struct StreamExecutor<M> {
    session: Session<M>,
    config: Arc<ExecutorConfig>,
}

impl<M: SessionManager> StreamExecutor<M> {
    pub fn new(session: Session<M>, config: ExecutorConfig) -> Self {
        Self::with_shared_config(session, Arc::new(config))
    }

    /// Shares one configuration between several executors.
    pub fn with_shared_config(session: Session<M>, config: Arc<ExecutorConfig>) -> Self {
        Self { session, config }
    }

    pub fn session(&self) -> &Session<M> {
        &self.session
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Subscribes with `opener` and yields the items of the received
    /// envelopes.
    ///
    /// - `opener` opens one subscription for `request`. It is called again
    ///   after every reconnect. The [`CallContext`] it receives carries no
    ///   deadline; opening is bounded by [`ExecutorConfig::attempt_timeout`]
    ///   instead, so a long-lived subscription is never cut off by it.
    /// - `error_selector` returns the business error embedded in an envelope.
    /// - `item_selector` extracts the item of an envelope. Envelopes without
    ///   an item (heartbeats) are skipped.
    ///
    /// The stream ends without an error when the server closes it or when
    /// `cancellation` is set. Cancellation is observed before each open, on
    /// every envelope, and while waiting for the next one. A business error
    /// other than the stale-session marker, a non-transient transport
    /// failure, or a failed reconnect is yielded as the last item.
    ///
    /// The reconnect budget counts consecutive reconnects: it is restored
    /// whenever an envelope without a business error arrives.
    ///
    /// The returned stream is not `Unpin`; pin it with `Box::pin` or
    /// `futures::pin_mut!` before polling.
    pub fn execute<Req, R, T, E, S, Open, Fut, Sel, Pick>(
        &self,
        request: Req,
        opener: Open,
        error_selector: Sel,
        item_selector: Pick,
        cancellation: Option<CancellationSignal>,
    ) -> impl FusedStream<Item = Result<T, ExecutorError<E>>>
    where
        Open: FnMut(&Req, CallContext) -> Fut,
        Fut: Future<Output = Result<S, E>>,
        S: Stream<Item = Result<R, E>> + Unpin,
        E: TransportFailure,
        Sel: Fn(&R) -> Option<ApiError>,
        Pick: FnMut(R) -> Option<T>,
    {
        let subscription = Subscription {
            request,
            opener,
            error_selector,
            item_selector,
            cancellation,
            recovery: Recovery::new(self.session.clone(), Arc::clone(&self.config)),
            config: Arc::clone(&self.config),
            context: self.session.current(),
            stream: None,
            opens: 0,
            reopening: false,
            done: false,
        };

        stream::unfold(subscription, Subscription::step).fuse()
    }
}

impl<M> Clone for StreamExecutor<M> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<M> std::fmt::Debug for StreamExecutor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamExecutor")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish()
    }
}

struct Subscription<M, Req, S, Open, Sel, Pick> {
    request: Req,
    opener: Open,
    error_selector: Sel,
    item_selector: Pick,
    cancellation: Option<CancellationSignal>,
    recovery: Recovery<M>,
    config: Arc<ExecutorConfig>,
    context: Arc<ConnectionContext>,
    stream: Option<S>,
    opens: u32,
    reopening: bool,
    done: bool,
}

enum Received<R> {
    Envelope(R),
    Ended,
    Cancelled,
}

impl<M, Req, R, T, E, S, Open, Fut, Sel, Pick> Subscription<M, Req, S, Open, Sel, Pick>
where
    M: SessionManager,
    Open: FnMut(&Req, CallContext) -> Fut,
    Fut: Future<Output = Result<S, E>>,
    S: Stream<Item = Result<R, E>> + Unpin,
    E: TransportFailure,
    Sel: Fn(&R) -> Option<ApiError>,
    Pick: FnMut(R) -> Option<T>,
{
    async fn step(mut self) -> Option<(Result<T, ExecutorError<E>>, Self)> {
        loop {
            if self.done {
                return None;
            }
            if recovery::is_set(self.cancellation.as_ref()) {
                return self.cancel();
            }

            if self.stream.is_none() {
                match self.open().await {
                    Ok(Ok(stream)) => self.opened(stream),
                    Ok(Err(e)) if e.is_transient() => {
                        if let Err(e) = self
                            .reconnect(ReconnectTrigger::Transport, ExecutorError::Transport(e))
                            .await
                        {
                            return self.fail(e);
                        }
                        continue;
                    }
                    Ok(Err(e)) => return self.fail(ExecutorError::Transport(e)),
                    Err(e) => return self.fail(e),
                }
            }

            let envelope = match self.receive().await {
                Received::Envelope(envelope) => envelope,
                Received::Ended => return self.end(),
                Received::Cancelled => return self.cancel(),
            };

            if recovery::is_set(self.cancellation.as_ref()) {
                return self.cancel();
            }

            match judge(envelope, &self.error_selector, &self.config.stale_session_code) {
                Verdict::Accept(reply) => {
                    self.recovery.reset();
                    if let Some(item) = (self.item_selector)(reply) {
                        #[cfg(feature = "metrics")]
                        counter!("mt5_stream_items_total", "executor" => self.config.name.clone())
                            .increment(1);

                        return Some((Ok(item), self));
                    }
                }
                Verdict::Fail(e) => return self.fail(e),
                Verdict::Recover { trigger, cause } => {
                    self.stream = None;
                    if let Err(e) = self.reconnect(trigger, cause).await {
                        return self.fail(e);
                    }
                }
            }
        }
    }

    /// `Err` when opening ran out of time; `Ok(Err)` when the opener failed.
    async fn open(&mut self) -> Result<Result<S, E>, ExecutorError<E>> {
        self.opens += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            executor = %self.config.name,
            open = self.opens,
            generation = self.context.generation(),
            "opening stream"
        );

        let call = CallContext::new(Arc::clone(&self.context), None, self.opens);
        let opening = (self.opener)(&self.request, call);
        match self.config.attempt_deadline(None) {
            Some(deadline) => tokio::time::timeout_at(deadline, opening)
                .await
                .map_err(|_| ExecutorError::DeadlineExceeded),
            None => Ok(opening.await),
        }
    }

    fn opened(&mut self, stream: S) {
        self.stream = Some(stream);
        if !std::mem::take(&mut self.reopening) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            executor = %self.config.name,
            generation = self.context.generation(),
            "stream reopened"
        );

        self.config.emit(&ReconnectEvent::StreamReopened {
            executor_name: self.config.name.clone(),
            timestamp: std::time::Instant::now(),
            generation: self.context.generation(),
        });
    }

    async fn receive(&mut self) -> Received<Result<R, E>> {
        let Some(stream) = self.stream.as_mut() else {
            return Received::Ended;
        };

        let next = match self.cancellation.clone() {
            Some(signal) => {
                let cancelled = signal.cancelled();
                futures::pin_mut!(cancelled);
                match futures::future::select(cancelled, stream.next()).await {
                    Either::Left(((), _)) => return Received::Cancelled,
                    Either::Right((next, _)) => next,
                }
            }
            None => stream.next().await,
        };

        match next {
            Some(envelope) => Received::Envelope(envelope),
            None => Received::Ended,
        }
    }

    async fn reconnect(
        &mut self,
        trigger: ReconnectTrigger,
        cause: ExecutorError<E>,
    ) -> Result<(), ExecutorError<E>> {
        self.stream = None;
        let deadline = self.config.attempt_deadline(None);
        self.context = self
            .recovery
            .recover(&self.context, trigger, cause, deadline, self.cancellation.as_ref())
            .await?;
        self.reopening = true;
        Ok(())
    }

    fn end(mut self) -> Option<(Result<T, ExecutorError<E>>, Self)> {
        self.stream = None;
        recovery::report_stream_end(&self.config);
        None
    }

    fn cancel(mut self) -> Option<(Result<T, ExecutorError<E>>, Self)> {
        self.stream = None;
        recovery::report_cancelled(&self.config);
        None
    }

    fn fail(mut self, error: ExecutorError<E>) -> Option<(Result<T, ExecutorError<E>>, Self)> {
        if error.is_cancelled() {
            return self.cancel();
        }
        self.stream = None;
        self.done = true;
        recovery::report_failure(&self.config, &error);
        Some((Err(error), self))
    }
}
