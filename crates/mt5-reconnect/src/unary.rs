//! Reconnect-aware executor for request/response calls.

use crate::config::ExecutorConfig;
use crate::context::{CallContext, CallOptions};
use crate::recovery::{self, judge, Recovery, Verdict};
use crate::session::{Session, SessionManager};
use mt5_reconnect_core::{ApiError, ExecutorError, TransportFailure};
use std::future::Future;
use std::sync::Arc;

/// Runs unary calls against a [`Session`], reconnecting when the transport
/// drops or the terminal no longer knows the session.
///
/// # Examples
///
/// ```
/// use futures::future::{BoxFuture, FutureExt};
/// use mt5_reconnect::{
///     ApiError, CallOptions, ConnectError, ExecutorConfig, Session, SessionManager,
///     UnaryExecutor,
/// };
///
/// struct Terminal;
///
/// impl SessionManager for Terminal {
///     fn connect(
///         &self,
///         _deadline: Option<tokio::time::Instant>,
///     ) -> BoxFuture<'_, Result<String, ConnectError>> {
///         async { Ok("instance-1".to_string()) }.boxed()
///     }
/// }
///
/// struct BalanceReply {
///     error: Option<ApiError>,
///     balance: f64,
/// }
///
/// # tokio_test::block_on(async {
/// let session = Session::with_instance(Terminal, "instance-0");
/// let executor = UnaryExecutor::new(session, ExecutorConfig::default());
///
/// let balance = executor
///     .execute(
///         |_ctx| async { Ok::<_, std::io::Error>(BalanceReply { error: None, balance: 1250.0 }) },
///         |reply: &BalanceReply| reply.error.clone(),
///         |reply| reply.balance,
///         &CallOptions::new(),
///     )
///     .await
///     .unwrap();
/// assert_eq!(balance, 1250.0);
/// # });
/// ```
pub struct UnaryExecutor<M> {
    session: Session<M>,
    config: Arc<ExecutorConfig>,
}

impl<M: SessionManager> UnaryExecutor<M> {
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

    /// Runs `operation` until it yields a reply without a business error, or
    /// the call fails.
    ///
    /// - `operation` performs one transport attempt with the given
    ///   [`CallContext`]; it is invoked again after each reconnect.
    /// - `error_selector` returns the business error embedded in a reply.
    /// - `payload_selector` extracts the result from the accepted reply.
    ///
    /// A transient transport failure, or a reply whose error code is the
    /// stale-session marker, triggers a reconnect followed by another
    /// attempt, up to [`ExecutorConfig::max_reconnects`]. When the budget is
    /// spent the triggering error is returned. Any other business error is
    /// returned immediately as [`ExecutorError::Api`].
    ///
    /// Cancellation is observed before every attempt and before every
    /// reconnect. An attempt still running when the signal is set completes,
    /// and its reply is returned if it is accepted.
    pub async fn execute<R, T, E, Op, Fut, Sel, Pay>(
        &self,
        mut operation: Op,
        error_selector: Sel,
        payload_selector: Pay,
        options: &CallOptions,
    ) -> Result<T, ExecutorError<E>>
    where
        Op: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: TransportFailure,
        Sel: Fn(&R) -> Option<ApiError>,
        Pay: FnOnce(R) -> T,
    {
        match self.run(&mut operation, &error_selector, options).await {
            Ok((reply, attempts)) => {
                recovery::report_success(&self.config, attempts);
                Ok(payload_selector(reply))
            }
            Err(e) => {
                recovery::report_failure(&self.config, &e);
                Err(e)
            }
        }
    }

    async fn run<R, E, Op, Fut, Sel>(
        &self,
        operation: &mut Op,
        error_selector: &Sel,
        options: &CallOptions,
    ) -> Result<(R, u32), ExecutorError<E>>
    where
        Op: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: TransportFailure,
        Sel: Fn(&R) -> Option<ApiError>,
    {
        let cancellation = options.cancellation();
        let mut recovery = Recovery::new(self.session.clone(), Arc::clone(&self.config));
        let mut context = self.session.current();
        let mut attempt = 0u32;

        loop {
            if recovery::is_set(cancellation) {
                return Err(ExecutorError::Cancelled);
            }

            attempt += 1;
            let deadline = self.config.attempt_deadline(options.deadline());

            #[cfg(feature = "tracing")]
            tracing::debug!(
                executor = %self.config.name,
                attempt,
                generation = context.generation(),
                "unary attempt"
            );

            let call = CallContext::new(Arc::clone(&context), deadline, attempt);
            let result = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, operation(call))
                    .await
                    .map_err(|_| ExecutorError::DeadlineExceeded)?,
                None => operation(call).await,
            };

            match judge(result, error_selector, &self.config.stale_session_code) {
                Verdict::Accept(reply) => return Ok((reply, attempt)),
                Verdict::Fail(e) => return Err(e),
                Verdict::Recover { trigger, cause } => {
                    context = recovery
                        .recover(&context, trigger, cause, options.deadline(), cancellation)
                        .await?;
                }
            }
        }
    }
}

impl<M> Clone for UnaryExecutor<M> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<M> std::fmt::Debug for UnaryExecutor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnaryExecutor")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish()
    }
}
