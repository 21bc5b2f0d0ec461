use crate::config::ExecutorConfig;
use crate::service::{ErrorSelector, ReconnectService};
use crate::session::{Session, SessionManager};
use crate::unary::UnaryExecutor;
use mt5_reconnect_core::ApiError;
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] that routes a service's calls through a session and
/// reconnects it when needed.
///
/// `R` is the reply type of the wrapped service; the error selector finds
/// the business error embedded in it.
///
/// # Examples
///
/// ```
/// use futures::future::{BoxFuture, FutureExt};
/// use mt5_reconnect::{
///     ApiError, ConnectError, ExecutorConfig, ReconnectLayer, Session, SessionManager,
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
/// struct Reply {
///     error: Option<ApiError>,
/// }
///
/// let session = Session::with_instance(Terminal, "instance-0");
/// let layer = ReconnectLayer::new(session, ExecutorConfig::default(), |reply: &Reply| {
///     reply.error.clone()
/// });
/// ```
pub struct ReconnectLayer<M, R> {
    executor: UnaryExecutor<M>,
    error_selector: ErrorSelector<R>,
}

impl<M: SessionManager, R> ReconnectLayer<M, R> {
    pub fn new<F>(session: Session<M>, config: ExecutorConfig, error_selector: F) -> Self
    where
        F: Fn(&R) -> Option<ApiError> + Send + Sync + 'static,
    {
        Self::from_executor(UnaryExecutor::new(session, config), error_selector)
    }

    /// Builds the layer around an existing executor, sharing its session and
    /// configuration.
    pub fn from_executor<F>(executor: UnaryExecutor<M>, error_selector: F) -> Self
    where
        F: Fn(&R) -> Option<ApiError> + Send + Sync + 'static,
    {
        Self {
            executor,
            error_selector: Arc::new(error_selector),
        }
    }

    pub fn executor(&self) -> &UnaryExecutor<M> {
        &self.executor
    }
}

impl<M, R> Clone for ReconnectLayer<M, R> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            error_selector: Arc::clone(&self.error_selector),
        }
    }
}

impl<S, M, R> Layer<S> for ReconnectLayer<M, R> {
    type Service = ReconnectService<S, M, R>;

    fn layer(&self, inner: S) -> Self::Service {
        ReconnectService::new(inner, self.executor.clone(), Arc::clone(&self.error_selector))
    }
}
