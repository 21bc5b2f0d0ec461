use crate::context::{CallContext, CallOptions};
use crate::session::SessionManager;
use crate::unary::UnaryExecutor;
use futures::future::BoxFuture;
use mt5_reconnect_core::{ApiError, ExecutorError, TransportFailure};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};

pub(crate) type ErrorSelector<R> = Arc<dyn Fn(&R) -> Option<ApiError> + Send + Sync>;

/// A request paired with the context of the attempt that carries it.
#[derive(Debug, Clone)]
pub struct SessionRequest<Req> {
    context: CallContext,
    request: Req,
}

impl<Req> SessionRequest<Req> {
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    pub fn request(&self) -> &Req {
        &self.request
    }

    pub fn into_parts(self) -> (CallContext, Req) {
        (self.context, self.request)
    }
}

/// A Tower [`Service`] that runs every request through a [`UnaryExecutor`].
///
/// The inner service receives a [`SessionRequest`]. The first attempt goes to
/// the instance made ready by `poll_ready`; retries use fresh clones, so a
/// retried request is sent with the refreshed context.
pub struct ReconnectService<S, M, R> {
    inner: S,
    executor: UnaryExecutor<M>,
    error_selector: ErrorSelector<R>,
}

impl<S, M, R> ReconnectService<S, M, R> {
    pub(crate) fn new(
        inner: S,
        executor: UnaryExecutor<M>,
        error_selector: ErrorSelector<R>,
    ) -> Self {
        Self {
            inner,
            executor,
            error_selector,
        }
    }

    pub fn executor(&self) -> &UnaryExecutor<M> {
        &self.executor
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: Clone, M, R> Clone for ReconnectService<S, M, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            executor: self.executor.clone(),
            error_selector: Arc::clone(&self.error_selector),
        }
    }
}

impl<S, M, Req, R> Service<Req> for ReconnectService<S, M, R>
where
    S: Service<SessionRequest<Req>, Response = R> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: TransportFailure,
    M: SessionManager,
    Req: Clone + Send + 'static,
    R: Send + 'static,
{
    type Response = R;
    type Error = ExecutorError<S::Error>;
    type Future = BoxFuture<'static, Result<R, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ExecutorError::Transport)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        // The instance driven by `poll_ready` holds any reserved capacity.
        let clone = self.inner.clone();
        let ready = std::mem::replace(&mut self.inner, clone);
        let inner = self.inner.clone();
        let executor = self.executor.clone();
        let error_selector = Arc::clone(&self.error_selector);

        Box::pin(async move {
            let options = CallOptions::new();
            let mut ready = Some(ready);
            executor
                .execute(
                    move |context| {
                        let first = ready.take();
                        let retry = inner.clone();
                        let request = SessionRequest {
                            context,
                            request: request.clone(),
                        };
                        async move {
                            match first {
                                Some(mut service) => service.call(request).await,
                                None => retry.oneshot(request).await,
                            }
                        }
                    },
                    move |reply: &R| error_selector(reply),
                    |reply| reply,
                    &options,
                )
                .await
        })
    }
}
