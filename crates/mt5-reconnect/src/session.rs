//! The shared session handle and its reconnect primitive.
//!
//! A [`Session`] owns the current [`ConnectionContext`] of one logical account
//! session. Every call reads a snapshot of it; only [`Session::reconnect`]
//! replaces it.
//!
//! Reconnects are serialized. A caller passes the context it observed to be
//! broken; if another caller has already replaced that context by the time
//! the lock is acquired, the newer context is adopted without contacting the
//! server again. N calls failing together therefore cost one reconnect.

use crate::context::ConnectionContext;
use crate::state::{ConnectionState, ReconnectState};
use futures::future::BoxFuture;
use mt5_reconnect_core::ConnectError;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::Instant;

/// Re-establishes the authenticated channel to the terminal.
///
/// Implementations perform the vendor-specific work (credential exchange,
/// terminal readiness polling) and return the new terminal instance id.
/// `deadline`, when set, is the latest time the caller is willing to wait.
pub trait SessionManager: Send + Sync + 'static {
    fn connect(&self, deadline: Option<Instant>) -> BoxFuture<'_, Result<String, ConnectError>>;
}

impl<M: SessionManager> SessionManager for Arc<M> {
    fn connect(&self, deadline: Option<Instant>) -> BoxFuture<'_, Result<String, ConnectError>> {
        (**self).connect(deadline)
    }
}

/// Result of [`Session::reconnect`].
#[derive(Debug, Clone)]
pub enum ReconnectOutcome {
    /// This caller reconnected and installed a new context.
    Reconnected(Arc<ConnectionContext>),
    /// Another caller had already replaced the observed context.
    Coalesced(Arc<ConnectionContext>),
}

impl ReconnectOutcome {
    /// The context to retry with.
    pub fn context(&self) -> &Arc<ConnectionContext> {
        match self {
            ReconnectOutcome::Reconnected(ctx) | ReconnectOutcome::Coalesced(ctx) => ctx,
        }
    }

    pub fn into_context(self) -> Arc<ConnectionContext> {
        match self {
            ReconnectOutcome::Reconnected(ctx) | ReconnectOutcome::Coalesced(ctx) => ctx,
        }
    }

    pub fn is_coalesced(&self) -> bool {
        matches!(self, ReconnectOutcome::Coalesced(_))
    }
}

/// Cheap-to-clone handle over the current connection context.
pub struct Session<M> {
    inner: Arc<Inner<M>>,
}

struct Inner<M> {
    manager: M,
    current: RwLock<Arc<ConnectionContext>>,
    reconnect_lock: tokio::sync::Mutex<()>,
    state: ReconnectState,
}

impl<M: SessionManager> Session<M> {
    /// Performs the first connect and wraps the result.
    pub async fn connect(manager: M, deadline: Option<Instant>) -> Result<Self, ConnectError> {
        let instance_id = with_deadline(deadline, manager.connect(deadline)).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(instance_id = %instance_id, "session established");

        Ok(Self::with_instance(manager, instance_id))
    }

    /// Adopts an instance id obtained elsewhere.
    pub fn with_instance(manager: M, instance_id: impl Into<String>) -> Self {
        let state = ReconnectState::new();
        state.mark_connected();
        Self {
            inner: Arc::new(Inner {
                manager,
                current: RwLock::new(Arc::new(ConnectionContext::new(instance_id.into(), 0))),
                reconnect_lock: tokio::sync::Mutex::new(()),
                state,
            }),
        }
    }

    /// Re-establishes the session unless `observed` has already been replaced.
    ///
    /// Expiry of `deadline` yields [`ConnectError::Timeout`]; the time spent
    /// waiting for another caller's reconnect counts against it. On failure
    /// the previous context stays installed. Dropping the returned future
    /// mid-connect leaves the context and the connection state as they were.
    pub async fn reconnect(
        &self,
        observed: &ConnectionContext,
        deadline: Option<Instant>,
    ) -> Result<ReconnectOutcome, ConnectError> {
        let _guard = with_deadline(deadline, async {
            Ok(self.inner.reconnect_lock.lock().await)
        })
        .await?;

        let current = self.current();
        if current.generation() != observed.generation() {
            return Ok(ReconnectOutcome::Coalesced(current));
        }

        let reconnecting = self.inner.state.mark_reconnecting();
        match with_deadline(deadline, self.inner.manager.connect(deadline)).await {
            Ok(instance_id) => {
                let next = Arc::new(ConnectionContext::new(
                    instance_id,
                    current.generation() + 1,
                ));
                *self.inner.current.write() = Arc::clone(&next);
                reconnecting.reconnected();
                Ok(ReconnectOutcome::Reconnected(next))
            }
            Err(e) => {
                reconnecting.failed();
                Err(e)
            }
        }
    }
}

impl<M> Session<M> {
    /// Snapshot of the current context.
    pub fn current(&self) -> Arc<ConnectionContext> {
        Arc::clone(&self.inner.current.read())
    }

    /// Connection state and reconnect counters.
    pub fn state(&self) -> &ReconnectState {
        &self.inner.state
    }

    /// Shorthand for `state().state()`.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.state()
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }
}

impl<M> Clone for Session<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> std::fmt::Debug for Session<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("current", &self.current())
            .field("state", &self.inner.state.state())
            .finish()
    }
}

async fn with_deadline<F, T>(deadline: Option<Instant>, fut: F) -> Result<T, ConnectError>
where
    F: std::future::Future<Output = Result<T, ConnectError>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| ConnectError::Timeout)?,
        None => fut.await,
    }
}
