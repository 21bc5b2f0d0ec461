//! Shared fixtures: a scripted session manager, reply types and scripted
//! subscriptions.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use mt5_reconnect::{
    ApiError, ConnectError, ExecutorConfig, Session, SessionManager, StreamExecutor, UnaryExecutor,
};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Session manager that hands out `instance-1`, `instance-2`, ...
#[derive(Default)]
pub struct ScriptedManager {
    connects: AtomicUsize,
    rejecting: AtomicBool,
    latency: Duration,
}

impl ScriptedManager {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Makes every following connect fail.
    pub fn reject(&self) {
        self.rejecting.store(true, Ordering::SeqCst);
    }
}

impl SessionManager for ScriptedManager {
    fn connect(
        &self,
        _deadline: Option<tokio::time::Instant>,
    ) -> BoxFuture<'_, Result<String, ConnectError>> {
        async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.rejecting.load(Ordering::SeqCst) {
                return Err(ConnectError::Rejected(ApiError::new(
                    "INVALID_ACCOUNT",
                    "login rejected",
                )));
            }
            let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("instance-{}", n))
        }
        .boxed()
    }
}

pub type Manager = Arc<ScriptedManager>;

pub fn session(manager: &Manager) -> Session<Manager> {
    Session::with_instance(Arc::clone(manager), "instance-0")
}

pub fn unary(manager: &Manager, config: ExecutorConfig) -> UnaryExecutor<Manager> {
    UnaryExecutor::new(session(manager), config)
}

pub fn streaming(manager: &Manager, config: ExecutorConfig) -> StreamExecutor<Manager> {
    StreamExecutor::new(session(manager), config)
}

/// Unary reply envelope.
#[derive(Debug, Clone)]
pub struct Reply {
    pub error: Option<ApiError>,
    pub value: u64,
}

impl Reply {
    pub fn ok(value: u64) -> Result<Self, io::Error> {
        Ok(Self { error: None, value })
    }

    pub fn api(code: &str) -> Result<Self, io::Error> {
        Ok(Self {
            error: Some(ApiError::new(code, "reported by terminal")),
            value: 0,
        })
    }

    pub fn error(&self) -> Option<ApiError> {
        self.error.clone()
    }
}

pub fn unavailable() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, "channel closed")
}

/// One frame of a scripted subscription.
#[derive(Debug, Clone)]
pub enum Frame {
    Item(u64),
    Heartbeat,
    Api(&'static str),
    Drop,
    Fatal,
}

#[derive(Debug)]
pub struct Envelope {
    pub error: Option<ApiError>,
    pub item: Option<u64>,
}

impl Envelope {
    pub fn error(&self) -> Option<ApiError> {
        self.error.clone()
    }
}

pub type Subscription = BoxStream<'static, Result<Envelope, io::Error>>;

pub fn subscription(frames: Vec<Frame>) -> Subscription {
    stream::iter(frames.into_iter().map(|frame| match frame {
        Frame::Item(item) => Ok(Envelope {
            error: None,
            item: Some(item),
        }),
        Frame::Heartbeat => Ok(Envelope {
            error: None,
            item: None,
        }),
        Frame::Api(code) => Ok(Envelope {
            error: Some(ApiError::new(code, "reported by terminal")),
            item: None,
        }),
        Frame::Drop => Err(unavailable()),
        Frame::Fatal => Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt frame")),
    }))
    .boxed()
}

/// Hands out one scripted subscription per open; later opens get an empty
/// one.
#[derive(Clone, Default)]
pub struct Scripts {
    remaining: Arc<parking_lot::Mutex<VecDeque<Vec<Frame>>>>,
    opens: Arc<AtomicUsize>,
    instances: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl Scripts {
    pub fn new(scripts: Vec<Vec<Frame>>) -> Self {
        Self {
            remaining: Arc::new(parking_lot::Mutex::new(scripts.into())),
            ..Self::default()
        }
    }

    pub fn open(&self, instance_id: &str) -> Subscription {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.instances.lock().push(instance_id.to_string());
        let frames = self.remaining.lock().pop_front().unwrap_or_default();
        subscription(frames)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn instances(&self) -> Vec<String> {
        self.instances.lock().clone()
    }
}
