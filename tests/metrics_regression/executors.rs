//! Executor metrics regression tests

use super::helpers::*;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use mt5_reconnect::{
    ApiError, CallContext, CallOptions, CancellationSignal, ConnectError, ExecutorConfig,
    Session, SessionManager, StreamExecutor, UnaryExecutor,
};
use serial_test::serial;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Terminal {
    rejecting: AtomicBool,
}

impl SessionManager for Terminal {
    fn connect(
        &self,
        _deadline: Option<tokio::time::Instant>,
    ) -> BoxFuture<'_, Result<String, ConnectError>> {
        async move {
            if self.rejecting.load(Ordering::SeqCst) {
                Err(ConnectError::Rejected(ApiError::new("INVALID_ACCOUNT", "rejected")))
            } else {
                Ok("instance-1".to_string())
            }
        }
        .boxed()
    }
}

struct Reply {
    error: Option<ApiError>,
}

fn unary(name: &str, terminal: Terminal) -> UnaryExecutor<Terminal> {
    UnaryExecutor::new(
        Session::with_instance(terminal, "instance-0"),
        ExecutorConfig::builder().name(name).build(),
    )
}

fn stale() -> Result<Reply, io::Error> {
    Ok(Reply {
        error: Some(ApiError::instance_not_found("gone")),
    })
}

#[tokio::test]
#[serial]
async fn unary_success_and_reconnect_metrics() {
    init_recorder();

    let executor = unary("metrics_unary", Terminal::default());

    let _ = executor
        .execute(
            |ctx: CallContext| async move {
                if ctx.instance_id() == "instance-0" {
                    stale()
                } else {
                    Ok(Reply { error: None })
                }
            },
            |reply: &Reply| reply.error.clone(),
            |_| (),
            &CallOptions::new(),
        )
        .await;

    assert_counter_exists("mt5_calls_total");
    assert_metric_has_label("mt5_calls_total", "executor", "metrics_unary");
    assert_metric_has_label("mt5_calls_total", "outcome", "success");

    assert_counter_exists("mt5_reconnects_total");
    assert_metric_has_label("mt5_reconnects_total", "executor", "metrics_unary");
    assert_metric_has_label("mt5_reconnects_total", "outcome", "reconnected");
}

#[tokio::test]
#[serial]
async fn unary_failure_outcome_labels() {
    init_recorder();

    let executor = unary("metrics_failures", Terminal::default());
    let _ = executor
        .execute(
            |_| async {
                Ok::<_, io::Error>(Reply {
                    error: Some(ApiError::new("MARKET_CLOSED", "closed")),
                })
            },
            |reply: &Reply| reply.error.clone(),
            |_| (),
            &CallOptions::new(),
        )
        .await;
    assert_metric_has_label("mt5_calls_total", "outcome", "api_error");

    let terminal = Terminal::default();
    terminal.rejecting.store(true, Ordering::SeqCst);
    let executor = unary("metrics_failures", terminal);
    let _ = executor
        .execute(
            |_| async { stale() },
            |reply: &Reply| reply.error.clone(),
            |_| (),
            &CallOptions::new(),
        )
        .await;
    assert_metric_has_label("mt5_calls_total", "outcome", "connect_error");
    assert_metric_has_label("mt5_reconnects_total", "outcome", "failed");

    let executor = unary("metrics_failures", Terminal::default());
    let _ = executor
        .execute(
            |_| async { Err::<Reply, _>(io::Error::new(io::ErrorKind::InvalidData, "corrupt")) },
            |reply: &Reply| reply.error.clone(),
            |_| (),
            &CallOptions::new(),
        )
        .await;
    assert_metric_has_label("mt5_calls_total", "outcome", "transport_error");

    let signal = CancellationSignal::new();
    signal.cancel();
    let _ = executor
        .execute(
            |_| async { Ok::<_, io::Error>(Reply { error: None }) },
            |reply: &Reply| reply.error.clone(),
            |_| (),
            &CallOptions::new().with_cancellation(signal),
        )
        .await;
    assert_metric_has_label("mt5_calls_total", "outcome", "cancelled");
}

#[tokio::test]
#[serial]
async fn stream_item_metrics() {
    init_recorder();

    let executor = StreamExecutor::new(
        Session::with_instance(Terminal::default(), "instance-0"),
        ExecutorConfig::builder().name("metrics_stream").build(),
    );

    let items: Vec<_> = executor
        .execute(
            (),
            |_: &(), _ctx: CallContext| async {
                let frames = vec![
                    Ok::<_, io::Error>(Some(1u32)),
                    Ok(None),
                    Ok(Some(2)),
                ];
                Ok::<_, io::Error>(stream::iter(frames))
            },
            |_: &Option<u32>| None,
            |item: Option<u32>| item,
            None,
        )
        .collect()
        .await;
    assert_eq!(items.len(), 2);

    assert_counter_exists("mt5_stream_items_total");
    assert_metric_has_label("mt5_stream_items_total", "executor", "metrics_stream");
    assert_metric_has_label("mt5_calls_total", "executor", "metrics_stream");
    assert_metric_has_label("mt5_calls_total", "outcome", "completed");
}
