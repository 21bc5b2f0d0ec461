//! Streaming executor stress tests

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use mt5_reconnect::{
    ApiError, CallContext, CancellationSignal, ExecutorConfig, Session, StreamExecutor,
};

use super::{ConcurrencyTracker, SlowManager};

struct Tick {
    bid: Option<u64>,
}

/// Test: One long subscription with a drop every 10k envelopes
#[tokio::test]
#[ignore]
async fn stress_one_million_items_with_periodic_drops() {
    println!("\n=== Streaming: 1M items, drop every 10k ===");

    let manager = Arc::new(SlowManager::new(Duration::ZERO));
    let executor = StreamExecutor::new(
        Session::with_instance(Arc::clone(&manager), "instance-0"),
        ExecutorConfig::builder().name("ticks").build(),
    );
    let opens = Arc::new(AtomicUsize::new(0));
    let o = Arc::clone(&opens);

    let start = Instant::now();
    let count = executor
        .execute(
            (),
            move |_: &(), _ctx: CallContext| {
                let segment = o.fetch_add(1, Ordering::SeqCst) as u64;
                let first = segment * 10_000;
                let frames = (first..first + 10_000)
                    .map(|bid| Ok(Tick { bid: Some(bid) }))
                    .chain((segment < 99).then(|| {
                        Err(io::Error::new(io::ErrorKind::ConnectionReset, "dropped"))
                    }));
                async move { Ok::<_, io::Error>(stream::iter(frames)) }
            },
            |_: &Tick| None::<ApiError>,
            |tick: Tick| tick.bid,
            None,
        )
        .fold(0u64, |expected, item| async move {
            assert_eq!(item.unwrap(), expected);
            expected + 1
        })
        .await;
    let elapsed = start.elapsed();

    println!("Completed in {:?}", elapsed);
    println!("Throughput: {:.0} items/sec", count as f64 / elapsed.as_secs_f64());

    assert_eq!(count, 1_000_000);
    assert_eq!(opens.load(Ordering::SeqCst), 100);
    assert_eq!(manager.connects(), 99);
}

/// Test: Many subscriptions cancelled while waiting for envelopes
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_1k_subscriptions_cancelled() {
    println!("\n=== Streaming: 1k idle subscriptions, cancelled together ===");

    let manager = Arc::new(SlowManager::new(Duration::ZERO));
    let executor = StreamExecutor::new(
        Session::with_instance(Arc::clone(&manager), "instance-0"),
        ExecutorConfig::default(),
    );
    let signal = CancellationSignal::new();
    let tracker = ConcurrencyTracker::new();

    let mut handles = Vec::with_capacity(1_000);
    for _ in 0..1_000 {
        let ticks = executor.execute(
            (),
            |_: &(), _ctx: CallContext| async {
                let frames = stream::iter(vec![Ok(Tick { bid: Some(1) })]).chain(stream::pending());
                Ok::<_, io::Error>(frames.boxed())
            },
            |_: &Tick| None::<ApiError>,
            |tick: Tick| tick.bid,
            Some(signal.clone()),
        );
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            tracker.enter();
            let items: Vec<_> = ticks.collect().await;
            tracker.exit();
            items.len()
        }));
    }

    while tracker.peak() < 1_000 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    signal.cancel();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 1);
    }

    println!("Peak open subscriptions: {}", tracker.peak());
    assert_eq!(tracker.current(), 0);
    assert_eq!(manager.connects(), 0);
}
