//! Property tests for the streaming executor.
//!
//! Invariants tested:
//! - Items are yielded in delivery order and heartbeats never surface
//! - A subscription that delivers between drops survives any number of them

use super::CountingManager;
use futures::stream::{self, StreamExt};
use mt5_reconnect::{ApiError, CallContext, ExecutorConfig, Session, StreamExecutor};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// `None` is a heartbeat.
type Envelopes = Vec<Option<u64>>;

struct Envelope {
    item: Option<u64>,
}

fn executor() -> (StreamExecutor<Arc<CountingManager>>, Arc<CountingManager>) {
    let manager = Arc::new(CountingManager::default());
    let session = Session::with_instance(Arc::clone(&manager), "instance-0");
    (StreamExecutor::new(session, ExecutorConfig::default()), manager)
}

/// Opens one segment per subscription; every segment but the last ends
/// with a dropped connection.
async fn collect(segments: Vec<Envelopes>) -> (Vec<u64>, usize) {
    let (executor, manager) = executor();
    let last = segments.len().saturating_sub(1);
    let mut queue: VecDeque<_> = segments.into_iter().enumerate().collect();

    let items = executor
        .execute(
            (),
            move |_: &(), _ctx: CallContext| {
                let (index, envelopes) = queue.pop_front().unwrap_or((last, Vec::new()));
                let mut frames: Vec<Result<Envelope, io::Error>> = envelopes
                    .into_iter()
                    .map(|item| Ok(Envelope { item }))
                    .collect();
                if index < last {
                    frames.push(Err(io::Error::new(io::ErrorKind::BrokenPipe, "dropped")));
                }
                async move { Ok::<_, io::Error>(stream::iter(frames)) }
            },
            |_: &Envelope| None::<ApiError>,
            |envelope: Envelope| envelope.item,
            None,
        )
        .map(Result::unwrap)
        .collect()
        .await;

    (items, manager.connects())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the yielded items are exactly the delivered items, in order
    #[test]
    fn order_is_preserved_and_heartbeats_skipped(
        envelopes in prop::collection::vec(prop::option::of(any::<u64>()), 0..64),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let expected: Vec<u64> = envelopes.iter().flatten().copied().collect();
            let (items, connects) = collect(vec![envelopes]).await;

            prop_assert_eq!(items, expected);
            prop_assert_eq!(connects, 0);

            Ok(())
        })?;
    }

    /// Property: with at least one envelope between drops, the budget of one
    /// reconnect is restored every time and nothing delivered is lost
    #[test]
    fn delivering_subscriptions_survive_drops(
        segments in prop::collection::vec(
            prop::collection::vec(prop::option::of(0u64..1000), 1..8),
            1..10,
        ),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let expected: Vec<u64> = segments.iter().flatten().flatten().copied().collect();
            let reopens = segments.len() - 1;
            let (items, connects) = collect(segments).await;

            prop_assert_eq!(items, expected);
            prop_assert_eq!(connects, reopens);

            Ok(())
        })?;
    }
}
