//! Reconnect policies: how long to wait before re-establishing a session.

use crate::backoff::{ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction};
use std::sync::Arc;
use std::time::Duration;

/// Delay applied between observing a reconnect trigger and calling the
/// session manager.
#[derive(Clone, Default)]
pub enum ReconnectPolicy {
    /// Reconnect as soon as the trigger is observed.
    #[default]
    Immediate,

    /// Fixed delay before every reconnect.
    Fixed(FixedInterval),

    /// Exponential backoff across the reconnects of one call.
    Exponential(ExponentialBackoff),

    /// Exponential backoff with jitter.
    ExponentialRandom(ExponentialRandomBackoff),

    /// Custom delay function.
    Custom(Arc<dyn IntervalFunction>),
}

impl ReconnectPolicy {
    /// Reconnects without waiting.
    pub fn immediate() -> Self {
        ReconnectPolicy::Immediate
    }

    /// Waits `delay` before each reconnect.
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed(FixedInterval::new(delay))
    }

    /// Doubles the delay from `initial_delay` up to `max_delay`.
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        ReconnectPolicy::Exponential(ExponentialBackoff::new(initial_delay).max_interval(max_delay))
    }

    /// Like [`exponential`](Self::exponential), with a jitter factor in `0.0..=1.0`.
    pub fn exponential_random(
        initial_delay: Duration,
        max_delay: Duration,
        randomization_factor: f64,
    ) -> Self {
        ReconnectPolicy::ExponentialRandom(
            ExponentialRandomBackoff::new(initial_delay, randomization_factor)
                .max_interval(max_delay),
        )
    }

    /// Uses an arbitrary delay function.
    pub fn custom<I>(interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        ReconnectPolicy::Custom(Arc::new(interval))
    }

    /// Returns the delay before reconnect number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            ReconnectPolicy::Immediate => Duration::ZERO,
            ReconnectPolicy::Fixed(interval) => interval.next_interval(attempt),
            ReconnectPolicy::Exponential(backoff) => backoff.next_interval(attempt),
            ReconnectPolicy::ExponentialRandom(backoff) => backoff.next_interval(attempt),
            ReconnectPolicy::Custom(func) => func.next_interval(attempt),
        }
    }
}

impl std::fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "ReconnectPolicy::Immediate"),
            Self::Fixed(interval) => write!(f, "ReconnectPolicy::Fixed({:?})", interval),
            Self::Exponential(backoff) => write!(f, "ReconnectPolicy::Exponential({:?})", backoff),
            Self::ExponentialRandom(backoff) => {
                write!(f, "ReconnectPolicy::ExponentialRandom({:?})", backoff)
            }
            Self::Custom(_) => write!(f, "ReconnectPolicy::Custom"),
        }
    }
}
