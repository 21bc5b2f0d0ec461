//! Delay functions used between a reconnect trigger and the reconnect itself.

use std::time::Duration;

/// Computes how long to wait before reconnect number `attempt`.
///
/// `attempt` is 0-indexed: the first reconnect of a call asks for attempt 0.
pub trait IntervalFunction: Send + Sync {
    /// Returns the delay before the given reconnect attempt.
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Waits the same duration before every reconnect.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a fixed interval.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `initial * multiplier^attempt`, optionally capped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff doubling from `initial`.
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max: None,
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the delay.
    pub fn max_interval(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        grow(self.initial, self.multiplier, attempt, self.max)
    }
}

/// Exponential backoff with jitter so that many sessions dropped together do
/// not reconnect in lockstep.
#[derive(Debug, Clone)]
pub struct ExponentialRandomBackoff {
    base: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    /// Creates a jittered backoff.
    ///
    /// A `randomization_factor` of 0.5 spreads each delay uniformly between
    /// 50% and 150% of the exponential value. The factor is clamped to
    /// `0.0..=1.0`.
    pub fn new(initial: Duration, randomization_factor: f64) -> Self {
        Self {
            base: ExponentialBackoff::new(initial),
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.base = self.base.multiplier(multiplier);
        self
    }

    /// Caps the delay before jitter is applied.
    pub fn max_interval(mut self, max: Duration) -> Self {
        self.base = self.base.max_interval(max);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        use rand::Rng;

        let center = self.base.next_interval(attempt).as_nanos() as f64;
        let delta = center * self.randomization_factor;
        from_nanos_f64(rand::rng().random_range((center - delta)..=(center + delta)))
    }
}

/// Backoff computed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}

fn grow(initial: Duration, multiplier: f64, attempt: usize, max: Option<Duration>) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let interval = from_nanos_f64(initial.as_nanos() as f64 * multiplier.powi(exponent));
    match max {
        Some(max) => interval.min(max),
        None => interval,
    }
}

fn from_nanos_f64(nanos: f64) -> Duration {
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_nanos(nanos.max(0.0).round() as u64)
    }
}
