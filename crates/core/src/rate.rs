//! Rate and auto-scale baseline aggregation
//!
//! Turns cumulative byte counters into per-second rates. Each stream also keeps
//! a baseline: the larger of the current rate and the previous baseline decayed
//! by `exp(-dt / tau)`. A display axis scaled to the baseline follows spikes
//! immediately and relaxes smoothly once they pass.

use rg_sampler_types::{CounterStream, RateConfig, RateEstimate, RawCounterPair};
use std::collections::HashMap;
use std::time::Instant;

/// Exponential decay factor for an elapsed `dt_secs` and time constant `tau_secs`
pub fn decay_factor(dt_secs: f64, tau_secs: f64) -> f64 {
    (-dt_secs / tau_secs).exp()
}

/// `tau_secs` if strictly positive and finite, else the configured default
fn checked_tau(tau_secs: f64) -> f64 {
    RateConfig {
        tau_secs,
        ..RateConfig::default()
    }
    .tau()
}

/// Rate state for a single counter stream
#[derive(Debug, Clone)]
pub struct RateTracker {
    tau_secs: f64,
    previous: Option<(u64, Instant)>,
    estimate: RateEstimate,
}

impl RateTracker {
    pub fn new(tau_secs: f64) -> Self {
        Self {
            tau_secs: checked_tau(tau_secs),
            previous: None,
            estimate: RateEstimate::default(),
        }
    }

    /// Feed the current counter value.
    ///
    /// The first call only records the starting point. A non-advancing clock
    /// returns the previous estimate without touching any state. A counter
    /// that went backwards (reset or wraparound) reads as zero traffic.
    pub fn update(&mut self, counter: u64, now: Instant) -> RateEstimate {
        let Some((prev_counter, prev_time)) = self.previous else {
            self.previous = Some((counter, now));
            return self.estimate;
        };

        let dt = match now.checked_duration_since(prev_time) {
            Some(elapsed) if !elapsed.is_zero() => elapsed.as_secs_f64(),
            _ => {
                log::trace!("Clock did not advance, keeping previous rate estimate");
                return self.estimate;
            }
        };

        if counter < prev_counter {
            log::debug!(
                "Counter went backwards ({} -> {}), clamping delta to 0",
                prev_counter,
                counter
            );
        }
        let delta = counter.saturating_sub(prev_counter) as f64;
        let rate = delta / dt;
        let baseline = rate.max(self.estimate.baseline * decay_factor(dt, self.tau_secs));

        self.previous = Some((counter, now));
        self.estimate = RateEstimate::new(rate, baseline);
        self.estimate
    }

    /// Most recent estimate
    pub fn estimate(&self) -> RateEstimate {
        self.estimate
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.estimate = RateEstimate::default();
    }
}

/// Independent rate trackers keyed by counter stream
#[derive(Debug, Clone)]
pub struct RateAggregator {
    tau_secs: f64,
    trackers: HashMap<CounterStream, RateTracker>,
}

impl RateAggregator {
    pub fn new(config: &RateConfig) -> Self {
        Self::with_tau(config.tau())
    }

    pub fn with_tau(tau_secs: f64) -> Self {
        Self {
            tau_secs: checked_tau(tau_secs),
            trackers: HashMap::with_capacity(CounterStream::ALL.len()),
        }
    }

    pub fn tau(&self) -> f64 {
        self.tau_secs
    }

    /// Feed one counter reading for `stream`
    pub fn update(&mut self, stream: CounterStream, counter: u64, now: Instant) -> RateEstimate {
        let tau = self.tau_secs;
        self.trackers
            .entry(stream)
            .or_insert_with(|| RateTracker::new(tau))
            .update(counter, now)
    }

    /// Feed both halves of a counter pair to their respective streams
    pub fn update_pair(
        &mut self,
        streams: (CounterStream, CounterStream),
        pair: RawCounterPair,
    ) -> (RateEstimate, RateEstimate) {
        (
            self.update(streams.0, pair.first, pair.captured_at),
            self.update(streams.1, pair.second, pair.captured_at),
        )
    }

    /// Latest estimate for a stream (zero if it was never fed)
    pub fn estimate(&self, stream: CounterStream) -> RateEstimate {
        self.trackers
            .get(&stream)
            .map(RateTracker::estimate)
            .unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.trackers.clear();
    }
}

impl Default for RateAggregator {
    fn default() -> Self {
        Self::new(&RateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const EPSILON: f64 = 1e-9;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_first_update_only_records_start() {
        let mut tracker = RateTracker::new(10.0);
        let estimate = tracker.update(5_000, Instant::now());
        assert_eq!(estimate, RateEstimate::default());
    }

    #[test]
    fn test_one_mebibyte_in_one_second() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(10.0);
        tracker.update(0, t0);

        let estimate = tracker.update(1_048_576, t0 + secs(1.0));

        assert!((estimate.rate - 1_048_576.0).abs() < EPSILON);
        assert!((estimate.baseline - 1_048_576.0).abs() < EPSILON);
    }

    #[test]
    fn test_counter_decrease_clamps_to_zero() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(10.0);
        tracker.update(10_000, t0);
        tracker.update(20_000, t0 + secs(1.0));

        let estimate = tracker.update(500, t0 + secs(2.0));
        assert_eq!(estimate.rate, 0.0);

        // The reset value becomes the new starting point
        let estimate = tracker.update(1_500, t0 + secs(3.0));
        assert!((estimate.rate - 1_000.0).abs() < EPSILON);
    }

    #[test]
    fn test_rate_never_negative() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(5.0);
        let counters = [100u64, 50, 75, 0, u64::MAX, 3, 3, 1_000];

        for (i, counter) in counters.iter().enumerate() {
            let estimate = tracker.update(*counter, t0 + secs(0.5 * i as f64));
            assert!(estimate.rate >= 0.0);
            assert!(estimate.baseline >= 0.0);
        }
    }

    #[test]
    fn test_non_advancing_clock_returns_previous_estimate() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(10.0);
        tracker.update(0, t0);
        let before = tracker.update(1_000, t0 + secs(1.0));

        let same_time = tracker.update(9_999_999, t0 + secs(1.0));
        assert_eq!(same_time, before);

        let earlier = tracker.update(9_999_999, t0);
        assert_eq!(earlier, before);

        // State was untouched, so the next delta is measured from 1_000
        let next = tracker.update(2_000, t0 + secs(2.0));
        assert!((next.rate - 1_000.0).abs() < EPSILON);
    }

    #[test]
    fn test_baseline_converges_to_constant_rate() {
        let t0 = Instant::now();
        let tau = 2.0;
        let mut tracker = RateTracker::new(tau);
        let rate = 4_096.0;

        let mut last = RateEstimate::default();
        for i in 0..=10u64 {
            last = tracker.update(i * rate as u64, t0 + secs(i as f64));
        }

        assert!((last.rate - rate).abs() < EPSILON);
        assert!((last.baseline - rate).abs() < EPSILON);
    }

    #[test]
    fn test_baseline_relaxes_after_spike() {
        let t0 = Instant::now();
        let tau = 10.0;
        let mut tracker = RateTracker::new(tau);
        let spike = 1_000_000u64;

        tracker.update(0, t0);
        let peak = tracker.update(spike, t0 + secs(1.0)).baseline;

        let mut previous = peak;
        for step in 1..=30u64 {
            let now = t0 + secs(1.0 + step as f64);
            let estimate = tracker.update(spike, now);

            assert_eq!(estimate.rate, 0.0);
            assert!(estimate.baseline < previous);

            let expected = peak * (-(step as f64) / tau).exp();
            assert!((estimate.baseline - expected).abs() < 1e-6 * peak);
            previous = estimate.baseline;
        }
    }

    #[test]
    fn test_streams_have_independent_baselines() {
        let t0 = Instant::now();
        let mut aggregator = RateAggregator::with_tau(10.0);

        let pair0 = RawCounterPair::new(0, 0, t0);
        let pair1 = RawCounterPair::new(2_000, 500, t0 + secs(1.0));
        aggregator.update_pair((CounterStream::NetworkUp, CounterStream::NetworkDown), pair0);
        let (up, down) =
            aggregator.update_pair((CounterStream::NetworkUp, CounterStream::NetworkDown), pair1);

        assert!((up.rate - 2_000.0).abs() < EPSILON);
        assert!((down.rate - 500.0).abs() < EPSILON);
        assert_eq!(aggregator.estimate(CounterStream::DiskRead), RateEstimate::default());

        aggregator.reset();
        assert_eq!(aggregator.estimate(CounterStream::NetworkUp), RateEstimate::default());
    }

    #[test]
    fn test_invalid_tau_falls_back_to_default() {
        for tau in [-5.0, 0.0, f64::NAN, f64::INFINITY] {
            assert_eq!(RateAggregator::with_tau(tau).tau(), 10.0);
        }

        // Baseline must decay, never grow, once the spike has passed
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(-1.0);
        tracker.update(0, t0);
        let peak = tracker.update(1_000, t0 + secs(1.0)).baseline;
        let later = tracker.update(1_000, t0 + secs(2.0)).baseline;
        assert!(later < peak);
        assert!(later > 0.0);
    }

    #[test]
    fn test_decay_factor() {
        assert!((decay_factor(0.0, 10.0) - 1.0).abs() < EPSILON);
        assert!((decay_factor(10.0, 10.0) - (-1.0f64).exp()).abs() < EPSILON);
    }
}
