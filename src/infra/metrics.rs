//! Lock-free generator metrics and periodic reporting
//!
//! Uses atomics on the hot path. `report()` swaps the per-interval counters
//! to zero to produce a snapshot.
//!
//! NOTE: All atomics use Relaxed ordering; these are statistical counters
//! only. Do NOT use them for coordination.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

pub struct GeneratorMetrics {
    /// Generation cycles run (monotonic)
    ticks_total: AtomicU64,
    /// Requests emitted (monotonic)
    requests_total: AtomicU64,
    /// Extra units added by burst rounding (monotonic)
    burst_units_total: AtomicU64,
    /// Units that fell back to a registry-wide stop (monotonic)
    fallback_stops_total: AtomicU64,
    /// Units skipped because no stop was available (monotonic)
    skipped_units_total: AtomicU64,
    /// Sink failures (monotonic)
    emission_failures_total: AtomicU64,
    /// Cycles since last report (reset on report)
    ticks_since_report: AtomicU64,
    /// Requests since last report (reset on report)
    requests_since_report: AtomicU64,
    /// Most recent demand rate, stored as f64 bits
    last_rate_bits: AtomicU64,
    last_report_time: Mutex<Instant>,
}

impl Default for GeneratorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorMetrics {
    pub fn new() -> Self {
        Self {
            ticks_total: AtomicU64::new(0),
            requests_total: AtomicU64::new(0),
            burst_units_total: AtomicU64::new(0),
            fallback_stops_total: AtomicU64::new(0),
            skipped_units_total: AtomicU64::new(0),
            emission_failures_total: AtomicU64::new(0),
            ticks_since_report: AtomicU64::new(0),
            requests_since_report: AtomicU64::new(0),
            last_rate_bits: AtomicU64::new(0f64.to_bits()),
            last_report_time: Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_tick(&self, rate: f64) {
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
        self.ticks_since_report.fetch_add(1, Ordering::Relaxed);
        self.last_rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_since_report.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_burst_unit(&self) {
        self.burst_units_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fallback_stop(&self) {
        self.fallback_stops_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped_unit(&self) {
        self.skipped_units_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_emission_failure(&self) {
        self.emission_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn burst_units_total(&self) -> u64 {
        self.burst_units_total.load(Ordering::Relaxed)
    }

    pub fn fallback_stops_total(&self) -> u64 {
        self.fallback_stops_total.load(Ordering::Relaxed)
    }

    pub fn skipped_units_total(&self) -> u64 {
        self.skipped_units_total.load(Ordering::Relaxed)
    }

    pub fn emission_failures_total(&self) -> u64 {
        self.emission_failures_total.load(Ordering::Relaxed)
    }

    pub fn last_rate(&self) -> f64 {
        f64::from_bits(self.last_rate_bits.load(Ordering::Relaxed))
    }

    /// Snapshot and reset the per-interval counters
    pub fn report(&self) -> MetricsSummary {
        let ticks = self.ticks_since_report.swap(0, Ordering::Relaxed);
        let requests = self.requests_since_report.swap(0, Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let requests_per_sec = if elapsed.as_secs_f64() > 0.0 {
            requests as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let requests_per_tick = if ticks > 0 { requests as f64 / ticks as f64 } else { 0.0 };

        MetricsSummary {
            ticks_total: self.ticks_total(),
            requests_total: self.requests_total(),
            burst_units_total: self.burst_units_total(),
            fallback_stops_total: self.fallback_stops_total(),
            skipped_units_total: self.skipped_units_total(),
            emission_failures_total: self.emission_failures_total(),
            interval_ticks: ticks,
            interval_requests: requests,
            requests_per_sec,
            requests_per_tick,
            last_rate: self.last_rate(),
        }
    }
}

/// Point-in-time view produced by `GeneratorMetrics::report`
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub ticks_total: u64,
    pub requests_total: u64,
    pub burst_units_total: u64,
    pub fallback_stops_total: u64,
    pub skipped_units_total: u64,
    pub emission_failures_total: u64,
    pub interval_ticks: u64,
    pub interval_requests: u64,
    pub requests_per_sec: f64,
    pub requests_per_tick: f64,
    pub last_rate: f64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            ticks_total = %self.ticks_total,
            requests_total = %self.requests_total,
            interval_requests = %self.interval_requests,
            requests_per_sec = format!("{:.2}", self.requests_per_sec),
            requests_per_tick = format!("{:.2}", self.requests_per_tick),
            last_rate = format!("{:.3}", self.last_rate),
            burst_units = %self.burst_units_total,
            fallback_stops = %self.fallback_stops_total,
            skipped_units = %self.skipped_units_total,
            emission_failures = %self.emission_failures_total,
            "metrics"
        );
    }
}
