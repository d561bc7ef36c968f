//! Demand generator - the streaming generation loop
//!
//! One background task runs the generation cycle once per tick:
//! 1. read the clock
//! 2. ask the pattern engine for the demand rate
//! 3. turn the rate into an integer count (floor, plus one Bernoulli unit for
//!    the fractional part when burst mode is on)
//! 4. for each unit, pick origin/destination zones uniformly from the
//!    configured zone list and a stop in each, falling back to a weighted
//!    registry-wide stop when a zone has none
//! 5. hand the request to the sink
//!
//! `start()` / `stop()` drive a state token (Stopped, Running, Stopping). Stop
//! is signalled over a watch channel and observed between cycles only; a cycle
//! that has begun always runs to completion before `stop()` returns. While
//! `stop()` is joining the worker the token is Stopping and `start()` refuses,
//! so at most one worker is ever alive.
//!
//! A sink failure halts the worker. The error is returned by `stop()`.

use crate::domain::geo::Stop;
use crate::domain::trip::TripRequest;
use crate::infra::config::Config;
use crate::infra::metrics::GeneratorMetrics;
use crate::io::sink::{EmissionError, TripSink};
use crate::services::stop_registry::StopRegistry;
use crate::services::temporal::TemporalPatternEngine;
use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};


/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Wall clock in local time
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Number of requests to emit for one tick at `rate`.
///
/// The floor of the rate is guaranteed; with burst mode on, the fractional
/// remainder is the probability of one extra unit. Non-positive or
/// non-finite rates yield zero.
pub fn request_count<R: Rng + ?Sized>(rate: f64, burst_enabled: bool, rng: &mut R) -> usize {
    if !rate.is_finite() || rate <= 0.0 {
        return 0;
    }
    let guaranteed = rate.floor();
    let mut count = guaranteed as usize;
    if burst_enabled {
        let remainder = rate - guaranteed;
        if remainder > 0.0 && rng.gen::<f64>() < remainder {
            count += 1;
        }
    }
    count
}

/// State shared between the controller and the worker task
struct GeneratorCore {
    engine: Arc<TemporalPatternEngine>,
    registry: Arc<StopRegistry>,
    /// Configured zone ids, drawn uniformly for origin and destination
    zone_ids: Vec<String>,
    burst_enabled: bool,
    tick_interval: Duration,
    clock: Clock,
    rng: Mutex<StdRng>,
    sink: Mutex<Box<dyn TripSink>>,
    metrics: Arc<GeneratorMetrics>,
}

impl GeneratorCore {
    /// One generation cycle. Returns the number of requests emitted.
    fn run_cycle(&self) -> Result<usize, EmissionError> {
        let now = (self.clock)();
        let rate = self.engine.demand_rate(&now);
        self.metrics.record_tick(rate);

        let mut rng = self.rng.lock();
        let count = request_count(rate, self.burst_enabled, &mut *rng);
        if count as f64 > rate {
            self.metrics.record_burst_unit();
        }

        let mut sink = self.sink.lock();
        let mut emitted = 0;
        for _ in 0..count {
            let Some(request) = self.generate_trip_request(now, &mut *rng) else {
                self.metrics.record_skipped_unit();
                warn!(timestamp = %now, "no_stop_available");
                continue;
            };

            debug!(
                id = %request.id,
                origin = %request.origin_stop_id,
                destination = %request.destination_stop_id,
                "trip_generated"
            );
            if let Err(e) = sink.emit(request) {
                self.metrics.record_emission_failure();
                error!(
                    id = %e.request_id,
                    timestamp = %e.timestamp,
                    error = %e.cause,
                    "trip_emission_failed"
                );
                return Err(e);
            }
            self.metrics.record_request();
            emitted += 1;
        }

        debug!(timestamp = %now, rate = %rate, count = %count, emitted = %emitted, "tick");
        Ok(emitted)
    }

    fn generate_trip_request<R: Rng + ?Sized>(
        &self,
        timestamp: NaiveDateTime,
        rng: &mut R,
    ) -> Option<TripRequest> {
        let origin_zone = self.zone_ids.choose(rng)?;
        let destination_zone = self.zone_ids.choose(rng)?;

        let origin = self.pick_stop(origin_zone, rng)?;
        let destination = self.pick_stop(destination_zone, rng)?;

        Some(TripRequest::random(&origin.id, &destination.id, timestamp, rng))
    }

    /// Uniform stop in the zone, or a weighted registry-wide stop if the zone is empty
    fn pick_stop<R: Rng + ?Sized>(&self, zone_id: &str, rng: &mut R) -> Option<Stop> {
        let stops = self.registry.stops_in_zone(zone_id);
        match stops.choose(rng) {
            Some(stop) => Some(stop.clone()),
            None => {
                self.metrics.record_fallback_stop();
                debug!(zone_id = %zone_id, "zone_without_stops_fallback");
                self.registry.random_stop(rng)
            }
        }
    }
}

/// Worker loop: one cycle per tick until shutdown is signalled or
/// `tick_limit` cycles have run.
///
/// Each cycle runs on the blocking pool since sinks write and flush
/// synchronously.
async fn run_worker(
    core: Arc<GeneratorCore>,
    mut shutdown: watch::Receiver<bool>,
    tick_limit: Option<u64>,
) -> Result<(), EmissionError> {
    let mut ticker = tokio::time::interval(core.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_ms = %core.tick_interval.as_millis(),
        tick_limit = ?tick_limit,
        "generator_worker_started"
    );

    let mut cycles: u64 = 0;
    while tick_limit.map_or(true, |limit| cycles < limit) {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // Sender dropped means the controller is gone
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let cycle_core = Arc::clone(&core);
                let cycle = tokio::task::spawn_blocking(move || cycle_core.run_cycle());
                let outcome = match cycle.await {
                    Ok(outcome) => outcome,
                    Err(e) => std::panic::resume_unwind(e.into_panic()),
                };
                if let Err(e) = outcome {
                    warn!(request_id = %e.request_id, "generator_worker_halted");
                    return Err(e);
                }
                cycles += 1;
            }
        }
    }

    info!(cycles = %cycles, "generator_worker_stopped");
    Ok(())
}

enum WorkerState {
    Stopped,
    Running { shutdown_tx: watch::Sender<bool>, handle: JoinHandle<Result<(), EmissionError>> },
    /// `stop()` is joining the worker; `start()` is refused until it finishes
    Stopping,
}

/// Returns the state to `Stopped` when the joining `stop()` completes or is dropped
struct StoppingGuard<'a> {
    state: &'a Mutex<WorkerState>,
}

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = WorkerState::Stopped;
    }
}

/// Streams synthetic trip requests into a sink at a time-varying rate
pub struct DemandGenerator {
    core: Arc<GeneratorCore>,
    state: Mutex<WorkerState>,
}

impl DemandGenerator {
    /// Build a generator reading the local wall clock
    pub fn new(config: &Config, sink: Box<dyn TripSink>) -> Self {
        Self::with_clock(config, sink, Arc::new(local_now))
    }

    /// Build a generator with an injected clock
    pub fn with_clock(config: &Config, sink: Box<dyn TripSink>, clock: Clock) -> Self {
        let registry = if config.default_catalog() {
            StopRegistry::with_default_catalog()
        } else {
            StopRegistry::new()
        };
        for zone in config.zones() {
            if !registry.replace_zone(zone.clone()) {
                registry.add_zone(zone.clone());
            }
        }
        for stop in config.stops() {
            registry.add_stop(stop.clone());
        }

        let engine = TemporalPatternEngine::new(config.rate_per_tick(), config.temporal_patterns());

        let rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            base_rate = %engine.base_rate(),
            patterns = %engine.pattern_count(),
            zones = %registry.zone_count(),
            stops = %registry.stop_count(),
            burst_enabled = %config.burst_enabled(),
            seeded = %config.seed().is_some(),
            "generator_initialized"
        );

        let core = GeneratorCore {
            engine: Arc::new(engine),
            registry: Arc::new(registry),
            zone_ids: config.zone_ids(),
            burst_enabled: config.burst_enabled(),
            tick_interval: Duration::from_millis(config.tick_interval_ms()),
            clock,
            rng: Mutex::new(rng),
            sink: Mutex::new(sink),
            metrics: Arc::new(GeneratorMetrics::new()),
        };

        Self { core: Arc::new(core), state: Mutex::new(WorkerState::Stopped) }
    }

    /// Spawn the worker on the current Tokio runtime.
    ///
    /// Returns false (and does nothing) if a worker is running or still
    /// being stopped.
    pub fn start(&self) -> bool {
        self.spawn_worker(None)
    }

    /// Like `start`, but the worker exits on its own after exactly `ticks`
    /// cycles. `stop()` must still be called to collect its result.
    pub fn start_for_ticks(&self, ticks: u64) -> bool {
        self.spawn_worker(Some(ticks))
    }

    fn spawn_worker(&self, tick_limit: Option<u64>) -> bool {
        let mut state = self.state.lock();
        match *state {
            WorkerState::Running { .. } => {
                debug!("generator_already_running");
                return false;
            }
            WorkerState::Stopping => {
                debug!("generator_still_stopping");
                return false;
            }
            WorkerState::Stopped => {}
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_worker(Arc::clone(&self.core), shutdown_rx, tick_limit));
        *state = WorkerState::Running { shutdown_tx, handle };

        info!(tick_limit = ?tick_limit, "generator_started");
        true
    }

    /// Signal the worker and wait for its in-flight cycle to finish.
    ///
    /// Returns the emission error that halted the worker, if any. No-op when
    /// already stopped or when another `stop()` is joining the worker.
    pub async fn stop(&self) -> Result<(), EmissionError> {
        let (shutdown_tx, handle) = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, WorkerState::Stopping) {
                WorkerState::Running { shutdown_tx, handle } => (shutdown_tx, handle),
                other => {
                    debug!(stopping = %matches!(other, WorkerState::Stopping), "generator_not_running");
                    *state = other;
                    return Ok(());
                }
            }
        };
        let _stopping = StoppingGuard { state: &self.state };

        // Fails only if the worker already exited
        let _ = shutdown_tx.send(true);

        let result = match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(error = %e, "generator_worker_cancelled");
                Ok(())
            }
        };

        info!(
            ticks = %self.core.metrics.ticks_total(),
            requests = %self.core.metrics.requests_total(),
            ok = %result.is_ok(),
            "generator_stopped"
        );
        result
    }

    /// True while a worker is alive, including while `stop()` is joining it.
    /// A worker halted by an emission failure or by its tick limit reports
    /// false; `stop()` still has to be called to collect its result.
    pub fn is_running(&self) -> bool {
        match &*self.state.lock() {
            WorkerState::Running { handle, .. } => !handle.is_finished(),
            WorkerState::Stopping => true,
            WorkerState::Stopped => false,
        }
    }

    /// Run one generation cycle synchronously at the current clock time
    pub fn tick_once(&self) -> Result<usize, EmissionError> {
        self.core.run_cycle()
    }

    /// Pattern engine; `add_pattern` is safe while running
    pub fn engine(&self) -> &Arc<TemporalPatternEngine> {
        &self.core.engine
    }

    /// Stop registry; `add_stop` / `add_zone` are safe while running
    pub fn registry(&self) -> &Arc<StopRegistry> {
        &self.core.registry
    }

    pub fn metrics(&self) -> &Arc<GeneratorMetrics> {
        &self.core.metrics
    }

    pub fn tick_interval(&self) -> Duration {
        self.core.tick_interval
    }
}
