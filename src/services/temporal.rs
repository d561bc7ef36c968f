//! Temporal pattern engine - time-varying demand rate
//!
//! A pattern is a pure function from a local date-time to a multiplier. The
//! engine holds an ordered list of patterns and a base rate; the demand rate
//! at a timestamp is the base rate times the product of every multiplier.
//!
//! Three kinds ship by default:
//! - hourly: lookup by hour of day (0-23)
//! - weekday: lookup by day of week (0=Monday, 6=Sunday)
//! - rush hour: flat peak inside two half-open hour windows
//!
//! Lookups with no entry for the current key are neutral (1.0).

use crate::infra::config::{RushHourConfig, TemporalPatternsConfig};
use chrono::{Datelike, NaiveDateTime, Timelike};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Multiplier for any key missing from a lookup table
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;

/// Default hour-of-day profile: trough at 2-3 AM, peaks at 8 AM and 6 PM.
pub const DEFAULT_HOURLY_MULTIPLIERS: [f64; 24] = [
    0.3, // 12 AM - 1 AM
    0.2, // 1 AM - 2 AM
    0.1, // 2 AM - 3 AM
    0.1, // 3 AM - 4 AM
    0.2, // 4 AM - 5 AM
    0.3, // 5 AM - 6 AM
    0.5, // 6 AM - 7 AM
    1.5, // 7 AM - 8 AM
    2.0, // 8 AM - 9 AM (morning peak)
    1.8, // 9 AM - 10 AM
    1.2, // 10 AM - 11 AM
    1.3, // 11 AM - 12 PM
    1.5, // 12 PM - 1 PM
    1.4, // 1 PM - 2 PM
    1.2, // 2 PM - 3 PM
    1.3, // 3 PM - 4 PM
    1.6, // 4 PM - 5 PM
    2.2, // 5 PM - 6 PM
    2.5, // 6 PM - 7 PM (evening peak)
    2.0, // 7 PM - 8 PM
    1.5, // 8 PM - 9 PM
    1.0, // 9 PM - 10 PM
    0.8, // 10 PM - 11 PM
    0.5, // 11 PM - 12 AM
];

/// Default day-of-week profile, Monday first. Weekends are quieter.
pub const DEFAULT_WEEKDAY_MULTIPLIERS: [f64; 7] = [
    1.2, // Monday
    1.3, // Tuesday
    1.3, // Wednesday
    1.3, // Thursday
    1.4, // Friday
    0.8, // Saturday
    0.6, // Sunday
];

/// Shared, thread-safe pattern function
pub type PatternFn = Arc<dyn Fn(&NaiveDateTime) -> f64 + Send + Sync>;

/// Convert a dense table into a keyed lookup (index = key)
pub fn table_from(values: &[f64]) -> HashMap<u32, f64> {
    values.iter().enumerate().map(|(key, &m)| (key as u32, m)).collect()
}

/// Multiplier by hour of day
pub fn hourly_pattern(table: HashMap<u32, f64>) -> impl Fn(&NaiveDateTime) -> f64 + Send + Sync {
    move |ts: &NaiveDateTime| table.get(&ts.hour()).copied().unwrap_or(NEUTRAL_MULTIPLIER)
}

/// Multiplier by day of week (0=Monday)
pub fn weekday_pattern(table: HashMap<u32, f64>) -> impl Fn(&NaiveDateTime) -> f64 + Send + Sync {
    move |ts: &NaiveDateTime| {
        table.get(&ts.weekday().num_days_from_monday()).copied().unwrap_or(NEUTRAL_MULTIPLIER)
    }
}

/// Flat peak multiplier inside `[morning_start, morning_end)` and
/// `[evening_start, evening_end)`, neutral elsewhere
pub fn rush_hour_pattern(windows: RushHourConfig) -> impl Fn(&NaiveDateTime) -> f64 + Send + Sync {
    move |ts: &NaiveDateTime| {
        let hour = ts.hour();
        let in_morning = windows.morning_start <= hour && hour < windows.morning_end;
        let in_evening = windows.evening_start <= hour && hour < windows.evening_end;
        if in_morning || in_evening {
            windows.peak_multiplier
        } else {
            NEUTRAL_MULTIPLIER
        }
    }
}

/// Composes pattern multipliers with a base rate
pub struct TemporalPatternEngine {
    /// Requests per tick before any pattern is applied
    base_rate: f64,
    patterns: RwLock<Vec<PatternFn>>,
}

impl TemporalPatternEngine {
    /// Engine with the three default kinds, each taken from `config` when
    /// present and from the built-in tables otherwise
    pub fn new(base_rate: f64, config: &TemporalPatternsConfig) -> Self {
        let engine = Self::empty(base_rate);

        let hourly = config.hourly.clone().unwrap_or_else(|| table_from(&DEFAULT_HOURLY_MULTIPLIERS));
        engine.add_pattern(hourly_pattern(hourly));

        let weekday =
            config.weekday.clone().unwrap_or_else(|| table_from(&DEFAULT_WEEKDAY_MULTIPLIERS));
        engine.add_pattern(weekday_pattern(weekday));

        engine.add_pattern(rush_hour_pattern(config.rush_hour.clone().unwrap_or_default()));

        engine
    }

    /// Engine with no patterns: `demand_rate` equals the base rate
    pub fn empty(base_rate: f64) -> Self {
        Self { base_rate, patterns: RwLock::new(Vec::new()) }
    }

    /// Base rate times the product of all pattern multipliers
    pub fn demand_rate(&self, timestamp: &NaiveDateTime) -> f64 {
        self.base_rate * self.multiplier(timestamp)
    }

    /// Product of all pattern multipliers at `timestamp`
    pub fn multiplier(&self, timestamp: &NaiveDateTime) -> f64 {
        // Snapshot so pattern code never runs under the lock
        let patterns = self.patterns.read().clone();
        patterns.iter().map(|pattern| pattern(timestamp)).product()
    }

    /// Append a pattern; visible to the next `demand_rate` call
    pub fn add_pattern<F>(&self, pattern: F)
    where
        F: Fn(&NaiveDateTime) -> f64 + Send + Sync + 'static,
    {
        let mut patterns = self.patterns.write();
        patterns.push(Arc::new(pattern));
        debug!(patterns = %patterns.len(), "pattern_added");
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }
}

impl std::fmt::Debug for TemporalPatternEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporalPatternEngine")
            .field("base_rate", &self.base_rate)
            .field("patterns", &self.pattern_count())
            .finish()
    }
}
