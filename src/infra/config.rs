//! Configuration loading from TOML files
//!
//! The config file is selected with `--config <path>` (default
//! `config/demand.toml`). Missing optional keys take the defaults below;
//! missing required keys or out-of-range values fail construction with a
//! `ConfigError` naming the offending key.

use crate::domain::geo::{default_zones, Coordinate, Stop, Zone};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value at `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { key: key.into(), reason: reason.into() }
    }
}

/// Largest accepted zone `demand_weight`
pub const MAX_DEMAND_WEIGHT: f64 = 1_000_000.0;

/// How emitted trip requests are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON document per line
    Json,
    /// `Generated trip: <id>`
    Summary,
}

impl OutputFormat {
    /// `json` selects JSON; anything else is the summary line
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            OutputFormat::Json
        } else {
            OutputFormat::Summary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Summary => "summary",
        }
    }
}

/// Rush-hour windows, half-open hour intervals
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RushHourConfig {
    #[serde(default = "default_morning_start")]
    pub morning_start: u32,
    #[serde(default = "default_morning_end")]
    pub morning_end: u32,
    #[serde(default = "default_evening_start")]
    pub evening_start: u32,
    #[serde(default = "default_evening_end")]
    pub evening_end: u32,
    #[serde(default = "default_peak_multiplier")]
    pub peak_multiplier: f64,
}

fn default_morning_start() -> u32 {
    7
}

fn default_morning_end() -> u32 {
    9
}

fn default_evening_start() -> u32 {
    17
}

fn default_evening_end() -> u32 {
    19
}

fn default_peak_multiplier() -> f64 {
    2.0
}

impl Default for RushHourConfig {
    fn default() -> Self {
        Self {
            morning_start: default_morning_start(),
            morning_end: default_morning_end(),
            evening_start: default_evening_start(),
            evening_end: default_evening_end(),
            peak_multiplier: default_peak_multiplier(),
        }
    }
}

/// Per-kind pattern overrides. `None` installs the built-in table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalPatternsConfig {
    pub hourly: Option<HashMap<u32, f64>>,
    pub weekday: Option<HashMap<u32, f64>>,
    pub rush_hour: Option<RushHourConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingToml {
    #[serde(default = "default_rate_per_tick")]
    pub rate_per_tick: f64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    pub output_format: String,
    #[serde(default = "default_burst_enabled")]
    pub burst_enabled: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    /// JSONL output file; stdout when absent
    #[serde(default)]
    pub output_file: Option<String>,
}

fn default_rate_per_tick() -> f64 {
    1.0
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_burst_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemporalPatternsToml {
    /// Hour (as a string key, "0".."23") to multiplier
    #[serde(default)]
    pub hourly_pattern: Option<HashMap<String, f64>>,
    /// Day of week (as a string key, "0"=Monday.."6"=Sunday) to multiplier
    #[serde(default)]
    pub weekday_pattern: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub rush_hour_pattern: Option<RushHourConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneToml {
    pub id: String,
    pub name: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
    #[serde(default = "default_demand_weight")]
    pub demand_weight: f64,
}

fn default_demand_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopToml {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub zone_id: String,
    #[serde(default = "default_stop_type")]
    pub stop_type: String,
}

fn default_stop_type() -> String {
    "bus".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeographicToml {
    /// Seed the registry with the built-in city catalog
    #[serde(default = "default_catalog_enabled")]
    pub default_catalog: bool,
    pub zones: Vec<ZoneToml>,
    #[serde(default)]
    pub stops: Vec<StopToml>,
}

fn default_catalog_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsToml {
    /// Periodic metrics log interval (0 to disable)
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    10
}

impl Default for MetricsToml {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub streaming: StreamingToml,
    #[serde(default)]
    pub temporal_patterns: TemporalPatternsToml,
    pub geographic: GeographicToml,
    #[serde(default)]
    pub metrics: MetricsToml,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    rate_per_tick: f64,
    tick_interval_ms: u64,
    output_format: OutputFormat,
    burst_enabled: bool,
    seed: Option<u64>,
    output_file: Option<String>,
    temporal_patterns: TemporalPatternsConfig,
    default_catalog: bool,
    zones: Vec<Zone>,
    stops: Vec<Stop>,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_per_tick: default_rate_per_tick(),
            tick_interval_ms: default_tick_interval_ms(),
            output_format: OutputFormat::Json,
            burst_enabled: default_burst_enabled(),
            seed: None,
            output_file: None,
            temporal_patterns: TemporalPatternsConfig::default(),
            default_catalog: true,
            zones: default_zones(),
            stops: Vec::new(),
            metrics_interval_secs: default_metrics_interval(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

        let mut config = Self::from_toml(toml_config)?;
        config.config_file = path.display().to_string();
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let toml_config: TomlConfig = toml::from_str(content)
            .map_err(|source| ConfigError::Parse { path: PathBuf::from("<inline>"), source })?;
        let mut config = Self::from_toml(toml_config)?;
        config.config_file = "inline".to_string();
        Ok(config)
    }

    /// Validate the raw document and convert it to the runtime config
    pub fn from_toml(toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let streaming = toml_config.streaming;
        if !streaming.rate_per_tick.is_finite() || streaming.rate_per_tick < 0.0 {
            return Err(ConfigError::invalid("streaming.rate_per_tick", "must be a finite value >= 0"));
        }
        if streaming.tick_interval_ms == 0 {
            return Err(ConfigError::invalid("streaming.tick_interval_ms", "must be > 0"));
        }

        let patterns = toml_config.temporal_patterns;
        let hourly = patterns
            .hourly_pattern
            .map(|table| parse_table(&table, "temporal_patterns.hourly_pattern", 24))
            .transpose()?;
        let weekday = patterns
            .weekday_pattern
            .map(|table| parse_table(&table, "temporal_patterns.weekday_pattern", 7))
            .transpose()?;
        if let Some(rush) = &patterns.rush_hour_pattern {
            validate_rush_hour(rush)?;
        }

        let geographic = toml_config.geographic;
        if geographic.zones.is_empty() {
            return Err(ConfigError::invalid("geographic.zones", "at least one zone is required"));
        }
        let zones = geographic
            .zones
            .into_iter()
            .enumerate()
            .map(|(i, zone)| convert_zone(i, zone))
            .collect::<Result<Vec<_>, _>>()?;
        let stops = geographic
            .stops
            .into_iter()
            .map(|s| {
                Stop::new(&s.id, &s.name, Coordinate::new(s.lat, s.lon), &s.zone_id)
                    .with_type(&s.stop_type)
            })
            .collect();

        Ok(Self {
            rate_per_tick: streaming.rate_per_tick,
            tick_interval_ms: streaming.tick_interval_ms,
            output_format: OutputFormat::parse(&streaming.output_format),
            burst_enabled: streaming.burst_enabled,
            seed: streaming.seed,
            output_file: streaming.output_file,
            temporal_patterns: TemporalPatternsConfig {
                hourly,
                weekday,
                rush_hour: patterns.rush_hour_pattern,
            },
            default_catalog: geographic.default_catalog,
            zones,
            stops,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: String::new(),
        })
    }

    pub fn rate_per_tick(&self) -> f64 {
        self.rate_per_tick
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn burst_enabled(&self) -> bool {
        self.burst_enabled
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn output_file(&self) -> Option<&str> {
        self.output_file.as_deref()
    }

    pub fn temporal_patterns(&self) -> &TemporalPatternsConfig {
        &self.temporal_patterns
    }

    pub fn default_catalog(&self) -> bool {
        self.default_catalog
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_ids(&self) -> Vec<String> {
        self.zones.iter().map(|z| z.id.clone()).collect()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder for tests and embedding: override the base rate
    pub fn with_rate_per_tick(mut self, rate: f64) -> Self {
        self.rate_per_tick = rate;
        self
    }

    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    pub fn with_burst_enabled(mut self, enabled: bool) -> Self {
        self.burst_enabled = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_zones(mut self, zones: Vec<Zone>) -> Self {
        self.zones = zones;
        self
    }

    pub fn with_stops(mut self, stops: Vec<Stop>) -> Self {
        self.stops = stops;
        self
    }

    pub fn with_default_catalog(mut self, enabled: bool) -> Self {
        self.default_catalog = enabled;
        self
    }

    pub fn with_temporal_patterns(mut self, patterns: TemporalPatternsConfig) -> Self {
        self.temporal_patterns = patterns;
        self
    }
}

/// Convert string keys to integers, rejecting keys outside `0..limit` and
/// negative or non-finite multipliers
fn parse_table(
    table: &HashMap<String, f64>,
    key_path: &str,
    limit: u32,
) -> Result<HashMap<u32, f64>, ConfigError> {
    let mut parsed = HashMap::with_capacity(table.len());
    for (key, &multiplier) in table {
        let entry_path = format!("{}.{}", key_path, key);
        let index: u32 = key
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(&entry_path, "key must be an integer"))?;
        if index >= limit {
            return Err(ConfigError::invalid(&entry_path, format!("key must be in 0..{}", limit)));
        }
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(ConfigError::invalid(&entry_path, "multiplier must be a finite value >= 0"));
        }
        parsed.insert(index, multiplier);
    }
    Ok(parsed)
}

fn validate_rush_hour(rush: &RushHourConfig) -> Result<(), ConfigError> {
    let base = "temporal_patterns.rush_hour_pattern";
    let hours = [
        ("morning_start", rush.morning_start),
        ("morning_end", rush.morning_end),
        ("evening_start", rush.evening_start),
        ("evening_end", rush.evening_end),
    ];
    for (name, hour) in hours {
        if hour > 24 {
            return Err(ConfigError::invalid(format!("{}.{}", base, name), "hour must be in 0..=24"));
        }
    }
    if !rush.peak_multiplier.is_finite() || rush.peak_multiplier < 0.0 {
        return Err(ConfigError::invalid(
            format!("{}.peak_multiplier", base),
            "must be a finite value >= 0",
        ));
    }
    Ok(())
}

fn convert_zone(index: usize, zone: ZoneToml) -> Result<Zone, ConfigError> {
    let key = |field: &str| format!("geographic.zones[{}].{}", index, field);
    if zone.id.trim().is_empty() {
        return Err(ConfigError::invalid(key("id"), "must not be empty"));
    }
    if !(zone.radius_km > 0.0) {
        return Err(ConfigError::invalid(key("radius_km"), "must be > 0"));
    }
    if !(zone.demand_weight > 0.0 && zone.demand_weight <= MAX_DEMAND_WEIGHT) {
        return Err(ConfigError::invalid(
            key("demand_weight"),
            format!("must be in (0, {}]", MAX_DEMAND_WEIGHT),
        ));
    }
    Ok(Zone::new(&zone.id, &zone.name, Coordinate::new(zone.center_lat, zone.center_lon), zone.radius_km)
        .with_weight(zone.demand_weight))
}
