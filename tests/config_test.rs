//! Integration tests for configuration loading

use demand_generator::infra::{Config, ConfigError, OutputFormat};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[streaming]
rate_per_tick = 2.5
tick_interval_ms = 250
output_format = "summary"
burst_enabled = false
seed = 1234
output_file = "out/trips.jsonl"

[temporal_patterns.hourly_pattern]
8 = 2.0
18 = 2.5

[temporal_patterns.weekday_pattern]
0 = 1.2
6 = 0.6

[temporal_patterns.rush_hour_pattern]
morning_start = 6
morning_end = 10
peak_multiplier = 1.5

[geographic]
default_catalog = false

[[geographic.zones]]
id = "harbor"
name = "Harbor"
center_lat = 40.70
center_lon = -74.01
radius_km = 1.2
demand_weight = 2.0

[[geographic.stops]]
id = "stop_100"
name = "Pier 17"
lat = 40.705
lon = -74.003
zone_id = "harbor"
stop_type = "ferry"

[metrics]
interval_secs = 0
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.rate_per_tick(), 2.5);
    assert_eq!(config.tick_interval_ms(), 250);
    assert_eq!(config.output_format(), OutputFormat::Summary);
    assert!(!config.burst_enabled());
    assert_eq!(config.seed(), Some(1234));
    assert_eq!(config.output_file(), Some("out/trips.jsonl"));
    assert!(!config.default_catalog());
    assert_eq!(config.zone_ids(), vec!["harbor".to_string()]);
    assert_eq!(config.zones()[0].demand_weight, 2.0);
    assert_eq!(config.stops().len(), 1);
    assert_eq!(config.stops()[0].stop_type, "ferry");
    assert_eq!(config.metrics_interval_secs(), 0);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());

    let patterns = config.temporal_patterns();
    assert_eq!(patterns.hourly.as_ref().unwrap().get(&8), Some(&2.0));
    assert_eq!(patterns.weekday.as_ref().unwrap().get(&6), Some(&0.6));
    let rush = patterns.rush_hour.as_ref().unwrap();
    assert_eq!((rush.morning_start, rush.morning_end), (6, 10));
    // Unspecified fields keep their defaults
    assert_eq!((rush.evening_start, rush.evening_end), (17, 19));
    assert_eq!(rush.peak_multiplier, 1.5);
}

#[test]
fn test_shipped_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/demand.toml");
    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.output_format(), OutputFormat::Json);
    assert_eq!(config.tick_interval_ms(), 1000);
    assert_eq!(config.zone_ids(), vec!["downtown", "midtown", "uptown", "suburbs"]);
    assert_eq!(config.temporal_patterns().hourly.as_ref().unwrap().len(), 24);
    assert_eq!(config.temporal_patterns().weekday.as_ref().unwrap().len(), 7);
}

#[test]
fn test_missing_file_is_read_error() {
    let err = Config::from_file("/nonexistent/demand.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_missing_zones_is_parse_error() {
    let temp_file = write_config(
        r#"
[streaming]
output_format = "json"

[geographic]
default_catalog = true
"#,
    );
    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_invalid_radius_names_key() {
    let temp_file = write_config(
        r#"
[streaming]
output_format = "json"

[[geographic.zones]]
id = "a"
name = "A"
center_lat = 40.0
center_lon = -74.0
radius_km = 1.0

[[geographic.zones]]
id = "b"
name = "B"
center_lat = 40.1
center_lon = -74.1
radius_km = -3.0
"#,
    );
    match Config::from_file(temp_file.path()).unwrap_err() {
        ConfigError::Invalid { key, .. } => assert_eq!(key, "geographic.zones[1].radius_km"),
        other => panic!("unexpected error: {other}"),
    }
}
