//! Demand generator - synthetic transit trip-request stream
//!
//! Emits trip requests at a rate shaped by time-of-day, day-of-week and
//! rush-hour patterns. Requests go to stdout (or a JSONL file); logs go to
//! stderr.
//!
//! Module structure:
//! - `domain/` - Core types (Zone, Stop, TripRequest)
//! - `io/` - Emission sinks (console, JSONL file, channel)
//! - `services/` - Stop registry, temporal patterns, generator loop
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::Parser;
use demand_generator::infra::Config;
use demand_generator::io::build_sink;
use demand_generator::services::DemandGenerator;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// How often the controller checks whether the worker has exited
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Demand generator - streams synthetic trip requests
#[derive(Parser, Debug)]
#[command(name = "demand-generator", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/demand.toml")]
    config: String,

    /// Stop after this many generation ticks (default: run until Ctrl+C)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Emit logs as JSON objects instead of plain text
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Default: INFO, use RUST_LOG=debug for per-tick visibility.
    // stdout carries the trip stream, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let logs = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);
    if args.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        git_hash = %env!("GIT_HASH"),
        "demand-generator starting"
    );

    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    info!(
        config_file = %config.config_file(),
        rate_per_tick = %config.rate_per_tick(),
        tick_interval_ms = %config.tick_interval_ms(),
        output_format = %config.output_format().as_str(),
        output_file = %config.output_file().unwrap_or("stdout"),
        burst_enabled = %config.burst_enabled(),
        seed = ?config.seed(),
        zones = ?config.zone_ids(),
        default_catalog = %config.default_catalog(),
        "config_loaded"
    );

    let sink = build_sink(&config).context("failed to open output sink")?;
    let generator = DemandGenerator::new(&config, sink);

    // Metrics reporter
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let metrics = generator.metrics().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
            // First tick fires immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => metrics.report().log(),
                }
            }
        });
    }

    match args.ticks {
        Some(ticks) => generator.start_for_ticks(ticks),
        None => generator.start(),
    };
    wait_for_exit(&generator, args.ticks).await;

    let _ = shutdown_tx.send(true);
    let result = generator.stop().await;
    generator.metrics().report().log();
    result.context("trip generation halted")?;

    info!("demand-generator shutdown complete");
    Ok(())
}

/// Block until Ctrl+C or until the worker exits on its own (tick limit
/// reached, or halted by an emission failure)
async fn wait_for_exit(generator: &DemandGenerator, tick_limit: Option<u64>) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown_signal_received");
                return;
            }
            _ = poll.tick() => {
                if generator.is_running() {
                    continue;
                }
                let ticks = generator.metrics().ticks_total();
                match tick_limit {
                    Some(limit) if ticks >= limit => info!(ticks = %ticks, "tick_limit_reached"),
                    _ => warn!(ticks = %ticks, "generator_halted"),
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_json_flag_parses() {
        let args = Args::try_parse_from(["demand-generator", "--log-json", "--ticks", "5"]).unwrap();
        assert!(args.log_json);
        assert_eq!(args.ticks, Some(5));
        assert_eq!(args.config, "config/demand.toml");

        let args = Args::try_parse_from(["demand-generator"]).unwrap();
        assert!(!args.log_json);
        assert_eq!(args.ticks, None);
    }
}
