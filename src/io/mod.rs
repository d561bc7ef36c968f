//! IO modules - where generated requests go
//!
//! - `sink` - `TripSink` trait, console sink, emission errors
//! - `egress` - Trip output to file (JSONL format)
//! - `egress_channel` - Typed channel for in-process consumers

pub mod egress;
pub mod egress_channel;
pub mod sink;

// Re-export commonly used types
pub use egress::JsonlFileSink;
pub use egress_channel::{create_trip_channel, ChannelSink};
pub use sink::{build_sink, ConsoleSink, EmissionError, EmissionFailure, TripSink};
