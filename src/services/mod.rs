//! Services - generation logic and shared state
//!
//! - `stop_registry` - Zones and stops, weighted stop sampling
//! - `temporal` - Demand-rate patterns and their composition
//! - `generator` - Background generation loop

pub mod generator;
pub mod stop_registry;
pub mod temporal;

// Re-export commonly used types
pub use generator::DemandGenerator;
pub use stop_registry::StopRegistry;
pub use temporal::TemporalPatternEngine;
