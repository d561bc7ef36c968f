//! Domain models - geography and trip requests
//!
//! This module contains the canonical data types used throughout the system:
//! - `Zone` / `Stop` / `Coordinate` - the city catalog
//! - `TripRequest` - one synthetic rider request
//! - `TripPurpose` - classification of why the trip is taken

pub mod geo;
pub mod trip;

// Re-export commonly used types at module level
pub use geo::{Coordinate, Stop, Zone};
pub use trip::{TripPurpose, TripRequest};
