//! Geographic model: zones and the stops that belong to them

use serde::{Deserialize, Serialize};

/// Rough kilometres per degree, used for the planar zone membership test.
/// Not great-circle accurate; good enough for city-scale circles.
const KM_PER_DEGREE: f64 = 111.0;

/// A point in floating point degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A named region with a relative demand weight.
///
/// `radius_km` and `demand_weight` are expected to be positive; configuration
/// loading enforces this, the registry does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub center: Coordinate,
    pub radius_km: f64,
    pub demand_weight: f64,
}

impl Zone {
    pub fn new(id: &str, name: &str, center: Coordinate, radius_km: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            center,
            radius_km,
            demand_weight: 1.0,
        }
    }

    pub fn with_weight(mut self, demand_weight: f64) -> Self {
        self.demand_weight = demand_weight;
        self
    }

    /// Simplified circular boundary check
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let lat_diff = lat - self.center.lat;
        let lon_diff = lon - self.center.lon;
        let distance_km = (lat_diff * lat_diff + lon_diff * lon_diff).sqrt() * KM_PER_DEGREE;
        distance_km <= self.radius_km
    }
}

/// A transit stop, the unit of origin and destination
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub position: Coordinate,
    pub zone_id: String,
    /// Free-form classification (bus, train, metro, ...)
    pub stop_type: String,
}

impl Stop {
    pub fn new(id: &str, name: &str, position: Coordinate, zone_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            position,
            zone_id: zone_id.to_string(),
            stop_type: "bus".to_string(),
        }
    }

    pub fn with_type(mut self, stop_type: &str) -> Self {
        self.stop_type = stop_type.to_string();
        self
    }
}

/// Built-in city layout used when no catalog is configured
pub fn default_zones() -> Vec<Zone> {
    vec![
        Zone::new("downtown", "Downtown", Coordinate::new(40.7589, -73.9851), 2.0).with_weight(3.0),
        Zone::new("midtown", "Midtown", Coordinate::new(40.7505, -73.9934), 1.5).with_weight(2.5),
        Zone::new("uptown", "Uptown", Coordinate::new(40.7831, -73.9712), 2.5).with_weight(1.5),
        Zone::new("suburbs", "Suburbs", Coordinate::new(40.7282, -73.7949), 5.0).with_weight(1.0),
    ]
}

/// Built-in stops, two in each of the busier zones
pub fn default_stops() -> Vec<Stop> {
    vec![
        Stop::new("stop_001", "Main St & 1st Ave", Coordinate::new(40.7589, -73.9851), "downtown"),
        Stop::new("stop_002", "Central Station", Coordinate::new(40.7505, -73.9934), "midtown"),
        Stop::new("stop_003", "Park Plaza", Coordinate::new(40.7831, -73.9712), "uptown"),
        Stop::new("stop_004", "Mall Transit Center", Coordinate::new(40.7282, -73.7949), "suburbs"),
        Stop::new("stop_005", "University Campus", Coordinate::new(40.7614, -73.9776), "downtown"),
        Stop::new("stop_006", "Hospital District", Coordinate::new(40.7505, -73.9834), "midtown"),
    ]
}
