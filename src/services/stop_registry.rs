//! Stop registry - catalog of zones and stops with weighted sampling
//!
//! Populated once at startup and read by the generator on every tick. Writers
//! (`add_stop`, `add_zone`, `replace_zone`) may run concurrently with a live
//! generator; the catalog sits behind a reader-writer lock.
//!
//! Weighted sampling: each stop carries `max(1, round(zone_weight * 10))`
//! integer entries, so weight differences of 0.1 are distinguishable and a
//! very light zone never drops out of the pool. Selection is a binary search
//! over cumulative entry counts, which yields the same probabilities as
//! replicating each stop into a flat list.

use crate::domain::geo::{default_stops, default_zones, Stop, Zone};
use parking_lot::RwLock;
use rand::Rng;
use tracing::debug;

/// Integer scale applied to zone weights before rounding
const WEIGHT_SCALE: f64 = 10.0;

/// Per-stop cap on pool entries; keeps the cumulative total far from `u64::MAX`
const MAX_POOL_ENTRIES: u64 = u32::MAX as u64;

/// Weight assumed for a stop whose zone is not in the registry
const UNKNOWN_ZONE_WEIGHT: f64 = 1.0;

#[derive(Debug, Default)]
struct Catalog {
    zones: Vec<Zone>,
    stops: Vec<Stop>,
}

impl Catalog {
    /// Demand weight of a zone id; the most recently added zone wins on duplicates
    fn zone_weight(&self, zone_id: &str) -> f64 {
        self.zones
            .iter()
            .rev()
            .find(|z| z.id == zone_id)
            .map(|z| z.demand_weight)
            .unwrap_or(UNKNOWN_ZONE_WEIGHT)
    }
}

/// Pool entries contributed by one stop. Never zero, never above `MAX_POOL_ENTRIES`.
#[inline]
fn pool_entries(zone_weight: f64) -> u64 {
    let scaled = (zone_weight * WEIGHT_SCALE).round();
    if scaled >= MAX_POOL_ENTRIES as f64 {
        MAX_POOL_ENTRIES
    } else if scaled >= 1.0 {
        scaled as u64
    } else {
        // Also covers NaN
        1
    }
}

#[derive(Debug, Default)]
pub struct StopRegistry {
    catalog: RwLock<Catalog>,
}

impl StopRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in city layout (4 zones, 6 stops)
    pub fn with_default_catalog() -> Self {
        let registry = Self::new();
        for zone in default_zones() {
            registry.add_zone(zone);
        }
        for stop in default_stops() {
            registry.add_stop(stop);
        }
        registry
    }

    /// Stops whose zone id matches, in insertion order. Unknown zones yield an empty list.
    pub fn stops_in_zone(&self, zone_id: &str) -> Vec<Stop> {
        self.catalog.read().stops.iter().filter(|s| s.zone_id == zone_id).cloned().collect()
    }

    /// Pick a stop with probability proportional to its zone's demand weight.
    ///
    /// Returns `None` only when the registry holds no stops.
    pub fn random_stop<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Stop> {
        let catalog = self.catalog.read();
        if catalog.stops.is_empty() {
            return None;
        }

        let mut cumulative = Vec::with_capacity(catalog.stops.len());
        let mut total = 0u64;
        for stop in &catalog.stops {
            total = total.saturating_add(pool_entries(catalog.zone_weight(&stop.zone_id)));
            cumulative.push(total);
        }

        let r = rng.gen_range(0..total);
        let idx = cumulative.partition_point(|&c| c <= r);
        catalog.stops.get(idx).cloned()
    }

    /// Append a stop. Duplicate ids and unknown zone ids are accepted.
    pub fn add_stop(&self, stop: Stop) {
        debug!(stop_id = %stop.id, zone_id = %stop.zone_id, "stop_added");
        self.catalog.write().stops.push(stop);
    }

    /// Append a zone. Duplicate ids are accepted; the last one added drives weighting.
    pub fn add_zone(&self, zone: Zone) {
        debug!(zone_id = %zone.id, weight = %zone.demand_weight, "zone_added");
        self.catalog.write().zones.push(zone);
    }

    /// Replace every zone with the same id. Returns false if none existed.
    pub fn replace_zone(&self, zone: Zone) -> bool {
        let mut catalog = self.catalog.write();
        let mut replaced = false;
        for existing in catalog.zones.iter_mut().filter(|z| z.id == zone.id) {
            *existing = zone.clone();
            replaced = true;
        }
        if replaced {
            debug!(zone_id = %zone.id, weight = %zone.demand_weight, "zone_replaced");
        }
        replaced
    }

    pub fn zone(&self, zone_id: &str) -> Option<Zone> {
        self.catalog.read().zones.iter().rev().find(|z| z.id == zone_id).cloned()
    }

    /// Zones whose circular boundary contains the point
    pub fn zones_containing(&self, lat: f64, lon: f64) -> Vec<Zone> {
        self.catalog.read().zones.iter().filter(|z| z.contains(lat, lon)).cloned().collect()
    }

    pub fn zones(&self) -> Vec<Zone> {
        self.catalog.read().zones.clone()
    }

    pub fn stops(&self) -> Vec<Stop> {
        self.catalog.read().stops.clone()
    }

    pub fn zone_count(&self) -> usize {
        self.catalog.read().zones.len()
    }

    pub fn stop_count(&self) -> usize {
        self.catalog.read().stops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geo::Coordinate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn point() -> Coordinate {
        Coordinate::new(40.0, -73.0)
    }

    #[test]
    fn test_default_catalog_counts() {
        let registry = StopRegistry::with_default_catalog();
        assert_eq!(registry.zone_count(), 4);
        assert_eq!(registry.stop_count(), 6);
        assert_eq!(registry.zone("downtown").unwrap().demand_weight, 3.0);
    }

    #[test]
    fn test_stops_in_zone_filters_and_keeps_order() {
        let registry = StopRegistry::with_default_catalog();
        let ids: Vec<String> =
            registry.stops_in_zone("downtown").into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["stop_001", "stop_005"]);
        assert!(registry.stops_in_zone("midtown").iter().all(|s| s.zone_id == "midtown"));
    }

    #[test]
    fn test_stops_in_unknown_zone_is_empty() {
        let registry = StopRegistry::with_default_catalog();
        assert!(registry.stops_in_zone("atlantis").is_empty());
    }

    #[test]
    fn test_stops_in_zone_without_stops_is_empty() {
        let registry = StopRegistry::new();
        registry.add_zone(Zone::new("empty", "Empty", point(), 1.0));
        assert!(registry.stops_in_zone("empty").is_empty());
    }

    #[test]
    fn test_random_stop_on_empty_registry_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(StopRegistry::new().random_stop(&mut rng).is_none());
    }

    #[test]
    fn test_random_stop_returns_member() {
        let registry = StopRegistry::with_default_catalog();
        let ids: Vec<String> = registry.stops().into_iter().map(|s| s.id).collect();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let stop = registry.random_stop(&mut rng).unwrap();
            assert!(ids.contains(&stop.id));
        }
    }

    #[test]
    fn test_random_stop_tiny_weight_still_selectable() {
        let registry = StopRegistry::new();
        registry.add_zone(Zone::new("tiny", "Tiny", point(), 1.0).with_weight(0.01));
        registry.add_stop(Stop::new("only", "Only", point(), "tiny"));
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(registry.random_stop(&mut rng).unwrap().id, "only");
    }

    #[test]
    fn test_random_stop_follows_zone_weights() {
        let registry = StopRegistry::new();
        registry.add_zone(Zone::new("heavy", "Heavy", point(), 1.0).with_weight(3.0));
        registry.add_zone(Zone::new("light", "Light", point(), 1.0).with_weight(1.0));
        registry.add_stop(Stop::new("h", "H", point(), "heavy"));
        registry.add_stop(Stop::new("l", "L", point(), "light"));

        let mut rng = StdRng::seed_from_u64(4);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let n = 40_000;
        for _ in 0..n {
            *counts.entry(registry.random_stop(&mut rng).unwrap().id).or_default() += 1;
        }
        // Expected 30 : 10 entries -> 0.75
        let heavy_share = counts["h"] as f64 / n as f64;
        assert!((heavy_share - 0.75).abs() < 0.02, "heavy share {}", heavy_share);
    }

    #[test]
    fn test_random_stop_with_unknown_zone_uses_unit_weight() {
        let registry = StopRegistry::new();
        registry.add_zone(Zone::new("known", "Known", point(), 1.0).with_weight(1.0));
        registry.add_stop(Stop::new("k", "K", point(), "known"));
        registry.add_stop(Stop::new("orphan", "Orphan", point(), "nowhere"));

        let mut rng = StdRng::seed_from_u64(5);
        let n = 20_000;
        let orphans =
            (0..n).filter(|_| registry.random_stop(&mut rng).unwrap().id == "orphan").count();
        let share = orphans as f64 / n as f64;
        assert!((share - 0.5).abs() < 0.03, "orphan share {}", share);
    }

    #[test]
    fn test_add_accepts_duplicates() {
        let registry = StopRegistry::new();
        registry.add_stop(Stop::new("dup", "A", point(), "z"));
        registry.add_stop(Stop::new("dup", "B", point(), "z"));
        assert_eq!(registry.stops_in_zone("z").len(), 2);
    }

    #[test]
    fn test_latest_duplicate_zone_drives_lookup() {
        let registry = StopRegistry::new();
        registry.add_zone(Zone::new("z", "First", point(), 1.0).with_weight(1.0));
        registry.add_zone(Zone::new("z", "Second", point(), 1.0).with_weight(2.0));
        assert_eq!(registry.zone("z").unwrap().name, "Second");
    }

    #[test]
    fn test_replace_zone() {
        let registry = StopRegistry::with_default_catalog();
        let updated = Zone::new("suburbs", "Outer Suburbs", point(), 8.0).with_weight(0.5);
        assert!(registry.replace_zone(updated));
        let zone = registry.zone("suburbs").unwrap();
        assert_eq!(zone.name, "Outer Suburbs");
        assert_eq!(zone.demand_weight, 0.5);
        assert_eq!(registry.zone_count(), 4);

        assert!(!registry.replace_zone(Zone::new("atlantis", "Atlantis", point(), 1.0)));
        assert_eq!(registry.zone_count(), 4);
    }

    #[test]
    fn test_zones_containing() {
        let registry = StopRegistry::with_default_catalog();
        let ids: Vec<String> =
            registry.zones_containing(40.7282, -73.7949).into_iter().map(|z| z.id).collect();
        assert_eq!(ids, vec!["suburbs"]);
    }

    #[test]
    fn test_pool_entries_never_zero() {
        assert_eq!(pool_entries(0.0), 1);
        assert_eq!(pool_entries(0.04), 1);
        assert_eq!(pool_entries(0.16), 2);
        assert_eq!(pool_entries(2.5), 25);
        assert_eq!(pool_entries(f64::NAN), 1);
    }

    #[test]
    fn test_pool_entries_capped() {
        assert_eq!(pool_entries(1e18), MAX_POOL_ENTRIES);
        assert_eq!(pool_entries(f64::INFINITY), MAX_POOL_ENTRIES);
        assert_eq!(pool_entries(f64::MAX), MAX_POOL_ENTRIES);
    }

    #[test]
    fn test_random_stop_with_huge_weights() {
        let registry = StopRegistry::new();
        registry.add_zone(Zone::new("huge", "Huge", point(), 1.0).with_weight(1e18));
        registry.add_zone(Zone::new("unit", "Unit", point(), 1.0).with_weight(1.0));
        registry.add_stop(Stop::new("a", "A", point(), "huge"));
        registry.add_stop(Stop::new("b", "B", point(), "huge"));
        registry.add_stop(Stop::new("c", "C", point(), "unit"));

        let mut rng = StdRng::seed_from_u64(6);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..2000 {
            *counts.entry(registry.random_stop(&mut rng).unwrap().id).or_default() += 1;
        }
        // Both heavy stops share the pool evenly; the unit stop is negligible
        assert!(counts["a"] > 800 && counts["b"] > 800, "counts {:?}", counts);
        assert!(counts.get("c").copied().unwrap_or(0) < 5);
    }
}
