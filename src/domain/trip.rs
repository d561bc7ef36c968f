//! Trip request data model
//!
//! A `TripRequest` is created once per generated unit and moved into the
//! sink on emission. The JSON form is a flat object with an ISO-8601
//! timestamp, one request per line when streamed.

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lowest passenger count for a generated request
pub const MIN_PASSENGERS: u8 = 1;
/// Highest passenger count for a generated request
pub const MAX_PASSENGERS: u8 = 4;

/// Most urgent priority. Priority is an opaque ordinal: 1 is most urgent, 3 least.
pub const PRIORITY_MOST_URGENT: u8 = 1;
pub const PRIORITY_LEAST_URGENT: u8 = 3;

/// Reason for the trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripPurpose {
    Work,
    Shopping,
    Leisure,
    Medical,
    Education,
}

impl TripPurpose {
    pub const ALL: [TripPurpose; 5] = [
        TripPurpose::Work,
        TripPurpose::Shopping,
        TripPurpose::Leisure,
        TripPurpose::Medical,
        TripPurpose::Education,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TripPurpose::Work => "work",
            TripPurpose::Shopping => "shopping",
            TripPurpose::Leisure => "leisure",
            TripPurpose::Medical => "medical",
            TripPurpose::Education => "education",
        }
    }

    /// Uniform draw over all purposes
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl std::fmt::Display for TripPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synthetic passenger trip request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub id: String,
    pub origin_stop_id: String,
    pub destination_stop_id: String,
    pub timestamp: NaiveDateTime,
    pub passenger_count: u8,
    pub trip_purpose: TripPurpose,
    pub priority: u8,
}

impl TripRequest {
    /// Build a request id of the form `trip_<YYYYMMDD_HHMMSS>_<disambiguator>`
    pub fn make_id(timestamp: &NaiveDateTime, disambiguator: u16) -> String {
        format!("trip_{}_{}", timestamp.format("%Y%m%d_%H%M%S"), disambiguator)
    }

    /// Assemble a request between two stops with randomized attributes.
    ///
    /// The disambiguator is a 4-digit number, so ids generated within the same
    /// second collide only with probability 1/9000 per pair.
    pub fn random<R: Rng + ?Sized>(
        origin_stop_id: &str,
        destination_stop_id: &str,
        timestamp: NaiveDateTime,
        rng: &mut R,
    ) -> Self {
        let disambiguator = rng.gen_range(1000..=9999);
        Self {
            id: Self::make_id(&timestamp, disambiguator),
            origin_stop_id: origin_stop_id.to_string(),
            destination_stop_id: destination_stop_id.to_string(),
            timestamp,
            passenger_count: rng.gen_range(MIN_PASSENGERS..=MAX_PASSENGERS),
            trip_purpose: TripPurpose::sample(rng),
            priority: rng.gen_range(PRIORITY_MOST_URGENT..=PRIORITY_LEAST_URGENT),
        }
    }

    /// Serialize to a single-line JSON document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        format!("Generated trip: {}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 15).unwrap().and_hms_opt(8, 30, 0).unwrap()
    }

    fn sample_request() -> TripRequest {
        TripRequest {
            id: "trip_20230615_083000_1234".to_string(),
            origin_stop_id: "stop_001".to_string(),
            destination_stop_id: "stop_002".to_string(),
            timestamp: ts(),
            passenger_count: 2,
            trip_purpose: TripPurpose::Work,
            priority: 1,
        }
    }

    #[test]
    fn test_make_id_format() {
        assert_eq!(TripRequest::make_id(&ts(), 4321), "trip_20230615_083000_4321");
    }

    #[test]
    fn test_random_request_fields_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let req = TripRequest::random("a", "b", ts(), &mut rng);
            assert!(req.id.starts_with("trip_20230615_083000_"));
            let suffix: u16 = req.id.rsplit('_').next().unwrap().parse().unwrap();
            assert!((1000..=9999).contains(&suffix));
            assert!((1..=4).contains(&req.passenger_count));
            assert!((1..=3).contains(&req.priority));
            assert_eq!(req.timestamp, ts());
        }
    }

    #[test]
    fn test_random_request_covers_all_purposes() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(TripRequest::random("a", "b", ts(), &mut rng).trip_purpose);
        }
        assert_eq!(seen.len(), TripPurpose::ALL.len());
    }

    #[test]
    fn test_json_is_flat_with_iso_timestamp() {
        let json = sample_request().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["id"], "trip_20230615_083000_1234");
        assert_eq!(parsed["origin_stop_id"], "stop_001");
        assert_eq!(parsed["destination_stop_id"], "stop_002");
        assert_eq!(parsed["timestamp"], "2023-06-15T08:30:00");
        assert_eq!(parsed["passenger_count"], 2);
        assert_eq!(parsed["trip_purpose"], "work");
        assert_eq!(parsed["priority"], 1);
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_from_json_reads_encoded_document() {
        let json = r#"{"id":"trip_20230615_083000_1234","origin_stop_id":"stop_001",
            "destination_stop_id":"stop_002","timestamp":"2023-06-15T08:30:00",
            "passenger_count":2,"trip_purpose":"work","priority":1}"#;
        assert_eq!(TripRequest::from_json(json).unwrap(), sample_request());
    }

    #[test]
    fn test_from_json_rejects_unknown_purpose() {
        let json = r#"{"id":"x","origin_stop_id":"a","destination_stop_id":"b",
            "timestamp":"2023-06-15T08:30:00","passenger_count":1,
            "trip_purpose":"tourism","priority":1}"#;
        assert!(TripRequest::from_json(json).is_err());
    }

    #[test]
    fn test_summary_contains_id() {
        assert_eq!(sample_request().summary(), "Generated trip: trip_20230615_083000_1234");
    }
}
