//! Security analytics snapshot

use chrono::NaiveDateTime;
use serde::Deserialize;

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Single login attempt recorded by the backend
///
/// Geolocation is resolved server-side and any part of it may be missing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginAttempt {
    /// UTC time of the attempt
    pub timestamp: NaiveDateTime,
    pub ip_address: String,
    pub success: bool,
    /// Human readable location
    pub location: Option<String>,
    pub device_info: Option<String>,
    pub browser_info: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Geolocation accuracy in kilometers
    pub accuracy_radius: Option<u32>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub connection_type: Option<String>,
}

impl LoginAttempt {
    /// Position of the attempt, only if both coordinates are known
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.latitude?, self.longitude?))
    }
}

/// Pre-aggregated point on the time axis
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HourlyBucket {
    /// Hour label, eg. `13:00`
    pub hour: String,
    pub successful: u64,
    pub failed: u64,
}

/// One complete reading of the analytics data
///
/// Counts are taken as reported - `successful + failed` is not required to match `total`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyticsSnapshot {
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,
    /// Most recent first
    #[serde(default)]
    pub recent_attempts: Vec<LoginAttempt>,
    /// Chronological
    #[serde(default)]
    pub hourly_attempts: Vec<HourlyBucket>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{Value, json};

    /// Attempt with only the fields the backend always sends
    pub(crate) fn attempt(ip: &str, success: bool, position: Option<(f64, f64)>) -> LoginAttempt {
        LoginAttempt {
            timestamp: "2024-05-01T12:30:45".parse().unwrap(),
            ip_address: ip.to_owned(),
            success,
            location: None,
            device_info: Some("Linux".to_owned()),
            browser_info: None,
            latitude: position.map(|(lat, _)| lat),
            longitude: position.map(|(_, lng)| lng),
            accuracy_radius: None,
            city: None,
            country: None,
            timezone: None,
            isp: None,
            connection_type: None,
        }
    }

    pub(crate) fn snapshot_json() -> Value {
        json!({
            "total_attempts": 10,
            "successful_attempts": 7,
            "failed_attempts": 3,
            "recent_attempts": [
                {
                    "ip_address": "203.0.113.7",
                    "timestamp": "2024-05-01T12:30:45.123456",
                    "success": true,
                    "location": "New York, United States",
                    "device_info": "Windows",
                    "latitude": 40.7,
                    "longitude": -74.0
                },
                {
                    "ip_address": "198.51.100.1",
                    "timestamp": "2024-05-01T11:00:00",
                    "success": false,
                    "location": null,
                    "device_info": null,
                    "latitude": null,
                    "longitude": null
                }
            ],
            "hourly_attempts": [
                { "hour": "11:00", "successful": 0, "failed": 1 },
                { "hour": "12:00", "successful": 1, "failed": 0 }
            ]
        })
    }

    #[test]
    fn backend_payload() {
        let snapshot: AnalyticsSnapshot = serde_json::from_value(snapshot_json()).unwrap();

        assert_eq!(snapshot.total_attempts, 10);
        assert_eq!(snapshot.successful_attempts, 7);
        assert_eq!(snapshot.failed_attempts, 3);
        assert_eq!(snapshot.recent_attempts.len(), 2);
        assert_eq!(snapshot.hourly_attempts[1].hour, "12:00");

        let first = &snapshot.recent_attempts[0];
        assert_eq!(first.coordinates(), Some(Coordinates::new(40.7, -74.0)));
        assert_eq!(first.location.as_deref(), Some("New York, United States"));
        assert_eq!(first.city, None);

        let second = &snapshot.recent_attempts[1];
        assert_eq!(second.coordinates(), None);
        assert_eq!(second.device_info, None);
    }

    #[test]
    fn inconsistent_counts_are_kept() {
        let snapshot: AnalyticsSnapshot = serde_json::from_value(json!({
            "total_attempts": 5,
            "successful_attempts": 4,
            "failed_attempts": 4
        }))
        .unwrap();

        assert_eq!(snapshot.total_attempts, 5);
        assert_eq!(snapshot.successful_attempts + snapshot.failed_attempts, 8);
        assert!(snapshot.recent_attempts.is_empty());
        assert!(snapshot.hourly_attempts.is_empty());
    }

    #[test]
    fn half_known_position_is_no_position() {
        let mut half = attempt("10.0.0.1", true, Some((1.0, 2.0)));
        half.longitude = None;
        assert_eq!(half.coordinates(), None);

        // Equator and the prime meridian are perfectly valid
        let origin = attempt("10.0.0.1", true, Some((0.0, 0.0)));
        assert_eq!(origin.coordinates(), Some(Coordinates::new(0.0, 0.0)));
    }
}
