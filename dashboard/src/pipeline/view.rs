//! View state derived from analytics snapshots

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::client::ErrorKind;
use crate::model::{AnalyticsSnapshot, Coordinates, HourlyBucket, LoginAttempt};

/// Whole-globe zoom level used until any attempt position is known
pub const WIDE_ZOOM: u8 = 2;

/// Zoom level once the map is centred on an attempt
pub const NARROWED_ZOOM: u8 = 4;

/// Map viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapViewState {
    pub center: Coordinates,
    pub zoom: u8,
}

impl Default for MapViewState {
    fn default() -> Self {
        Self {
            center: Coordinates::new(0.0, 0.0),
            zoom: WIDE_ZOOM,
        }
    }
}

impl MapViewState {
    pub fn is_narrowed(&self) -> bool {
        self.zoom == NARROWED_ZOOM
    }

    /// Centres the map on the most recent geolocated attempt
    ///
    /// Happens only once - a narrowed map is never moved or widened again. Returns whether the
    /// viewport changed.
    pub fn observe(&mut self, attempts: &[LoginAttempt]) -> bool {
        if self.is_narrowed() {
            return false;
        }

        let Some(center) = attempts.iter().find_map(LoginAttempt::coordinates) else {
            return false;
        };

        self.center = center;
        self.zoom = NARROWED_ZOOM;
        true
    }
}

/// Single point of the attempts chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPoint {
    pub hour: String,
    pub successful: u64,
    pub failed: u64,
}

/// Chart series, one point per bucket in the order the buckets came
pub fn chart_series(buckets: &[HourlyBucket]) -> Vec<SeriesPoint> {
    buckets
        .iter()
        .map(|bucket| SeriesPoint {
            hour: bucket.hour.clone(),
            successful: bucket.successful,
            failed: bucket.failed,
        })
        .collect()
}

/// Attempt pinned on the map
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub position: Coordinates,
    pub ip_address: String,
    pub timestamp: NaiveDateTime,
    pub success: bool,
    pub device_info: Option<String>,
}

/// Markers for every attempt with known position
pub fn markers(attempts: &[LoginAttempt]) -> Vec<MapMarker> {
    attempts
        .iter()
        .filter_map(|attempt| {
            Some(MapMarker {
                position: attempt.coordinates()?,
                ip_address: attempt.ip_address.clone(),
                timestamp: attempt.timestamp,
                success: attempt.success,
                device_info: attempt.device_info.clone(),
            })
        })
        .collect()
}

/// Everything the analytics panel renders
#[derive(Debug, Clone, Default)]
pub struct AnalyticsView {
    /// Last accepted snapshot
    pub snapshot: Option<Arc<AnalyticsSnapshot>>,
    pub map: MapViewState,
    pub series: Vec<SeriesPoint>,
    pub markers: Vec<MapMarker>,
    /// Failure of the most recent poll, cleared by the next successful one
    pub last_error: Option<ErrorKind>,
    /// When the current snapshot was accepted
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl AnalyticsView {
    /// Replaces the snapshot and recomputes everything derived from it
    pub(super) fn accept(&mut self, snapshot: AnalyticsSnapshot) {
        self.map.observe(&snapshot.recent_attempts);
        self.series = chart_series(&snapshot.hourly_attempts);
        self.markers = markers(&snapshot.recent_attempts);
        self.snapshot = Some(Arc::new(snapshot));
        self.last_error = None;
        self.refreshed_at = Some(Utc::now());
    }

    /// Records failed poll, keeping the last good state
    pub(super) fn fail(&mut self, error: ErrorKind) {
        self.last_error = Some(error);
    }
}
