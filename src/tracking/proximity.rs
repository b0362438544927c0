use chrono::{DateTime, Utc};

use super::types::{LastCommittedFix, TrackedFix, TrackedRecord};
use crate::geometry::haversine_m;
use crate::settings::TrackingSettings;

pub const MIN_DISTANCE_THRESHOLD_M: f64 = 10.0;
pub const MAX_DISTANCE_THRESHOLD_M: f64 = 100.0;

/// Decides which fixes are worth keeping and queues them for the next flush.
///
/// A fix is committed when it is the first one, when `min_interval_ms` has
/// passed since the last commit, or when it lies at least
/// `distance_threshold_m` from the last committed position.
#[derive(Debug)]
pub struct ProximityTracker {
    employee_id: String,
    min_interval_ms: i64,
    distance_threshold_m: f64,
    last: LastCommittedFix,
    queue: Vec<TrackedRecord>,
}

impl ProximityTracker {
    pub fn new(settings: &TrackingSettings) -> Self {
        let distance_threshold_m = if settings.distance_threshold_m.is_nan() {
            MAX_DISTANCE_THRESHOLD_M
        } else {
            settings
                .distance_threshold_m
                .clamp(MIN_DISTANCE_THRESHOLD_M, MAX_DISTANCE_THRESHOLD_M)
        };
        Self {
            employee_id: settings.employee_id.clone(),
            min_interval_ms: i64::try_from(settings.min_interval_ms).unwrap_or(i64::MAX),
            distance_threshold_m,
            last: LastCommittedFix::default(),
            queue: Vec::new(),
        }
    }

    pub fn distance_threshold_m(&self) -> f64 {
        self.distance_threshold_m
    }

    pub fn last_committed(&self) -> LastCommittedFix {
        self.last
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Offers a fix observed at `now_ms`. Returns whether it was committed.
    pub fn offer(&mut self, fix: &TrackedFix, now_ms: i64) -> bool {
        let first = self.last.timestamp_ms == 0;
        let elapsed = now_ms.saturating_sub(self.last.timestamp_ms);
        let moved = haversine_m(self.last.point(), fix.point());

        if !(first || elapsed >= self.min_interval_ms || moved >= self.distance_threshold_m) {
            return false;
        }

        self.queue.push(TrackedRecord {
            employee_id: self.employee_id.clone(),
            lat: fix.lat,
            lon: fix.lon,
            accuracy: fix.accuracy,
            heading: fix.heading,
            speed: fix.speed,
            recorded_at: DateTime::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now),
            is_active: true,
        });
        self.last = LastCommittedFix {
            timestamp_ms: now_ms,
            lat: fix.lat,
            lon: fix.lon,
        };
        log::debug!(
            "Committed fix {:.6},{:.6} ({:.1} m, {} ms since last)",
            fix.lat,
            fix.lon,
            moved,
            elapsed
        );
        true
    }

    /// Takes every queued record, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<TrackedRecord> {
        std::mem::take(&mut self.queue)
    }
}
