use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::moment::{format_elapsed, Moment};
use super::sample::Sample;

/// A finalized, labeled, time-bounded slice of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: String,
    pub label: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: String,
    pub absolute_start_time: DateTime<Utc>,
    pub absolute_end_time: DateTime<Utc>,
    pub imu_data: Vec<Sample>,
}

impl Recording {
    /// Builds a recording over `[start, end]`. An `end` before `start` is
    /// collapsed onto `start` so the interval is never inverted.
    pub fn new(label: &str, start: Moment, end: Moment, imu_data: Vec<Sample>) -> Self {
        let end = if end.wall_ms < start.wall_ms { start } else { end };

        Self {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            start_time: format_elapsed(start.elapsed_ms),
            end_time: format_elapsed(end.elapsed_ms),
            duration: format_elapsed(end.elapsed_ms.saturating_sub(start.elapsed_ms)),
            absolute_start_time: wall_to_datetime(start.wall_ms),
            absolute_end_time: wall_to_datetime(end.wall_ms),
            imu_data,
        }
    }

    pub fn start_ms(&self) -> i64 {
        self.absolute_start_time.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.absolute_end_time.timestamp_millis()
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms() - self.start_ms()
    }

    pub fn non_zero_samples(&self) -> usize {
        self.imu_data.iter().filter(|s| !s.is_zero()).count()
    }
}

pub fn wall_to_datetime(wall_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(wall_ms)
        .single()
        .unwrap_or_default()
}
