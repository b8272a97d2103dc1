//! Session-level data models.
//!
//! `SessionRecord` is the immutable artifact of one recorded drive: metadata plus
//! the finalized, gap-filled recording list. It is what persistence stores and
//! what exporters read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recording::Recording;

pub const UNNAMED_CAR: &str = "Sans nom";

/// How label selections are turned into intervals. Fixed for a whole session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    /// A click marks the centre of a fixed window around the event.
    #[default]
    Instant,
    /// First selection opens an interval, the next one closes it.
    Bounded,
    /// Instant mechanics, selections come from recognized speech.
    Voice,
}

impl TimingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingMode::Instant => "instant",
            TimingMode::Bounded => "bounded",
            TimingMode::Voice => "voice",
        }
    }
}

/// Descriptive metadata attached to a session at start.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default)]
    pub car_name: Option<String>,
    #[serde(default)]
    pub vehicle_name: Option<String>,
    #[serde(default)]
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Creation timestamp in Unix milliseconds.
    pub id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration: String,
    pub car_name: String,
    pub vehicle_name: String,
    pub driver_name: String,
    pub timing_mode: TimingMode,
    pub sampling_frequency_hz: u32,
    pub recordings: Vec<Recording>,
}

impl SessionRecord {
    pub fn sample_count(&self) -> usize {
        self.recordings.iter().map(|r| r.imu_data.len()).sum()
    }
}

/// Lightweight listing row; the recordings stay in storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration: String,
    pub car_name: String,
    pub timing_mode: TimingMode,
    pub recording_count: usize,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id,
            start_date: record.start_date,
            end_date: record.end_date,
            duration: record.duration.clone(),
            car_name: record.car_name.clone(),
            timing_mode: record.timing_mode,
            recording_count: record.recordings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_mode_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&TimingMode::Voice).unwrap(), "\"voice\"");
        let mode: TimingMode = serde_json::from_str("\"bounded\"").unwrap();
        assert_eq!(mode, TimingMode::Bounded);
        assert_eq!(TimingMode::default(), TimingMode::Instant);
    }
}
