//! IMU sample models.
//!
//! `RawMotionEvent` is what the device motion source hands over; `Sample` is what
//! the engine keeps. The conversion never rejects input: flaky hardware reports
//! missing axes and those become zero so every retained event still counts.

use serde::{Deserialize, Serialize};

/// One timestamped 6-axis reading (accelerometer + gyroscope).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
}

impl Sample {
    pub fn is_zero(&self) -> bool {
        self.ax == 0.0
            && self.ay == 0.0
            && self.az == 0.0
            && self.gx == 0.0
            && self.gy == 0.0
            && self.gz == 0.0
    }
}

/// A device motion event as delivered by the sensor source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMotionEvent {
    pub timestamp: i64,
    #[serde(default)]
    pub ax: Option<f64>,
    #[serde(default)]
    pub ay: Option<f64>,
    #[serde(default)]
    pub az: Option<f64>,
    #[serde(default)]
    pub gx: Option<f64>,
    #[serde(default)]
    pub gy: Option<f64>,
    #[serde(default)]
    pub gz: Option<f64>,
}

impl From<RawMotionEvent> for Sample {
    fn from(event: RawMotionEvent) -> Self {
        Sample {
            timestamp: event.timestamp,
            ax: axis(event.ax),
            ay: axis(event.ay),
            az: axis(event.az),
            gx: axis(event.gx),
            gy: axis(event.gy),
            gz: axis(event.gz),
        }
    }
}

/// Missing or non-finite readings become 0; the rest keep two decimals.
fn axis(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => (v * 100.0).round() / 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_axes_are_coerced_to_zero() {
        let raw = RawMotionEvent {
            timestamp: 42,
            ax: Some(1.234),
            ay: None,
            az: Some(f64::NAN),
            gx: None,
            gy: Some(-0.456),
            gz: None,
        };
        let sample = Sample::from(raw);
        assert_eq!(sample.timestamp, 42);
        assert_eq!(sample.ax, 1.23);
        assert_eq!(sample.ay, 0.0);
        assert_eq!(sample.az, 0.0);
        assert_eq!(sample.gy, -0.46);
        assert!(!sample.is_zero());
    }

    #[test]
    fn raw_event_deserializes_with_absent_fields() {
        let raw: RawMotionEvent = serde_json::from_str(r#"{"timestamp": 10, "ax": null}"#).unwrap();
        assert!(Sample::from(raw).is_zero());
    }
}
