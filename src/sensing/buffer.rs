//! Append-only sample store for one session.
//!
//! Samples arrive in real time, so insertion order is timestamp order. Range
//! queries binary-search the boundaries and copy the slice out; callers own
//! what they get back and the buffer keeps growing underneath.

use crate::models::{RawMotionEvent, Sample};

#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn append_raw(&mut self, event: RawMotionEvent) {
        self.append(Sample::from(event));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn all(&self) -> Vec<Sample> {
        self.samples.clone()
    }

    /// Samples with `start <= timestamp <= end`.
    pub fn range(&self, start: i64, end: i64) -> Vec<Sample> {
        if start > end {
            return Vec::new();
        }
        let lo = self.first_at_or_after(start);
        let hi = self.first_after(end);
        self.slice(lo, hi)
    }

    /// Samples with `start < timestamp < end`.
    pub fn range_exclusive(&self, start: i64, end: i64) -> Vec<Sample> {
        if start >= end {
            return Vec::new();
        }
        let lo = self.first_after(start);
        let hi = self.first_at_or_after(end);
        self.slice(lo, hi)
    }

    /// Samples with `start <= timestamp < end`.
    pub fn range_half_open(&self, start: i64, end: i64) -> Vec<Sample> {
        if start >= end {
            return Vec::new();
        }
        let lo = self.first_at_or_after(start);
        let hi = self.first_at_or_after(end);
        self.slice(lo, hi)
    }

    /// Samples with `start < timestamp <= end`.
    pub fn range_after(&self, start: i64, end: i64) -> Vec<Sample> {
        if start >= end {
            return Vec::new();
        }
        let lo = self.first_after(start);
        let hi = self.first_after(end);
        self.slice(lo, hi)
    }

    /// Samples strictly before `end`.
    pub fn before(&self, end: i64) -> Vec<Sample> {
        let hi = self.first_at_or_after(end);
        self.slice(0, hi)
    }

    /// Samples at or before `end`.
    pub fn up_to(&self, end: i64) -> Vec<Sample> {
        let hi = self.first_after(end);
        self.slice(0, hi)
    }

    fn first_at_or_after(&self, ts: i64) -> usize {
        self.samples.partition_point(|s| s.timestamp < ts)
    }

    fn first_after(&self, ts: i64) -> usize {
        self.samples.partition_point(|s| s.timestamp <= ts)
    }

    fn slice(&self, lo: usize, hi: usize) -> Vec<Sample> {
        if lo >= hi {
            return Vec::new();
        }
        self.samples[lo..hi].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: i64) -> Sample {
        Sample {
            timestamp: ts,
            ax: 1.0,
            ay: 0.0,
            az: 0.0,
            gx: 0.0,
            gy: 0.0,
            gz: 0.0,
        }
    }

    fn buffer(timestamps: &[i64]) -> SampleBuffer {
        let mut buffer = SampleBuffer::new();
        for &ts in timestamps {
            buffer.append(sample(ts));
        }
        buffer
    }

    fn stamps(samples: &[Sample]) -> Vec<i64> {
        samples.iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let buffer = buffer(&[0, 500, 1000, 1500, 2000]);
        assert_eq!(stamps(&buffer.range(500, 1500)), vec![500, 1000, 1500]);
        assert_eq!(stamps(&buffer.range(501, 1499)), vec![1000]);
    }

    #[test]
    fn boundary_variants_include_the_right_edges() {
        let buffer = buffer(&[0, 500, 1000, 1500, 2000]);
        assert_eq!(stamps(&buffer.range_exclusive(500, 1500)), vec![1000]);
        assert_eq!(stamps(&buffer.range_half_open(500, 1500)), vec![500, 1000]);
        assert_eq!(stamps(&buffer.range_after(500, 1500)), vec![1000, 1500]);
        assert_eq!(stamps(&buffer.before(1000)), vec![0, 500]);
        assert_eq!(stamps(&buffer.up_to(1000)), vec![0, 500, 1000]);
    }

    #[test]
    fn empty_and_inverted_windows_return_nothing() {
        let buffer = buffer(&[0, 500, 1000]);
        assert!(buffer.range(5_000, 6_000).is_empty());
        assert!(buffer.range(1000, 0).is_empty());
        assert!(buffer.range_exclusive(500, 500).is_empty());
        assert!(SampleBuffer::new().range(0, 10).is_empty());
    }

    #[test]
    fn duplicate_timestamps_are_all_returned() {
        let buffer = buffer(&[100, 200, 200, 300]);
        assert_eq!(buffer.range(200, 200).len(), 2);
    }

    #[test]
    fn raw_events_are_coerced_on_append() {
        let mut buffer = SampleBuffer::new();
        buffer.append_raw(RawMotionEvent {
            timestamp: 7,
            ..Default::default()
        });
        assert_eq!(buffer.len(), 1);
        assert!(buffer.all()[0].is_zero());
    }
}
