/// Configuration for the segmentation engine with tunable thresholds.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Pre-roll and post-roll around an instant/voice selection
    pub window_ms: u64,

    /// Uncovered spans longer than this become default intervals at session end;
    /// shorter ones stay uncovered
    pub gap_threshold_ms: u64,

    /// Native device motion rate the decimation ratio is computed from
    pub native_rate_hz: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            window_ms: 5_000,
            gap_threshold_ms: 1_000,
            native_rate_hz: 30.0,
        }
    }
}
