use crate::models::{Moment, Recording};
use crate::segmentation::config::SegmentationConfig;
use crate::sensing::SampleBuffer;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Sorts finalized intervals and fills every uncovered span longer than the
/// configured threshold with a default interval.
///
/// Gap slices exclude the samples sitting on a neighbouring interval's bound so
/// no sample is counted twice: the leading gap is `[start, first)`, inner gaps
/// are `(prev, next)` and the trailing gap is `(last, end]`.
pub fn fill_gaps(
    mut recordings: Vec<Recording>,
    session_start: Moment,
    session_end: Moment,
    buffer: &SampleBuffer,
    default_label: &str,
    config: &SegmentationConfig,
) -> Vec<Recording> {
    if recordings.is_empty() {
        log_info!(
            "no labeled intervals; whole session is {} ({} samples)",
            default_label,
            buffer.len()
        );
        return vec![Recording::new(
            default_label,
            session_start,
            session_end,
            buffer.all(),
        )];
    }

    recordings.sort_by_key(|r| r.start_ms());

    let threshold = config.gap_threshold_ms as i64;
    let mut filled = Vec::with_capacity(recordings.len() * 2 + 1);
    let mut gaps = 0usize;

    let first_start = recordings[0].start_ms();
    if first_start - session_start.wall_ms > threshold {
        filled.push(Recording::new(
            default_label,
            session_start,
            session_start.at_wall(first_start),
            buffer.range_half_open(session_start.wall_ms, first_start),
        ));
        gaps += 1;
    }

    let count = recordings.len();
    let mut iter = recordings.into_iter().peekable();
    let mut last_end = session_start.wall_ms;
    while let Some(recording) = iter.next() {
        let end = recording.end_ms();
        let next_start = iter.peek().map(|next| next.start_ms());
        filled.push(recording);
        last_end = end;

        if let Some(next_start) = next_start {
            if next_start - end > threshold {
                filled.push(Recording::new(
                    default_label,
                    session_start.at_wall(end),
                    session_start.at_wall(next_start),
                    buffer.range_exclusive(end, next_start),
                ));
                gaps += 1;
            }
        }
    }

    if session_end.wall_ms - last_end > threshold {
        filled.push(Recording::new(
            default_label,
            session_start.at_wall(last_end),
            session_end,
            buffer.range_after(last_end, session_end.wall_ms),
        ));
        gaps += 1;
    }

    log_info!(
        "gap filling: {} intervals + {} default gaps = {}",
        count,
        gaps,
        filled.len()
    );

    filled
}
