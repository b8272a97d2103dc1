//! Click-centred timing, shared by instant and voice sessions.
//!
//! A selection at `T` becomes `[T - window, T + window]` once the post-roll has
//! elapsed. If the previously finalized interval ended less than one window
//! before the click, the lower bound is pulled up to that end instead, so the
//! two intervals abut rather than overlap.

use std::collections::HashMap;

use crate::models::{Label, Moment, Recording};

use super::scheduler::{DeferredQueue, PendingKey, ScheduledResolution};
use super::strategy::SegmentContext;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PendingLabel {
    pub label_id: String,
    pub display_name: String,
    pub click: Moment,
}

#[derive(Debug, Default)]
pub struct InstantStrategy {
    pending: HashMap<PendingKey, PendingLabel>,
    queue: DeferredQueue,
}

impl InstantStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_select(
        &mut self,
        label: &Label,
        now: Moment,
        ctx: &mut SegmentContext<'_>,
    ) -> ScheduledResolution {
        let window = ctx.config.window_ms;

        if ctx.recordings.is_empty() && self.pending.is_empty() {
            let end = clamp_to_session(now.earlier(window), ctx.session_start);
            let samples = ctx.buffer.up_to(end.wall_ms);
            log_info!("instant: leading default interval with {} samples", samples.len());
            let name = ctx.default_label_name().to_string();
            ctx.recordings
                .push(Recording::new(&name, ctx.session_start, end, samples));
        }

        let due = now.wall_ms.saturating_add(window as i64);
        let scheduled = self.queue.schedule(&label.id, now.wall_ms, due);
        self.pending.insert(
            scheduled.key.clone(),
            PendingLabel {
                label_id: label.id.clone(),
                display_name: label.display_name.clone(),
                click: now,
            },
        );
        log_info!(
            "instant: {} pending until {} ({} outstanding)",
            label.display_name,
            due,
            self.pending.len()
        );

        scheduled
    }

    pub fn resolve_due(&mut self, now: Moment, ctx: &mut SegmentContext<'_>) -> usize {
        let mut resolved = 0;
        while let Some(scheduled) = self.queue.pop_due(now.wall_ms) {
            if self.resolve(&scheduled.key, None, ctx) {
                resolved += 1;
            }
        }
        resolved
    }

    /// Resolves every outstanding selection, closing the ones whose post-roll
    /// would run past `end` at `end`.
    pub fn flush(&mut self, end: Moment, ctx: &mut SegmentContext<'_>) {
        for scheduled in self.queue.drain() {
            self.resolve(&scheduled.key, Some(end), ctx);
        }
        if !self.pending.is_empty() {
            log_warn!("instant: {} pending labels had no deadline", self.pending.len());
            self.pending.clear();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        self.queue.peek_due()
    }

    fn resolve(
        &mut self,
        key: &PendingKey,
        close_at: Option<Moment>,
        ctx: &mut SegmentContext<'_>,
    ) -> bool {
        let Some(pending) = self.pending.remove(key) else {
            return false;
        };
        let window = ctx.config.window_ms;
        let click = pending.click;

        let mut end = click.later(window);
        if let Some(close_at) = close_at {
            if close_at.wall_ms < end.wall_ms {
                end = close_at;
            }
        }

        let mut start = clamp_to_session(click.earlier(window), ctx.session_start);
        if let Some(previous) = ctx.recordings.last() {
            let previous_end = previous.end_ms();
            if click.wall_ms - previous_end < window as i64 {
                log_info!(
                    "instant: {} merged onto previous interval ({}ms since its end)",
                    pending.display_name,
                    click.wall_ms - previous_end
                );
                start = click.at_wall(previous_end);
            }
        }
        if start.wall_ms > end.wall_ms {
            start = end;
        }

        let samples = ctx.buffer.range(start.wall_ms, end.wall_ms);
        let recording = Recording::new(&pending.display_name, start, end, samples);
        log_info!(
            "instant: {} finalized ({}ms, {} samples, {} non-zero)",
            pending.display_name,
            recording.duration_ms(),
            recording.imu_data.len(),
            recording.non_zero_samples()
        );
        ctx.recordings.push(recording);
        true
    }
}

/// Keeps a bound from reaching back before the session started.
fn clamp_to_session(moment: Moment, session_start: Moment) -> Moment {
    if moment.wall_ms < session_start.wall_ms {
        session_start
    } else {
        moment
    }
}
