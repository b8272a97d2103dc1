//! Toggle-to-open/close timing.
//!
//! One label is open at a time. Selecting it again closes it; selecting another
//! label closes the open one and opens the new one at the same instant.

use std::collections::BTreeMap;

use crate::models::{Label, Moment, Recording};

use super::strategy::SegmentContext;

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLabel {
    pub display_name: String,
    pub opened_at: Moment,
}

#[derive(Debug, Default)]
pub struct BoundedStrategy {
    active: BTreeMap<String, ActiveLabel>,
}

impl BoundedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_select(&mut self, label: &Label, now: Moment, ctx: &mut SegmentContext<'_>) {
        if ctx.recordings.is_empty() && self.active.is_empty() {
            let samples = ctx.buffer.before(now.wall_ms);
            log_info!("bounded: leading default interval with {} samples", samples.len());
            let name = ctx.default_label_name().to_string();
            ctx.recordings
                .push(Recording::new(&name, ctx.session_start, now, samples));
        }

        if let Some(active) = self.active.remove(&label.id) {
            finalize(&active, now, ctx);
            self.active.clear();
            return;
        }

        for active in std::mem::take(&mut self.active).into_values() {
            finalize(&active, now, ctx);
        }

        log_info!("bounded: {} opened", label.display_name);
        self.active.insert(
            label.id.clone(),
            ActiveLabel {
                display_name: label.display_name.clone(),
                opened_at: now,
            },
        );
    }

    pub fn close_all(&mut self, end: Moment, ctx: &mut SegmentContext<'_>) {
        for active in std::mem::take(&mut self.active).into_values() {
            finalize(&active, end, ctx);
        }
    }

    pub fn open_count(&self) -> usize {
        self.active.len()
    }

    pub fn active(&self) -> impl Iterator<Item = (&String, &ActiveLabel)> {
        self.active.iter()
    }
}

fn finalize(active: &ActiveLabel, end: Moment, ctx: &mut SegmentContext<'_>) {
    let samples = ctx.buffer.range(active.opened_at.wall_ms, end.wall_ms);
    let recording = Recording::new(&active.display_name, active.opened_at, end, samples);
    log_info!(
        "bounded: {} closed ({} samples, {} non-zero)",
        active.display_name,
        recording.imu_data.len(),
        recording.non_zero_samples()
    );
    ctx.recordings.push(recording);
}
