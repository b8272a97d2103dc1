use crate::models::{Label, LabelCatalog, Moment, Recording, TimingMode};
use crate::sensing::SampleBuffer;

use super::bounded::BoundedStrategy;
use super::config::SegmentationConfig;
use super::instant::InstantStrategy;
use super::scheduler::ScheduledResolution;

/// Everything a strategy may read, plus the working list it appends to.
pub struct SegmentContext<'a> {
    pub buffer: &'a SampleBuffer,
    pub catalog: &'a LabelCatalog,
    pub config: &'a SegmentationConfig,
    pub session_start: Moment,
    pub recordings: &'a mut Vec<Recording>,
}

impl SegmentContext<'_> {
    pub fn default_label_name(&self) -> &str {
        &self.catalog.default_label().display_name
    }
}

/// The timing mode a session runs with, chosen once at session start.
#[derive(Debug)]
pub enum TimingStrategy {
    Bounded(BoundedStrategy),
    /// Shared by instant and voice sessions.
    Instant(InstantStrategy),
}

impl TimingStrategy {
    pub fn for_mode(mode: TimingMode) -> Self {
        match mode {
            TimingMode::Bounded => TimingStrategy::Bounded(BoundedStrategy::new()),
            TimingMode::Instant | TimingMode::Voice => {
                TimingStrategy::Instant(InstantStrategy::new())
            }
        }
    }

    /// Applies a selection. Returns the deferred resolution the host has to
    /// wake up for, if the strategy created one.
    pub fn on_select(
        &mut self,
        label: &Label,
        now: Moment,
        ctx: &mut SegmentContext<'_>,
    ) -> Option<ScheduledResolution> {
        match self {
            TimingStrategy::Bounded(strategy) => {
                strategy.on_select(label, now, ctx);
                None
            }
            TimingStrategy::Instant(strategy) => Some(strategy.on_select(label, now, ctx)),
        }
    }

    /// Resolves deferred work due at `now`; returns how many intervals it finalized.
    pub fn resolve_due(&mut self, now: Moment, ctx: &mut SegmentContext<'_>) -> usize {
        match self {
            TimingStrategy::Bounded(_) => 0,
            TimingStrategy::Instant(strategy) => strategy.resolve_due(now, ctx),
        }
    }

    /// Closes everything still open or pending at `end`.
    pub fn on_session_end(&mut self, end: Moment, ctx: &mut SegmentContext<'_>) {
        match self {
            TimingStrategy::Bounded(strategy) => strategy.close_all(end, ctx),
            TimingStrategy::Instant(strategy) => strategy.flush(end, ctx),
        }
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        match self {
            TimingStrategy::Bounded(_) => None,
            TimingStrategy::Instant(strategy) => strategy.next_due_ms(),
        }
    }

    /// Labels currently open (bounded) or awaiting resolution (instant/voice).
    pub fn outstanding(&self) -> usize {
        match self {
            TimingStrategy::Bounded(strategy) => strategy.open_count(),
            TimingStrategy::Instant(strategy) => strategy.pending_count(),
        }
    }
}
