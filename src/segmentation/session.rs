//! The labeling session: the single owner of everything a running drive
//! accumulates.
//!
//! Sample ingestion, label selection, deferred resolution and finalization are
//! all method calls on this object, taking the current `Moment` explicitly. The
//! async host serializes access; the session itself holds no clock and spawns
//! nothing, so it can be driven deterministically.

use crate::models::{
    format_elapsed, LabelCatalog, Moment, RawMotionEvent, Recording, SessionMetadata,
    SessionRecord, TimingMode, UNNAMED_CAR,
};
use crate::models::recording::wall_to_datetime;
use crate::sensing::{Decimator, SampleBuffer};

use super::config::SegmentationConfig;
use super::finalizer::fill_gaps;
use super::scheduler::ScheduledResolution;
use super::strategy::{SegmentContext, TimingStrategy};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// What a label selection did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Session not running or label unknown.
    Ignored,
    /// Applied synchronously (bounded mode).
    Applied,
    /// Registered as pending; the host must call `resolve_due` at the deadline.
    Scheduled(ScheduledResolution),
}

#[derive(Debug)]
pub struct LabelingSession {
    mode: TimingMode,
    strategy: TimingStrategy,
    catalog: LabelCatalog,
    config: SegmentationConfig,
    buffer: SampleBuffer,
    decimator: Decimator,
    recordings: Vec<Recording>,
    started: Moment,
    running: bool,
    sampling_frequency_hz: u32,
    metadata: SessionMetadata,
}

impl LabelingSession {
    pub fn start(
        mode: TimingMode,
        started: Moment,
        sampling_frequency_hz: u32,
        metadata: SessionMetadata,
        catalog: LabelCatalog,
        config: SegmentationConfig,
    ) -> Self {
        let decimator = Decimator::new(config.native_rate_hz, sampling_frequency_hz);
        log_info!(
            "session started: mode={} target={}Hz ratio=1/{} (native {}Hz)",
            mode.as_str(),
            sampling_frequency_hz,
            decimator.ratio(),
            config.native_rate_hz
        );

        Self {
            mode,
            strategy: TimingStrategy::for_mode(mode),
            catalog,
            config,
            buffer: SampleBuffer::new(),
            decimator,
            recordings: Vec::new(),
            started,
            running: true,
            sampling_frequency_hz,
            metadata,
        }
    }

    /// Feeds one native motion event through decimation. Returns whether it was kept.
    pub fn ingest(&mut self, event: RawMotionEvent) -> bool {
        if !self.running {
            return false;
        }
        if !self.decimator.accept() {
            return false;
        }
        self.buffer.append_raw(event);
        if self.buffer.len() == 1 {
            log_debug!("first sample after {} motion events", self.decimator.seen());
        }
        true
    }

    pub fn select_label(&mut self, label_id: &str, now: Moment) -> SelectOutcome {
        if !self.running {
            log_debug!("selection of {} ignored: session not running", label_id);
            return SelectOutcome::Ignored;
        }
        let Some(label) = self.catalog.get(label_id).cloned() else {
            log_warn!("selection of unknown label {} ignored", label_id);
            return SelectOutcome::Ignored;
        };

        let mut ctx = SegmentContext {
            buffer: &self.buffer,
            catalog: &self.catalog,
            config: &self.config,
            session_start: self.started,
            recordings: &mut self.recordings,
        };
        match self.strategy.on_select(&label, now, &mut ctx) {
            Some(scheduled) => SelectOutcome::Scheduled(scheduled),
            None => SelectOutcome::Applied,
        }
    }

    /// Maps a recognized transcript to a label and selects it.
    pub fn select_phrase(&mut self, transcript: &str, now: Moment) -> SelectOutcome {
        if !self.running {
            return SelectOutcome::Ignored;
        }
        match self.catalog.find_by_phrase(transcript).map(|l| l.id.clone()) {
            Some(label_id) => self.select_label(&label_id, now),
            None => {
                log_warn!("voice command not recognized: {:?}", transcript);
                SelectOutcome::Ignored
            }
        }
    }

    /// Resolves pending selections whose deadline has passed.
    pub fn resolve_due(&mut self, now: Moment) -> usize {
        if !self.running {
            return 0;
        }
        let mut ctx = SegmentContext {
            buffer: &self.buffer,
            catalog: &self.catalog,
            config: &self.config,
            session_start: self.started,
            recordings: &mut self.recordings,
        };
        self.strategy.resolve_due(now, &mut ctx)
    }

    /// Wall time of the earliest pending deadline, if any.
    pub fn next_due_ms(&self) -> Option<i64> {
        self.strategy.next_due_ms()
    }

    pub fn outstanding(&self) -> usize {
        self.strategy.outstanding()
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Ends the session: flushes open and pending labels at `end`, fills gaps and
    /// produces the immutable record. Returns `None` if already finished.
    pub fn finish(&mut self, end: Moment, record_id: i64) -> Option<SessionRecord> {
        if !self.running {
            log_warn!("finish called on a session that already ended");
            return None;
        }
        self.running = false;

        let mut ctx = SegmentContext {
            buffer: &self.buffer,
            catalog: &self.catalog,
            config: &self.config,
            session_start: self.started,
            recordings: &mut self.recordings,
        };
        self.strategy.on_session_end(end, &mut ctx);

        let working = std::mem::take(&mut self.recordings);
        let recordings = fill_gaps(
            working,
            self.started,
            end,
            &self.buffer,
            &self.catalog.default_label().display_name,
            &self.config,
        );

        log_info!(
            "session finished: {} samples kept of {} events, {} recordings",
            self.buffer.len(),
            self.decimator.seen(),
            recordings.len()
        );

        let car_name = self
            .metadata
            .car_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNNAMED_CAR.to_string());

        Some(SessionRecord {
            id: record_id,
            start_date: wall_to_datetime(self.started.wall_ms),
            end_date: wall_to_datetime(end.wall_ms),
            duration: format_elapsed(end.elapsed_ms.saturating_sub(self.started.elapsed_ms)),
            car_name,
            vehicle_name: self.metadata.vehicle_name.clone().unwrap_or_default(),
            driver_name: self.metadata.driver_name.clone().unwrap_or_default(),
            timing_mode: self.mode,
            sampling_frequency_hz: self.sampling_frequency_hz,
            recordings,
        })
    }
}
