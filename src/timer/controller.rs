use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::Database,
    models::{
        LabelCatalog, RawMotionEvent, SessionMetadata, SessionRecord, SessionSummary, TimingMode,
    },
    models::recording::wall_to_datetime,
    segmentation::{LabelingSession, ScheduledResolution, SegmentationConfig, SelectOutcome},
};

use super::{SessionClock, SessionStatus, TimerState};

const EVENT_CAPACITY: usize = 64;

/// Parameters fixed for the lifetime of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub mode: TimingMode,
    pub sampling_frequency_hz: u32,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: TimerState,
    pub sample_count: usize,
    pub recording_count: usize,
    pub pending_count: usize,
    pub next_due_ms: Option<i64>,
}

/// Notifications for whoever drives the UI. Sends are best-effort.
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged { state: TimerState },
    Heartbeat { state: TimerState, pending_count: usize },
    IntervalsResolved { count: usize },
    SessionCompleted { session: SessionSummary },
}

/// A finished session. The record survives even when storing it failed, so the
/// caller can still hand the drive to the user.
#[derive(Debug)]
pub struct EndedSession {
    pub record: SessionRecord,
    pub persist_error: Option<anyhow::Error>,
}

impl EndedSession {
    pub fn is_stored(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Everything that lives exactly as long as one running session.
struct ActiveSession {
    labeling: LabelingSession,
    clock: SessionClock,
    cancel: CancellationToken,
    deferred: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<TimerState>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    db: Database,
    catalog: LabelCatalog,
    config: SegmentationConfig,
    events: broadcast::Sender<SessionEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
    last_session_id: Arc<AtomicI64>,
}

impl SessionController {
    pub fn new(db: Database, catalog: LabelCatalog, config: SegmentationConfig) -> Self {
        let debug_mode = std::env::var("DRIVELABEL_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            active: Arc::new(Mutex::new(None)),
            db,
            catalog,
            config,
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
            last_session_id: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn get_state(&self) -> TimerState {
        let mut guard = self.state.lock().await;
        guard.sync_elapsed_from_clock();
        guard.clone()
    }

    pub async fn get_snapshot(&self) -> SessionSnapshot {
        let state = self.get_state().await;
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(session) => SessionSnapshot {
                state,
                sample_count: session.labeling.buffer().len(),
                recording_count: session.labeling.recordings().len(),
                pending_count: session.labeling.outstanding(),
                next_due_ms: session.labeling.next_due_ms(),
            },
            None => SessionSnapshot {
                state,
                sample_count: 0,
                recording_count: 0,
                pending_count: 0,
                next_due_ms: None,
            },
        }
    }

    pub async fn start_session(&self, options: SessionOptions) -> Result<TimerState> {
        {
            let state = self.state.lock().await;
            if state.status == SessionStatus::Running {
                return Err(anyhow!("session already active"));
            }
        }

        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(anyhow!("session already active"));
        }

        let started_at = Utc::now();
        let clock = SessionClock::start(Instant::now(), started_at.timestamp_millis());
        let session_id = self.next_session_id(started_at.timestamp_millis());

        let labeling = LabelingSession::start(
            options.mode,
            clock.started(),
            options.sampling_frequency_hz,
            options.metadata,
            self.catalog.clone(),
            self.config.clone(),
        );

        *active = Some(ActiveSession {
            labeling,
            clock,
            cancel: CancellationToken::new(),
            deferred: Vec::new(),
        });
        drop(active);

        {
            let mut state = self.state.lock().await;
            state.begin_session(session_id, options.mode, started_at, clock);
        }

        self.spawn_ticker().await;

        info!(
            "Session {} started in {} mode",
            session_id,
            options.mode.as_str()
        );
        self.emit_state_changed().await;

        Ok(self.get_state().await)
    }

    /// Feeds one native motion event. Events without a device timestamp are
    /// stamped with the session clock. Returns whether the sample was kept.
    pub async fn push_motion(&self, mut event: RawMotionEvent) -> bool {
        let mut guard = self.active.lock().await;
        let Some(active) = guard.as_mut() else {
            return false;
        };
        if event.timestamp == 0 {
            event.timestamp = active.clock.now().wall_ms;
        }
        active.labeling.ingest(event)
    }

    pub async fn select_label(&self, label_id: &str) -> SelectOutcome {
        let mut guard = self.active.lock().await;
        let Some(active) = guard.as_mut() else {
            return SelectOutcome::Ignored;
        };
        let now = active.clock.now();
        let outcome = active.labeling.select_label(label_id, now);
        self.track_outcome(active, &outcome);
        outcome
    }

    pub async fn select_phrase(&self, transcript: &str) -> SelectOutcome {
        let mut guard = self.active.lock().await;
        let Some(active) = guard.as_mut() else {
            return SelectOutcome::Ignored;
        };
        let now = active.clock.now();
        let outcome = active.labeling.select_phrase(transcript, now);
        self.track_outcome(active, &outcome);
        outcome
    }

    /// Finalizes the running session and stores it. Errors only when no session
    /// is running; a failed insert is reported on the returned `EndedSession`.
    pub async fn end_session(&self) -> Result<EndedSession> {
        let session_id = {
            let state = self.state.lock().await;
            if state.status != SessionStatus::Running {
                return Err(anyhow!("no active session to end"));
            }
            state
                .session_id
                .ok_or_else(|| anyhow!("missing session id"))?
        };

        let mut active = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("no active session to end"))?;

        let end = active.clock.now();
        let record = active
            .labeling
            .finish(end, session_id)
            .ok_or_else(|| anyhow!("session {session_id} already finalized"))?;
        stop_deferred(&mut active);
        self.cancel_ticker().await;

        self.state.lock().await.stop();

        info!(
            "Session {} ended after {} with {} recordings ({} samples)",
            record.id,
            record.duration,
            record.recordings.len(),
            record.sample_count()
        );

        let persist_error = match self.db.insert_session_record(&record).await {
            Ok(()) => None,
            Err(err) => {
                error!("Failed to persist session {}: {err:#}", record.id);
                Some(err)
            }
        };

        self.emit_state_changed().await;
        let _ = self.events.send(SessionEvent::SessionCompleted {
            session: SessionSummary::from(&record),
        });

        Ok(EndedSession {
            record,
            persist_error,
        })
    }

    /// Drops the running session without storing anything.
    pub async fn cancel_session(&self) -> Result<()> {
        let taken = self.active.lock().await.take();
        let Some(mut active) = taken else {
            self.state.lock().await.cancel();
            return Ok(());
        };

        stop_deferred(&mut active);
        self.cancel_ticker().await;
        self.state.lock().await.cancel();

        info!(
            "Session started at {} cancelled; {} samples discarded",
            wall_to_datetime(active.clock.started().wall_ms),
            active.labeling.buffer().len()
        );
        self.emit_state_changed().await;
        Ok(())
    }

    fn next_session_id(&self, wall_ms: i64) -> i64 {
        let mut id = wall_ms;
        let _ = self
            .last_session_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                id = wall_ms.max(last + 1);
                Some(id)
            });
        id
    }

    fn track_outcome(&self, active: &mut ActiveSession, outcome: &SelectOutcome) {
        if let SelectOutcome::Scheduled(scheduled) = outcome {
            active.deferred.retain(|handle| !handle.is_finished());
            let handle = self.spawn_resolution(active, scheduled.clone());
            active.deferred.push(handle);
        }
    }

    /// One timer per pending label. It sleeps until the label's deadline and then
    /// resolves whatever is due; a cancelled token or a finished session makes it
    /// a no-op.
    fn spawn_resolution(
        &self,
        active: &ActiveSession,
        scheduled: ScheduledResolution,
    ) -> JoinHandle<()> {
        let sessions = self.active.clone();
        let events = self.events.clone();
        let token = active.cancel.clone();
        let deadline = active.clock.instant_for_wall(scheduled.due_wall_ms);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep_until(deadline) => {}
            }

            let mut guard = sessions.lock().await;
            if token.is_cancelled() {
                return;
            }
            let Some(active) = guard.as_mut() else {
                return;
            };

            let now = active.clock.now();
            let resolved = active.labeling.resolve_due(now);
            if resolved > 0 {
                let _ = events.send(SessionEvent::IntervalsResolved { count: resolved });
            }
        })
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let sessions = self.active.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;
        let heartbeat_every = self.heartbeat_every_ticks.max(1);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            let mut ticks: u32 = 0;
            loop {
                interval.tick().await;

                let snapshot = {
                    let mut guard = state.lock().await;
                    if guard.status != SessionStatus::Running {
                        break;
                    }
                    guard.sync_elapsed_from_clock();
                    guard.clone()
                };

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every != 0 {
                    continue;
                }

                let (samples, pending_count) = match sessions.lock().await.as_ref() {
                    Some(active) => (
                        active.labeling.buffer().len(),
                        active.labeling.outstanding(),
                    ),
                    None => break,
                };

                info!(
                    "Session {:?} running for {} ms: {} samples, {} pending",
                    snapshot.session_id, snapshot.elapsed_ms, samples, pending_count
                );
                let _ = events.send(SessionEvent::Heartbeat {
                    state: snapshot,
                    pending_count,
                });
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn emit_state_changed(&self) {
        let state = self.get_state().await;
        let _ = self.events.send(SessionEvent::StateChanged { state });
    }
}

fn stop_deferred(active: &mut ActiveSession) {
    active.cancel.cancel();
    let outstanding = active.deferred.len();
    for handle in active.deferred.drain(..) {
        handle.abort();
    }
    if outstanding > 0 {
        log::debug!("Aborted {} deferred resolution timers", outstanding);
    }
}
