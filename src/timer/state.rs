use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::models::{Moment, TimingMode};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Stopped,
}

/// Monotonic anchor plus the wall time it corresponds to. Wall time is derived
/// from the monotonic clock so both halves of a `Moment` move together.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    anchor: Instant,
    started_wall_ms: i64,
}

impl SessionClock {
    pub fn start(anchor: Instant, started_wall_ms: i64) -> Self {
        Self {
            anchor,
            started_wall_ms,
        }
    }

    pub fn started(&self) -> Moment {
        Moment::new(0, self.started_wall_ms)
    }

    pub fn now(&self) -> Moment {
        self.moment_at(Instant::now())
    }

    pub fn moment_at(&self, instant: Instant) -> Moment {
        let elapsed = instant.saturating_duration_since(self.anchor).as_millis() as u64;
        Moment::new(elapsed, self.started_wall_ms + elapsed as i64)
    }

    /// Monotonic instant at which the clock reads `wall_ms`.
    pub fn instant_for_wall(&self, wall_ms: i64) -> Instant {
        let offset = (wall_ms - self.started_wall_ms).max(0) as u64;
        self.anchor + std::time::Duration::from_millis(offset)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: SessionStatus,
    pub mode: TimingMode,
    pub session_id: Option<i64>,
    pub elapsed_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub clock: Option<SessionClock>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            mode: TimingMode::default(),
            session_id: None,
            elapsed_ms: 0,
            started_at: None,
            clock: None,
        }
    }
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_elapsed_ms(&self) -> u64 {
        match (self.status, self.clock) {
            (SessionStatus::Running, Some(clock)) => clock.now().elapsed_ms,
            _ => self.elapsed_ms,
        }
    }

    pub fn sync_elapsed_from_clock(&mut self) {
        if let (SessionStatus::Running, Some(clock)) = (self.status, self.clock) {
            self.elapsed_ms = clock.now().elapsed_ms;
        }
    }

    pub fn begin_session(
        &mut self,
        session_id: i64,
        mode: TimingMode,
        started_at: DateTime<Utc>,
        clock: SessionClock,
    ) {
        *self = Self {
            status: SessionStatus::Running,
            mode,
            session_id: Some(session_id),
            elapsed_ms: 0,
            started_at: Some(started_at),
            clock: Some(clock),
        };
    }

    pub fn stop(&mut self) {
        self.sync_elapsed_from_clock();
        self.status = SessionStatus::Stopped;
        self.clock = None;
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn clock_moves_elapsed_and_wall_together() {
        let clock = SessionClock::start(Instant::now(), 1_700_000_000_000);
        tokio::time::advance(Duration::from_millis(2_500)).await;

        let now = clock.now();
        assert_eq!(now.elapsed_ms, 2_500);
        assert_eq!(now.wall_ms, 1_700_000_002_500);
        assert_eq!(
            clock.instant_for_wall(1_700_000_004_000) - clock.anchor,
            Duration::from_millis(4_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_elapsed() {
        let clock = SessionClock::start(Instant::now(), 0);
        let mut state = TimerState::new();
        state.begin_session(1, TimingMode::Bounded, Utc::now(), clock);

        tokio::time::advance(Duration::from_millis(1_200)).await;
        assert_eq!(state.current_elapsed_ms(), 1_200);

        state.stop();
        tokio::time::advance(Duration::from_millis(5_000)).await;
        assert_eq!(state.status, SessionStatus::Stopped);
        assert_eq!(state.current_elapsed_ms(), 1_200);

        state.cancel();
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(state.session_id.is_none());
    }
}
