use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    db::Database,
    models::{LabelCatalog, RawMotionEvent, SessionMetadata, SessionRecord, TimingMode},
    replay::{replay as run_replay, DriveScript},
    segmentation::{SegmentationConfig, SelectOutcome},
    settings::SUPPORTED_FREQUENCIES_HZ,
    timer::{SessionController, SessionOptions},
    AppState,
};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

pub async fn replay(state: &AppState, script_path: &Path, dry_run: bool) -> Result<()> {
    let script = DriveScript::load(script_path)?;
    let (record, stats) = run_replay(&script, LabelCatalog::driving(), SegmentationConfig::default())?;

    info!(
        "Replay kept {} of {} motion events; {} selections applied, {} ignored",
        stats.samples_kept, stats.motion_events, stats.selections_applied, stats.selections_ignored
    );

    if !dry_run {
        store_replayed(&state.db, &record).await?;
        info!("Stored session {}", record.id);
    }

    print_json(&record)
}

/// Replayed records are keyed by the script's start time, so replaying the same
/// script twice collides with the first run.
async fn store_replayed(db: &Database, record: &SessionRecord) -> Result<()> {
    if db.session_record_exists(record.id).await? {
        bail!(
            "session {} is already stored; delete it first or replay with --dry-run",
            record.id
        );
    }
    db.insert_session_record(record).await
}

/// One line of the live recording protocol on stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum LiveCommand {
    Motion {
        #[serde(default)]
        timestamp: i64,
        #[serde(default)]
        ax: Option<f64>,
        #[serde(default)]
        ay: Option<f64>,
        #[serde(default)]
        az: Option<f64>,
        #[serde(default)]
        gx: Option<f64>,
        #[serde(default)]
        gy: Option<f64>,
        #[serde(default)]
        gz: Option<f64>,
    },
    Select {
        label_id: String,
    },
    Phrase {
        transcript: String,
    },
    End,
    Cancel,
}

pub async fn record(
    state: &AppState,
    mode: Option<TimingMode>,
    frequency: Option<u32>,
) -> Result<()> {
    let preferences = state.settings.current()?;
    let sampling_frequency_hz = frequency.unwrap_or(preferences.sampling_frequency_hz);
    if !SUPPORTED_FREQUENCIES_HZ.contains(&sampling_frequency_hz) {
        bail!("unsupported sampling frequency {sampling_frequency_hz} Hz (expected 2 or 4)");
    }

    let controller = SessionController::new(
        state.db.clone(),
        LabelCatalog::driving(),
        SegmentationConfig::default(),
    );

    let mut events = controller.subscribe();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            debug!("session event: {event:?}");
        }
    });

    controller
        .start_session(SessionOptions {
            mode: mode.unwrap_or(preferences.timing_mode),
            sampling_frequency_hz,
            metadata: preferences.metadata(),
        })
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut cancelled = false;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command: LiveCommand = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(err) => {
                warn!("Skipping malformed command {line:?}: {err}");
                continue;
            }
        };

        match command {
            LiveCommand::Motion {
                timestamp,
                ax,
                ay,
                az,
                gx,
                gy,
                gz,
            } => {
                controller
                    .push_motion(RawMotionEvent {
                        timestamp,
                        ax,
                        ay,
                        az,
                        gx,
                        gy,
                        gz,
                    })
                    .await;
            }
            LiveCommand::Select { label_id } => {
                report_selection(&label_id, controller.select_label(&label_id).await);
            }
            LiveCommand::Phrase { transcript } => {
                report_selection(&transcript, controller.select_phrase(&transcript).await);
            }
            LiveCommand::End => break,
            LiveCommand::Cancel => {
                cancelled = true;
                break;
            }
        }
    }

    let result = if cancelled {
        controller.cancel_session().await
    } else {
        match controller.end_session().await {
            Ok(ended) => {
                print_json(&ended.record)?;
                match ended.persist_error {
                    None => Ok(()),
                    Some(err) => Err(err.context(format!(
                        "session {} was printed but not stored",
                        ended.record.id
                    ))),
                }
            }
            Err(err) => Err(err),
        }
    };

    event_logger.abort();
    result
}

fn report_selection(input: &str, outcome: SelectOutcome) {
    match outcome {
        SelectOutcome::Ignored => warn!("Selection {input:?} ignored"),
        SelectOutcome::Applied => info!("Selection {input:?} applied"),
        SelectOutcome::Scheduled(scheduled) => info!(
            "Selection {input:?} pending until {}",
            scheduled.due_wall_ms
        ),
    }
}

pub async fn list(state: &AppState, limit: Option<usize>, offset: usize) -> Result<()> {
    let sessions = match limit {
        Some(limit) => state.db.list_session_records_paginated(limit, offset).await?,
        None => state.db.list_session_records().await?,
    };
    print_json(&sessions)
}

pub async fn show(state: &AppState, id: i64) -> Result<()> {
    match state.db.get_session_record(id).await? {
        Some(record) => print_json(&record),
        None => bail!("session {id} not found"),
    }
}

pub async fn delete(state: &AppState, id: i64) -> Result<()> {
    if !state.db.delete_session_record(id).await? {
        bail!("session {id} not found");
    }
    info!("Deleted session {id}");
    Ok(())
}

pub struct SettingsUpdate {
    pub frequency: Option<u32>,
    pub mode: Option<TimingMode>,
    pub car_name: Option<String>,
    pub vehicle_name: Option<String>,
    pub driver_name: Option<String>,
}

pub fn settings(state: &AppState, update: SettingsUpdate) -> Result<()> {
    if let Some(hz) = update.frequency {
        state.settings.update_sampling_frequency(hz)?;
    }
    if let Some(mode) = update.mode {
        state.settings.update_timing_mode(mode)?;
    }
    if update.car_name.is_some() || update.vehicle_name.is_some() || update.driver_name.is_some() {
        let current = state.settings.current()?.metadata();
        state.settings.update_metadata(SessionMetadata {
            car_name: update.car_name.or(current.car_name),
            vehicle_name: update.vehicle_name.or(current.vehicle_name),
            driver_name: update.driver_name.or(current.driver_name),
        })?;
    }

    print_json(&state.settings.current()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ScriptEvent;

    fn short_script() -> DriveScript {
        DriveScript {
            mode: TimingMode::Bounded,
            sampling_frequency_hz: 2,
            metadata: SessionMetadata::default(),
            start_wall_ms: 1_700_000_000_000,
            end_at_ms: 4_000,
            events: vec![ScriptEvent::Select {
                at_ms: 1_000,
                label_id: "braking".into(),
            }],
        }
    }

    #[tokio::test]
    async fn replaying_a_stored_script_again_is_refused() {
        let db = Database::open_in_memory().unwrap();
        let (record, _) = run_replay(
            &short_script(),
            LabelCatalog::driving(),
            SegmentationConfig::default(),
        )
        .unwrap();

        store_replayed(&db, &record).await.unwrap();
        let err = store_replayed(&db, &record).await.unwrap_err();
        assert!(err.to_string().contains("already stored"));
        assert_eq!(db.list_session_records().await.unwrap().len(), 1);
    }
}
