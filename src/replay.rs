//! Offline replay of a recorded drive.
//!
//! A drive script is a JSON document holding the session parameters plus a
//! time-ordered list of motion events and label selections, each stamped with
//! its offset from the session start. Replaying feeds the script through the
//! same `LabelingSession` the live controller uses, resolving deferred labels at
//! their deadlines, so a script always produces the record a live run would.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{LabelCatalog, Moment, RawMotionEvent, SessionMetadata, SessionRecord, TimingMode};
use crate::segmentation::{LabelingSession, SegmentationConfig, SelectOutcome};
use crate::settings::SUPPORTED_FREQUENCIES_HZ;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveScript {
    #[serde(default)]
    pub mode: TimingMode,
    #[serde(default = "default_frequency")]
    pub sampling_frequency_hz: u32,
    #[serde(default)]
    pub metadata: SessionMetadata,
    pub start_wall_ms: i64,
    pub end_at_ms: u64,
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

fn default_frequency() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScriptEvent {
    Motion {
        at_ms: u64,
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
        at_ms: u64,
        label_id: String,
    },
    Phrase {
        at_ms: u64,
        transcript: String,
    },
}

impl ScriptEvent {
    pub fn at_ms(&self) -> u64 {
        match self {
            ScriptEvent::Motion { at_ms, .. }
            | ScriptEvent::Select { at_ms, .. }
            | ScriptEvent::Phrase { at_ms, .. } => *at_ms,
        }
    }
}

impl DriveScript {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read drive script {}", path.display()))?;
        let script: DriveScript = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse drive script {}", path.display()))?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_FREQUENCIES_HZ.contains(&self.sampling_frequency_hz) {
            bail!(
                "unsupported sampling frequency {} Hz (expected 2 or 4)",
                self.sampling_frequency_hz
            );
        }
        if self.start_wall_ms <= 0 {
            bail!("startWallMs must be a positive Unix timestamp in milliseconds");
        }
        Ok(())
    }

    fn moment(&self, at_ms: u64) -> Moment {
        Moment::new(at_ms, self.start_wall_ms + at_ms as i64)
    }
}

/// Counters describing what a replay did with its input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStats {
    pub motion_events: usize,
    pub samples_kept: usize,
    pub selections_applied: usize,
    pub selections_ignored: usize,
    pub resolved_on_time: usize,
    pub dropped_after_end: usize,
}

/// Runs a script through a fresh labeling session and returns the finished record.
/// The record id is the script's start timestamp.
pub fn replay(
    script: &DriveScript,
    catalog: LabelCatalog,
    config: SegmentationConfig,
) -> Result<(SessionRecord, ReplayStats)> {
    let mut events: Vec<&ScriptEvent> = script.events.iter().collect();
    events.sort_by_key(|event| event.at_ms());

    let start = script.moment(0);
    let mut session = LabelingSession::start(
        script.mode,
        start,
        script.sampling_frequency_hz,
        script.metadata.clone(),
        catalog,
        config,
    );
    let mut stats = ReplayStats::default();

    for event in events {
        if event.at_ms() > script.end_at_ms {
            stats.dropped_after_end += 1;
            continue;
        }
        let now = script.moment(event.at_ms());
        // Deadlines equal to `now` wait until every event stamped `now` is in,
        // so a sample sitting on a window's upper bound lands inside it.
        stats.resolved_on_time += session.resolve_due(now.earlier(1));

        match event {
            ScriptEvent::Motion {
                ax, ay, az, gx, gy, gz, ..
            } => {
                stats.motion_events += 1;
                let raw = RawMotionEvent {
                    timestamp: now.wall_ms,
                    ax: *ax,
                    ay: *ay,
                    az: *az,
                    gx: *gx,
                    gy: *gy,
                    gz: *gz,
                };
                if session.ingest(raw) {
                    stats.samples_kept += 1;
                }
            }
            ScriptEvent::Select { label_id, .. } => {
                record_outcome(&mut stats, session.select_label(label_id, now));
            }
            ScriptEvent::Phrase { transcript, .. } => {
                record_outcome(&mut stats, session.select_phrase(transcript, now));
            }
        }
    }

    if stats.dropped_after_end > 0 {
        log_warn!(
            "{} script events fall after the end at {}ms and were dropped",
            stats.dropped_after_end,
            script.end_at_ms
        );
    }

    let end = script.moment(script.end_at_ms);
    stats.resolved_on_time += session.resolve_due(end);

    let record = session
        .finish(end, script.start_wall_ms)
        .ok_or_else(|| anyhow!("replay session was already finished"))?;

    log_info!(
        "replayed {} events into {} recordings",
        stats.motion_events + stats.selections_applied + stats.selections_ignored,
        record.recordings.len()
    );

    Ok((record, stats))
}

fn record_outcome(stats: &mut ReplayStats, outcome: SelectOutcome) {
    match outcome {
        SelectOutcome::Ignored => stats.selections_ignored += 1,
        SelectOutcome::Applied | SelectOutcome::Scheduled(_) => stats.selections_applied += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_LABEL_NAME;

    const T0: i64 = 1_700_000_000_000;

    fn motion_every_33ms(until_ms: u64) -> Vec<ScriptEvent> {
        (0..=until_ms)
            .step_by(33)
            .map(|at_ms| ScriptEvent::Motion {
                at_ms,
                ax: Some(0.5),
                ay: None,
                az: Some(9.75),
                gx: None,
                gy: None,
                gz: None,
            })
            .collect()
    }

    fn script(mode: TimingMode, mut extra: Vec<ScriptEvent>, end_at_ms: u64) -> DriveScript {
        let mut events = motion_every_33ms(end_at_ms);
        events.append(&mut extra);
        DriveScript {
            mode,
            sampling_frequency_hz: 2,
            metadata: SessionMetadata::default(),
            start_wall_ms: T0,
            end_at_ms,
            events,
        }
    }

    fn labels(record: &SessionRecord) -> Vec<&str> {
        record.recordings.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn parses_the_json_script_format() {
        let json = r#"{
            "mode": "bounded",
            "samplingFrequencyHz": 4,
            "metadata": { "carName": "Clio" },
            "startWallMs": 1700000000000,
            "endAtMs": 20000,
            "events": [
                { "type": "motion", "atMs": 0, "ax": 0.1, "gz": null },
                { "type": "select", "atMs": 5000, "labelId": "braking" },
                { "type": "phrase", "atMs": 9000, "transcript": "virage gauche" }
            ]
        }"#;

        let script: DriveScript = serde_json::from_str(json).unwrap();
        script.validate().unwrap();
        assert_eq!(script.mode, TimingMode::Bounded);
        assert_eq!(script.sampling_frequency_hz, 4);
        assert_eq!(script.metadata.car_name.as_deref(), Some("Clio"));
        assert_eq!(script.events.len(), 3);
        assert!(matches!(
            &script.events[1],
            ScriptEvent::Select { at_ms: 5000, label_id } if label_id == "braking"
        ));
    }

    #[test]
    fn rejects_unsupported_frequencies() {
        let mut bad = script(TimingMode::Instant, Vec::new(), 1_000);
        bad.sampling_frequency_hz = 3;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn bounded_replay_matches_the_toggle_scenario() {
        let script = script(
            TimingMode::Bounded,
            vec![
                ScriptEvent::Select {
                    at_ms: 2_000,
                    label_id: "braking".into(),
                },
                ScriptEvent::Select {
                    at_ms: 5_000,
                    label_id: "acceleration".into(),
                },
            ],
            8_000,
        );

        let (record, stats) = replay(&script, LabelCatalog::driving(), SegmentationConfig::default()).unwrap();

        assert_eq!(
            labels(&record),
            vec![DEFAULT_LABEL_NAME, "Freinage", "Accélération"]
        );
        assert_eq!(record.id, T0);
        assert_eq!(record.duration, "00:08.00");
        assert_eq!(record.recordings[2].end_ms(), T0 + 8_000);
        assert_eq!(stats.selections_applied, 2);
        assert_eq!(stats.samples_kept, record.sample_count());
    }

    #[test]
    fn instant_labels_resolve_at_their_deadline_during_replay() {
        let script = script(
            TimingMode::Instant,
            vec![ScriptEvent::Select {
                at_ms: 10_000,
                label_id: "right-turn".into(),
            }],
            30_000,
        );

        let (record, stats) = replay(&script, LabelCatalog::driving(), SegmentationConfig::default()).unwrap();

        assert_eq!(stats.resolved_on_time, 1);
        assert_eq!(
            labels(&record),
            vec![
                DEFAULT_LABEL_NAME,
                "Virage serré à droite",
                DEFAULT_LABEL_NAME
            ]
        );
        let turn = &record.recordings[1];
        assert_eq!(turn.start_ms(), T0 + 5_000);
        assert_eq!(turn.end_ms(), T0 + 15_000);
    }

    #[test]
    fn unknown_phrases_and_late_events_are_counted() {
        let mut script = script(
            TimingMode::Voice,
            vec![
                ScriptEvent::Phrase {
                    at_ms: 1_000,
                    transcript: "il fait beau".into(),
                },
                ScriptEvent::Select {
                    at_ms: 9_000,
                    label_id: "braking".into(),
                },
            ],
            4_000,
        );
        script.metadata.car_name = Some("   ".into());

        let (record, stats) = replay(&script, LabelCatalog::driving(), SegmentationConfig::default()).unwrap();

        assert_eq!(stats.selections_ignored, 1);
        assert_eq!(stats.dropped_after_end, 1);
        assert_eq!(labels(&record), vec![DEFAULT_LABEL_NAME]);
        assert_eq!(record.car_name, "Sans nom");
    }

    #[test]
    fn samples_on_a_deadline_stay_inside_the_resolved_window() {
        // 100 ms native cadence; decimation keeps 1500, 3000, ..., 30000.
        let mut events: Vec<ScriptEvent> = (1..=300)
            .map(|i| ScriptEvent::Motion {
                at_ms: i * 100,
                ax: Some(0.5),
                ay: None,
                az: Some(9.75),
                gx: None,
                gy: None,
                gz: None,
            })
            .collect();
        events.push(ScriptEvent::Select {
            at_ms: 10_000,
            label_id: "braking".into(),
        });
        let script = DriveScript {
            mode: TimingMode::Instant,
            sampling_frequency_hz: 2,
            metadata: SessionMetadata::default(),
            start_wall_ms: T0,
            end_at_ms: 30_000,
            events,
        };

        let (record, stats) = replay(&script, LabelCatalog::driving(), SegmentationConfig::default()).unwrap();
        assert_eq!(stats.samples_kept, 20);
        assert_eq!(stats.resolved_on_time, 1);

        let braking = &record.recordings[1];
        assert_eq!(braking.label, "Freinage");
        assert_eq!((braking.start_ms(), braking.end_ms()), (T0 + 5_000, T0 + 15_000));
        let stamps: Vec<i64> = braking.imu_data.iter().map(|s| s.timestamp - T0).collect();
        assert_eq!(stamps, vec![6_000, 7_500, 9_000, 10_500, 12_000, 13_500, 15_000]);

        for kept in (1..=20).map(|i| T0 + i * 1_500) {
            assert!(
                record
                    .recordings
                    .iter()
                    .any(|r| r.imu_data.iter().any(|s| s.timestamp == kept)),
                "sample at {kept} is in no recording"
            );
        }
        assert_eq!(record.sample_count(), 20);
    }
}
