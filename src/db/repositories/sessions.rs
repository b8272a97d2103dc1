use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_timing_mode, to_u32},
};
use crate::models::{Recording, Sample, SessionRecord, SessionSummary};

const SUMMARY_COLUMNS: &str = "s.id, s.start_date, s.end_date, s.duration, s.car_name, s.timing_mode,
     (SELECT COUNT(*) FROM recordings r WHERE r.session_id = s.id) AS recording_count";

fn row_to_summary(row: &Row) -> Result<SessionSummary> {
    let start_date: String = row.get("start_date")?;
    let end_date: String = row.get("end_date")?;
    let timing_mode: String = row.get("timing_mode")?;
    let recording_count: i64 = row.get("recording_count")?;

    Ok(SessionSummary {
        id: row.get("id")?,
        start_date: parse_datetime(&start_date, "start_date")?,
        end_date: parse_datetime(&end_date, "end_date")?,
        duration: row.get("duration")?,
        car_name: row.get("car_name")?,
        timing_mode: parse_timing_mode(&timing_mode)?,
        recording_count: recording_count.max(0) as usize,
    })
}

fn row_to_recording(row: &Row) -> Result<Recording> {
    let absolute_start: String = row.get("absolute_start_time")?;
    let absolute_end: String = row.get("absolute_end_time")?;
    let imu_json: String = row.get("imu_data")?;
    let imu_data: Vec<Sample> =
        serde_json::from_str(&imu_json).context("failed to decode imu_data")?;

    Ok(Recording {
        id: row.get("id")?,
        label: row.get("label")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        duration: row.get("duration")?,
        absolute_start_time: parse_datetime(&absolute_start, "absolute_start_time")?,
        absolute_end_time: parse_datetime(&absolute_end, "absolute_end_time")?,
        imu_data,
    })
}

fn load_recordings(conn: &Connection, session_id: i64) -> Result<Vec<Recording>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, start_time, end_time, duration, absolute_start_time, absolute_end_time, imu_data
         FROM recordings
         WHERE session_id = ?1
         ORDER BY position ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut recordings = Vec::new();
    while let Some(row) = rows.next()? {
        recordings.push(row_to_recording(row)?);
    }
    Ok(recordings)
}

impl Database {
    /// Stores a finished session and its recordings in one transaction.
    pub async fn insert_session_record(&self, record: &SessionRecord) -> Result<()> {
        let record = record.clone();
        self.transaction(move |tx| {
            tx.execute(
                "INSERT INTO session_records (id, start_date, end_date, duration, car_name, vehicle_name, driver_name, timing_mode, sampling_frequency_hz, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    format_datetime(&record.start_date),
                    format_datetime(&record.end_date),
                    record.duration,
                    record.car_name,
                    record.vehicle_name,
                    record.driver_name,
                    record.timing_mode.as_str(),
                    record.sampling_frequency_hz,
                    format_datetime(&Utc::now()),
                ],
            )
            .with_context(|| format!("failed to insert session record {}", record.id))?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO recordings (id, session_id, position, label, start_time, end_time, duration, absolute_start_time, absolute_end_time, imu_data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )?;

                for (position, recording) in record.recordings.iter().enumerate() {
                    let imu_json = serde_json::to_string(&recording.imu_data)
                        .context("failed to encode imu_data")?;
                    stmt.execute(params![
                        recording.id,
                        record.id,
                        position as i64,
                        recording.label,
                        recording.start_time,
                        recording.end_time,
                        recording.duration,
                        format_datetime(&recording.absolute_start_time),
                        format_datetime(&recording.absolute_end_time),
                        imu_json,
                    ])?;
                }
            }

            Ok(())
        })
        .await
    }

    pub async fn get_session_record(&self, session_id: i64) -> Result<Option<SessionRecord>> {
        self.execute(move |conn| {
            let header = conn
                .query_row(
                    "SELECT id, start_date, end_date, duration, car_name, vehicle_name, driver_name, timing_mode, sampling_frequency_hz
                     FROM session_records
                     WHERE id = ?1",
                    params![session_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, String>(7)?,
                            row.get::<_, i64>(8)?,
                        ))
                    },
                )
                .optional()?;

            let Some((
                id,
                start_date,
                end_date,
                duration,
                car_name,
                vehicle_name,
                driver_name,
                timing_mode,
                frequency,
            )) = header
            else {
                return Ok(None);
            };

            Ok(Some(SessionRecord {
                id,
                start_date: parse_datetime(&start_date, "start_date")?,
                end_date: parse_datetime(&end_date, "end_date")?,
                duration,
                car_name,
                vehicle_name,
                driver_name,
                timing_mode: parse_timing_mode(&timing_mode)?,
                sampling_frequency_hz: to_u32(frequency, "sampling_frequency_hz")?,
                recordings: load_recordings(conn, id)?,
            }))
        })
        .await
    }

    pub async fn session_record_exists(&self, session_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM session_records WHERE id = ?1",
                    params![session_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    /// Newest sessions first.
    pub async fn list_session_records(&self) -> Result<Vec<SessionSummary>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM session_records s
                 ORDER BY s.start_date DESC, s.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_summary(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn list_session_records_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SessionSummary>> {
        let limit = limit as i64;
        let offset = offset as i64;
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM session_records s
                 ORDER BY s.start_date DESC, s.id DESC
                 LIMIT ?1 OFFSET ?2"
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut rows = stmt.query(params![limit, offset])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_summary(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Removes a session and, through the foreign key cascade, its recordings.
    /// Returns whether a row was deleted.
    pub async fn delete_session_record(&self, session_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM session_records WHERE id = ?1",
                params![session_id],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Moment, TimingMode};
    use crate::models::recording::wall_to_datetime;

    const T0: i64 = 1_700_000_000_000;

    fn sample(timestamp: i64, ax: f64) -> Sample {
        Sample {
            timestamp,
            ax,
            ay: -0.25,
            az: 9.75,
            gx: 0.5,
            gy: 0.0,
            gz: -1.5,
        }
    }

    fn record(id: i64, start_wall: i64) -> SessionRecord {
        let start = Moment::new(0, start_wall);
        let end = start.later(6_000);
        SessionRecord {
            id,
            start_date: wall_to_datetime(start.wall_ms),
            end_date: wall_to_datetime(end.wall_ms),
            duration: "00:06.00".to_string(),
            car_name: "Clio".to_string(),
            vehicle_name: "Renault".to_string(),
            driver_name: "Camille".to_string(),
            timing_mode: TimingMode::Bounded,
            sampling_frequency_hz: 2,
            recordings: vec![
                Recording::new(
                    "Freinage",
                    start,
                    start.later(3_000),
                    vec![sample(start_wall, 1.5), sample(start_wall + 500, 2.25)],
                ),
                Recording::new(
                    "Conduite non agressive",
                    start.later(3_000),
                    end,
                    vec![sample(start_wall + 3_500, 0.125)],
                ),
            ],
        }
    }

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("drivelabel.db")).unwrap()
    }

    #[tokio::test]
    async fn stores_and_reloads_a_full_session() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let original = record(T0, T0);

        db.insert_session_record(&original).await.unwrap();
        let loaded = db.get_session_record(T0).await.unwrap().unwrap();

        assert_eq!(loaded, original);
        assert_eq!(loaded.sample_count(), 3);
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        assert!(db.get_session_record(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_newest_first_with_recording_counts() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        db.insert_session_record(&record(T0, T0)).await.unwrap();
        db.insert_session_record(&record(T0 + 60_000, T0 + 60_000))
            .await
            .unwrap();

        let listed = db.list_session_records().await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![T0 + 60_000, T0]);
        assert!(listed.iter().all(|s| s.recording_count == 2));
        assert_eq!(listed[0].timing_mode, TimingMode::Bounded);

        let page = db.list_session_records_paginated(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, T0);
    }

    #[tokio::test]
    async fn delete_cascades_to_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        db.insert_session_record(&record(T0, T0)).await.unwrap();

        assert!(db.session_record_exists(T0).await.unwrap());
        assert!(db.delete_session_record(T0).await.unwrap());
        assert!(!db.delete_session_record(T0).await.unwrap());
        assert!(!db.session_record_exists(T0).await.unwrap());
        assert!(db.get_session_record(T0).await.unwrap().is_none());

        let orphans: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM recordings", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        db.insert_session_record(&record(T0, T0)).await.unwrap();
        assert!(db.insert_session_record(&record(T0, T0)).await.is_err());
    }
}
