use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    helpers::{ensure_storable, format_timestamp, parse_datetime, to_i64, to_u64},
    models::{round_half_up, NewVolumeReading, TimeRange, VolumeHistoryData, VolumeReading, VolumeStats},
    Database,
};

pub const DEFAULT_HISTORY_LIMIT: u64 = 1000;
pub const DEFAULT_RECENT_LIMIT: u64 = 24;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
/// Roughly ten thousand years; no storable reading can be older.
pub const MAX_RETENTION_DAYS: u32 = 3_652_500;

const READING_COLUMNS: &str =
    "id, timestamp, volume, ambient, is_active, noise_type, location";

fn row_to_reading(row: &Row) -> Result<VolumeReading> {
    let timestamp: String = row.get("timestamp")?;

    Ok(VolumeReading {
        id: row.get("id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        volume: row.get("volume")?,
        ambient: row.get("ambient")?,
        is_active: row.get("is_active")?,
        noise_type: row.get("noise_type")?,
        location: row.get("location")?,
    })
}

fn collect_readings(mut rows: rusqlite::Rows<'_>) -> Result<Vec<VolumeReading>> {
    let mut readings = Vec::new();
    while let Some(row) = rows.next()? {
        readings.push(row_to_reading(row)?);
    }
    Ok(readings)
}

/// Optional inclusive bounds, pre-formatted for comparison against the
/// stored text timestamps.
fn bounds(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> (Option<String>, Option<String>) {
    (
        start.as_ref().map(format_timestamp),
        end.as_ref().map(format_timestamp),
    )
}

impl Database {
    /// Stores one reading and returns its newly allocated id.
    pub async fn insert_volume_reading(&self, reading: NewVolumeReading) -> Result<String> {
        self.execute(move |conn| {
            let now = Utc::now();
            let id = Uuid::new_v4().to_string();
            let record = reading.into_reading(id, now);
            ensure_storable(record.timestamp, "timestamp")?;

            conn.execute(
                "INSERT INTO volume_readings (id, timestamp, volume, ambient, is_active, noise_type, location, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    format_timestamp(&record.timestamp),
                    record.volume,
                    record.ambient,
                    record.is_active,
                    record.noise_type,
                    record.location,
                    format_timestamp(&now),
                ],
            )
            .with_context(|| "failed to insert volume reading")?;

            Ok(record.id)
        })
        .await
    }

    /// Readings within `[start, end]`, newest first, capped at `limit`.
    ///
    /// The returned stats cover exactly the returned page, so they are bounded
    /// by `limit` as well. Readings sharing a timestamp come back in no
    /// particular order.
    pub async fn query_volume_history(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<VolumeHistoryData> {
        let (start, end) = bounds(start, end);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {READING_COLUMNS}
                 FROM volume_readings
                 WHERE (?1 IS NULL OR timestamp >= ?1)
                   AND (?2 IS NULL OR timestamp <= ?2)
                 ORDER BY timestamp DESC
                 LIMIT ?3"
            ))?;

            let rows = stmt.query(params![start, end, to_i64(limit)?])?;
            let readings = collect_readings(rows).context("failed to load volume history")?;
            let stats = VolumeStats::from_readings(&readings, Utc::now());

            Ok(VolumeHistoryData { readings, stats })
        })
        .await
    }

    /// Stats over every reading within `[start, end]`, with no limit applied.
    pub async fn volume_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<VolumeStats> {
        let (start, end) = bounds(start, end);
        self.execute(move |conn| {
            let (count, avg, max, min, first, last) = conn
                .query_row(
                    "SELECT COUNT(*), AVG(volume), MAX(volume), MIN(volume), MIN(timestamp), MAX(timestamp)
                     FROM volume_readings
                     WHERE (?1 IS NULL OR timestamp >= ?1)
                       AND (?2 IS NULL OR timestamp <= ?2)",
                    params![start, end],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, Option<f64>>(1)?,
                            row.get::<_, Option<f64>>(2)?,
                            row.get::<_, Option<f64>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<String>>(5)?,
                        ))
                    },
                )
                .context("failed to aggregate volume stats")?;

            let now = Utc::now();
            let total_readings = to_u64(count, "count")?;
            if total_readings == 0 {
                return Ok(VolumeStats::empty(now));
            }

            let start = match first {
                Some(raw) => parse_datetime(&raw, "timestamp")?,
                None => now,
            };
            let end = match last {
                Some(raw) => parse_datetime(&raw, "timestamp")?,
                None => now,
            };

            Ok(VolumeStats {
                avg_volume: round_half_up(avg.unwrap_or_default()),
                max_volume: max.unwrap_or_default(),
                min_volume: min.unwrap_or_default(),
                total_readings,
                time_range: TimeRange { start, end },
            })
        })
        .await
    }

    /// The `limit` newest readings, newest first.
    pub async fn recent_volume_readings(&self, limit: u64) -> Result<Vec<VolumeReading>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {READING_COLUMNS}
                 FROM volume_readings
                 ORDER BY timestamp DESC
                 LIMIT ?1"
            ))?;

            let rows = stmt.query(params![to_i64(limit)?])?;
            collect_readings(rows).context("failed to load recent volume readings")
        })
        .await
    }

    /// Deletes readings timestamped strictly before `now - days`; returns the count removed.
    pub async fn purge_volume_readings_older_than(&self, days: u32) -> Result<u64> {
        self.execute(move |conn| {
            // Past the storable range nothing can be older than the cutoff.
            let Some(cutoff) = Utc::now()
                .checked_sub_signed(Duration::days(i64::from(days)))
                .filter(|cutoff| ensure_storable(*cutoff, "cutoff").is_ok())
            else {
                return Ok(0);
            };

            let deleted = conn
                .execute(
                    "DELETE FROM volume_readings WHERE timestamp < ?1",
                    params![format_timestamp(&cutoff)],
                )
                .with_context(|| "failed to purge old volume readings")?;

            Ok(deleted as u64)
        })
        .await
    }
}
