use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::{
    db::{connection::Database, helpers::parse_optional_datetime},
    models::{OccupancySnapshot, SpaceStatus},
    services::OccupancyStatusSource,
};

use super::zones::query_zones;

impl Database {
    /// Store the detector's latest verdict for a zone.
    pub async fn record_detection(
        &self,
        zone_id: &str,
        is_occupied: bool,
        observed_at: DateTime<Utc>,
    ) -> Result<()> {
        let zone_id = zone_id.to_string();
        self.execute(move |conn| {
            let updated = conn
                .execute(
                    "INSERT INTO zone_status (zone_id, is_occupied, updated_at)
                     SELECT id, ?2, ?3 FROM zones WHERE id = ?1
                     ON CONFLICT (zone_id) DO UPDATE
                     SET is_occupied = excluded.is_occupied,
                         updated_at = excluded.updated_at",
                    params![zone_id, i64::from(is_occupied), observed_at.to_rfc3339()],
                )
                .context("failed to record zone detection")?;
            if updated == 0 {
                return Err(anyhow!("unknown zone {zone_id}"));
            }
            Ok(())
        })
        .await
    }

    pub async fn camera_snapshot(&self, camera_id: &str) -> Result<OccupancySnapshot> {
        let camera_id = camera_id.to_string();
        self.execute(move |conn| {
            let zones = query_zones(conn, &camera_id)?;
            let last_update: Option<String> = conn
                .query_row(
                    "SELECT MAX(s.updated_at)
                     FROM zone_status s
                     JOIN zones z ON z.id = s.zone_id
                     WHERE z.camera_id = ?1",
                    params![camera_id],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();

            let spaces = zones
                .into_iter()
                .map(|zone| SpaceStatus {
                    id: zone.id,
                    space_number: zone.space_number,
                    is_occupied: zone.is_occupied,
                })
                .collect();

            let mut snapshot = OccupancySnapshot::from_spaces(spaces, Utc::now());
            snapshot.last_update = parse_optional_datetime(last_update, "updated_at")?;
            Ok(snapshot)
        })
        .await
    }
}

#[async_trait]
impl OccupancyStatusSource for Database {
    async fn current_status(&self, camera_id: &str) -> Result<OccupancySnapshot> {
        self.camera_snapshot(camera_id).await
    }
}
