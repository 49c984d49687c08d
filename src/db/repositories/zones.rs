use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::{
    db::{
        connection::Database,
        helpers::{coordinates_from_json, coordinates_to_json, space_number_from_sql, space_number_to_sql},
    },
    models::{PersistedZone, ZoneSubmission},
    services::ZonePersistence,
};

const SELECT_ZONES: &str = "SELECT z.id, z.space_number, z.name, z.coordinates_json,
        COALESCE(s.is_occupied, 0) AS is_occupied
     FROM zones z
     LEFT JOIN zone_status s ON s.zone_id = z.id
     WHERE z.camera_id = ?1
     ORDER BY z.space_number ASC";

fn row_to_zone(row: &Row) -> Result<PersistedZone> {
    let space_number: i64 = row.get("space_number")?;
    let coordinates: String = row.get("coordinates_json")?;
    let is_occupied: i64 = row.get("is_occupied")?;

    Ok(PersistedZone {
        id: row.get("id")?,
        space_number: space_number_from_sql(space_number)?,
        name: row.get("name")?,
        coordinates: coordinates_from_json(&coordinates)?,
        is_occupied: is_occupied != 0,
    })
}

pub(crate) fn query_zones(conn: &Connection, camera_id: &str) -> Result<Vec<PersistedZone>> {
    let mut stmt = conn.prepare(SELECT_ZONES)?;
    let mut rows = stmt.query(params![camera_id])?;
    let mut zones = Vec::new();
    while let Some(row) = rows.next()? {
        zones.push(row_to_zone(row)?);
    }
    Ok(zones)
}

impl Database {
    /// Replace a camera's zone set. A zone keeps its id (and with it its
    /// detection state) only when both its space number and its polygon are
    /// unchanged. A redrawn polygon is a new zone, even under an old number.
    pub async fn replace_zones(
        &self,
        camera_id: &str,
        zones: Vec<ZoneSubmission>,
    ) -> Result<Vec<PersistedZone>> {
        let camera_id = camera_id.to_string();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction().context("failed to open zone transaction")?;

            // space_number -> (id, coordinates_json)
            let mut existing: HashMap<u32, (String, String)> = {
                let mut stmt = tx.prepare(
                    "SELECT space_number, id, coordinates_json FROM zones WHERE camera_id = ?1",
                )?;
                let mut rows = stmt.query(params![camera_id])?;
                let mut existing = HashMap::new();
                while let Some(row) = rows.next()? {
                    let number: i64 = row.get(0)?;
                    existing.insert(
                        space_number_from_sql(number)?,
                        (row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                    );
                }
                existing
            };

            for zone in &zones {
                let coordinates = coordinates_to_json(&zone.coordinates)?;
                match existing.remove(&zone.space_number) {
                    Some((id, stored)) if stored == coordinates => {
                        tx.execute(
                            "UPDATE zones SET name = ?1, updated_at = ?2 WHERE id = ?3",
                            params![zone.name, now, id],
                        )
                        .with_context(|| format!("failed to update space {}", zone.space_number))?;
                        continue;
                    }
                    Some((id, _)) => {
                        // zone_status goes with it (ON DELETE CASCADE)
                        tx.execute("DELETE FROM zones WHERE id = ?1", params![id])
                            .with_context(|| {
                                format!("failed to drop redrawn space {}", zone.space_number)
                            })?;
                    }
                    None => {}
                }

                tx.execute(
                    "INSERT INTO zones (id, camera_id, space_number, name, coordinates_json, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![
                        Uuid::new_v4().to_string(),
                        camera_id,
                        space_number_to_sql(zone.space_number),
                        zone.name,
                        coordinates,
                        now,
                    ],
                )
                .with_context(|| format!("failed to insert space {}", zone.space_number))?;
            }

            for (number, (id, _)) in &existing {
                tx.execute("DELETE FROM zones WHERE id = ?1", params![id])
                    .with_context(|| format!("failed to delete space {number}"))?;
            }

            let stored = query_zones(&tx, &camera_id)?;
            tx.commit().context("failed to commit zone replacement")?;
            Ok(stored)
        })
        .await
    }

    pub async fn get_zones(&self, camera_id: &str) -> Result<Vec<PersistedZone>> {
        let camera_id = camera_id.to_string();
        self.execute(move |conn| query_zones(conn, &camera_id)).await
    }

    pub async fn list_cameras(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT camera_id FROM zones ORDER BY camera_id ASC")?;
            let mut rows = stmt.query([])?;
            let mut cameras = Vec::new();
            while let Some(row) = rows.next()? {
                cameras.push(row.get(0)?);
            }
            Ok(cameras)
        })
        .await
    }
}

#[async_trait]
impl ZonePersistence for Database {
    async fn save_zones(
        &self,
        camera_id: &str,
        zones: Vec<ZoneSubmission>,
    ) -> Result<Vec<PersistedZone>> {
        self.replace_zones(camera_id, zones).await
    }

    async fn load_zones(&self, camera_id: &str) -> Result<Vec<PersistedZone>> {
        self.get_zones(camera_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::temp_database;
    use crate::geometry::Point;

    fn submission(n: u32) -> ZoneSubmission {
        ZoneSubmission {
            space_number: n,
            name: format!("Space {n}"),
            coordinates: vec![
                Point::new(10.0 * n as f64, 0.0),
                Point::new(10.0 * n as f64 + 5.0, 0.0),
                Point::new(10.0 * n as f64 + 5.0, 5.5),
            ],
        }
    }

    #[tokio::test]
    async fn saved_zones_round_trip_in_space_order() {
        let db = temp_database();
        let stored = db
            .replace_zones("cam-01", vec![submission(2), submission(1)])
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].space_number, 1);
        assert_eq!(stored[1].coordinates, submission(2).coordinates);
        assert!(stored.iter().all(|z| !z.is_occupied));

        assert_eq!(db.get_zones("cam-01").await.unwrap(), stored);
        assert!(db.get_zones("cam-02").await.unwrap().is_empty());
        assert_eq!(db.list_cameras().await.unwrap(), vec!["cam-01".to_string()]);
    }

    #[tokio::test]
    async fn replacing_keeps_ids_of_surviving_spaces() {
        let db = temp_database();
        let first = db
            .replace_zones("cam-01", vec![submission(1), submission(2)])
            .await
            .unwrap();

        let mut renamed = submission(2);
        renamed.name = "Corner".into();
        let second = db
            .replace_zones("cam-01", vec![renamed, submission(3)])
            .await
            .unwrap();

        assert_eq!(second.len(), 2);
        assert_eq!(second[0].id, first[1].id);
        assert_eq!(second[0].name, "Corner");
        assert_eq!(second[1].space_number, 3);
        assert!(second.iter().all(|z| z.id != first[0].id));
    }

    #[tokio::test]
    async fn redrawn_polygon_under_an_old_number_starts_fresh() {
        let db = temp_database();
        let first = db.replace_zones("cam-01", vec![submission(1)]).await.unwrap();
        db.record_detection(&first[0].id, true, Utc::now()).await.unwrap();

        // Cleared and redrawn: numbering restarts at 1 with a new polygon.
        let mut redrawn = submission(1);
        redrawn.coordinates = vec![
            Point::new(200.0, 200.0),
            Point::new(260.0, 200.0),
            Point::new(230.0, 250.0),
        ];
        let second = db.replace_zones("cam-01", vec![redrawn]).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_ne!(second[0].id, first[0].id);
        assert!(!second[0].is_occupied);
        let snapshot = db.camera_snapshot("cam-01").await.unwrap();
        assert_eq!(snapshot.occupied_spaces, 0);
        assert_eq!(snapshot.last_update, None);
    }

    #[tokio::test]
    async fn unchanged_polygon_keeps_its_detection_state() {
        let db = temp_database();
        let first = db.replace_zones("cam-01", vec![submission(1)]).await.unwrap();
        db.record_detection(&first[0].id, true, Utc::now()).await.unwrap();

        let second = db.replace_zones("cam-01", vec![submission(1)]).await.unwrap();
        assert_eq!(second[0].id, first[0].id);
        assert!(second[0].is_occupied);
    }

    #[tokio::test]
    async fn duplicate_space_numbers_are_rejected_atomically() {
        let db = temp_database();
        db.replace_zones("cam-01", vec![submission(1)]).await.unwrap();
        let result = db
            .replace_zones("cam-01", vec![submission(4), submission(4)])
            .await;
        assert!(result.is_err());

        let zones = db.get_zones("cam-01").await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].space_number, 1);
    }
}
