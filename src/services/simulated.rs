use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::models::{OccupancySnapshot, SpaceStatus};

use super::{OccupancyStatusSource, ZonePersistence};

/// Demo status source: reads the camera's zones from a persistence
/// collaborator and randomly flips a few of them per call.
pub struct SimulatedStatusSource {
    zones: Arc<dyn ZonePersistence>,
    flip_probability: f64,
    rng: Mutex<StdRng>,
    /// Per camera, the simulated state of each zone id it returned last.
    occupancy: Mutex<HashMap<String, HashMap<String, bool>>>,
}

impl SimulatedStatusSource {
    pub fn new(zones: Arc<dyn ZonePersistence>, flip_probability: f64) -> Self {
        Self::with_rng(zones, flip_probability, StdRng::from_entropy())
    }

    pub fn seeded(zones: Arc<dyn ZonePersistence>, flip_probability: f64, seed: u64) -> Self {
        Self::with_rng(zones, flip_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(zones: Arc<dyn ZonePersistence>, flip_probability: f64, rng: StdRng) -> Self {
        Self {
            zones,
            flip_probability: flip_probability.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
            occupancy: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OccupancyStatusSource for SimulatedStatusSource {
    async fn current_status(&self, camera_id: &str) -> Result<OccupancySnapshot> {
        let zones = self.zones.load_zones(camera_id).await?;

        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut occupancy = match self.occupancy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Rebuilt from this call's zones so deleted ids are dropped.
        let previous = occupancy.remove(camera_id).unwrap_or_default();
        let mut current = HashMap::with_capacity(zones.len());
        let spaces = zones
            .iter()
            .map(|zone| {
                let mut state = previous.get(&zone.id).copied().unwrap_or(zone.is_occupied);
                if rng.gen_bool(self.flip_probability) {
                    state = !state;
                }
                current.insert(zone.id.clone(), state);
                SpaceStatus {
                    id: zone.id.clone(),
                    space_number: zone.space_number,
                    is_occupied: state,
                }
            })
            .collect();
        occupancy.insert(camera_id.to_string(), current);

        Ok(OccupancySnapshot::from_spaces(spaces, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::models::ZoneSubmission;
    use crate::services::MemoryZoneStore;

    async fn store_with_zones(count: u32) -> Arc<MemoryZoneStore> {
        let store = Arc::new(MemoryZoneStore::new());
        let zones = (1..=count)
            .map(|n| ZoneSubmission {
                space_number: n,
                name: format!("Space {n}"),
                coordinates: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
            })
            .collect();
        store.save_zones("cam-01", zones).await.unwrap();
        store
    }

    #[tokio::test]
    async fn snapshot_covers_every_stored_zone() {
        let store = store_with_zones(4).await;
        let source = SimulatedStatusSource::seeded(store, 0.5, 7);

        let snapshot = source.current_status("cam-01").await.unwrap();
        assert_eq!(snapshot.total_spaces, 4);
        assert!(snapshot.is_consistent());
        let numbers: Vec<u32> = snapshot.spaces.iter().map(|s| s.space_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert!(snapshot.last_update.is_some());
    }

    #[tokio::test]
    async fn zero_probability_keeps_detected_state() {
        let store = store_with_zones(3).await;
        let source = SimulatedStatusSource::seeded(store, 0.0, 1);
        for _ in 0..3 {
            let snapshot = source.current_status("cam-01").await.unwrap();
            assert_eq!(snapshot.occupied_spaces, 0);
        }
    }

    #[tokio::test]
    async fn full_probability_flips_every_call() {
        let store = store_with_zones(2).await;
        let source = SimulatedStatusSource::seeded(store, 1.0, 1);
        assert_eq!(source.current_status("cam-01").await.unwrap().occupied_spaces, 2);
        assert_eq!(source.current_status("cam-01").await.unwrap().occupied_spaces, 0);
    }

    fn tracked_ids(source: &SimulatedStatusSource, camera_id: &str) -> Vec<String> {
        let occupancy = source.occupancy.lock().unwrap();
        let mut ids: Vec<String> = occupancy
            .get(camera_id)
            .map(|zones| zones.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn deleted_zones_are_no_longer_tracked() {
        let store = store_with_zones(3).await;
        let source = SimulatedStatusSource::seeded(store.clone(), 0.5, 3);
        source.current_status("cam-01").await.unwrap();
        assert_eq!(tracked_ids(&source, "cam-01").len(), 3);

        let cam_08 = vec![ZoneSubmission {
            space_number: 1,
            name: "Bay 1".into(),
            coordinates: vec![Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(0.0, 2.0)],
        }];
        store.save_zones("cam-08", cam_08).await.unwrap();
        source.current_status("cam-08").await.unwrap();

        let kept = store.load_zones("cam-01").await.unwrap().remove(0);
        let shrunk = vec![ZoneSubmission {
            space_number: kept.space_number,
            name: kept.name.clone(),
            coordinates: kept.coordinates.clone(),
        }];
        store.save_zones("cam-01", shrunk).await.unwrap();
        let snapshot = source.current_status("cam-01").await.unwrap();

        assert_eq!(snapshot.total_spaces, 1);
        let current: Vec<String> = store
            .load_zones("cam-01")
            .await
            .unwrap()
            .into_iter()
            .map(|zone| zone.id)
            .collect();
        assert_eq!(tracked_ids(&source, "cam-01"), current);
        assert_eq!(tracked_ids(&source, "cam-08").len(), 1);
    }
}
