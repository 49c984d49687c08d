use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};
use uuid::Uuid;

use crate::models::{OccupancySnapshot, PersistedZone, ZoneSubmission};

use super::{OccupancyStatusSource, ZonePersistence};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process zone store.
#[derive(Default)]
pub struct MemoryZoneStore {
    zones: Mutex<HashMap<String, Vec<PersistedZone>>>,
    save_calls: AtomicUsize,
    reject_saves: AtomicBool,
}

impl MemoryZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zones(camera_id: &str, zones: Vec<PersistedZone>) -> Self {
        let store = Self::new();
        lock(&store.zones).insert(camera_id.to_string(), zones);
        store
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// While set, every save fails.
    pub fn set_reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl ZonePersistence for MemoryZoneStore {
    async fn save_zones(
        &self,
        camera_id: &str,
        zones: Vec<ZoneSubmission>,
    ) -> Result<Vec<PersistedZone>> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_saves.load(Ordering::SeqCst) {
            bail!("zone store rejected save for camera {camera_id}");
        }

        let stored: Vec<PersistedZone> = zones
            .into_iter()
            .map(|zone| PersistedZone {
                id: Uuid::new_v4().to_string(),
                space_number: zone.space_number,
                name: zone.name,
                coordinates: zone.coordinates,
                is_occupied: false,
            })
            .collect();
        lock(&self.zones).insert(camera_id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn load_zones(&self, camera_id: &str) -> Result<Vec<PersistedZone>> {
        Ok(lock(&self.zones)
            .get(camera_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// One scripted reply of a [`ScriptedStatusSource`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Snapshot(OccupancySnapshot),
    Failure(String),
}

#[derive(Default)]
struct CameraScript {
    replies: VecDeque<(Duration, ScriptedReply)>,
    fallback: Option<OccupancySnapshot>,
}

/// Status source that plays back queued replies per camera, optionally after
/// a delay. Once a camera's queue is empty it keeps answering with the last
/// snapshot it served, or fails if it never served one.
#[derive(Default)]
pub struct ScriptedStatusSource {
    scripts: Mutex<HashMap<String, CameraScript>>,
    fetches: Mutex<Vec<String>>,
}

impl ScriptedStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, camera_id: &str, delay: Duration, reply: ScriptedReply) {
        lock(&self.scripts)
            .entry(camera_id.to_string())
            .or_default()
            .replies
            .push_back((delay, reply));
    }

    pub fn push_snapshot(&self, camera_id: &str, snapshot: OccupancySnapshot) {
        self.push(camera_id, Duration::ZERO, ScriptedReply::Snapshot(snapshot));
    }

    pub fn push_failure(&self, camera_id: &str, message: &str) {
        self.push(
            camera_id,
            Duration::ZERO,
            ScriptedReply::Failure(message.to_string()),
        );
    }

    pub fn fetch_count(&self) -> usize {
        lock(&self.fetches).len()
    }

    pub fn fetches_for(&self, camera_id: &str) -> usize {
        lock(&self.fetches)
            .iter()
            .filter(|camera| camera.as_str() == camera_id)
            .count()
    }
}

#[async_trait]
impl OccupancyStatusSource for ScriptedStatusSource {
    async fn current_status(&self, camera_id: &str) -> Result<OccupancySnapshot> {
        lock(&self.fetches).push(camera_id.to_string());

        let next = lock(&self.scripts)
            .get_mut(camera_id)
            .and_then(|script| script.replies.pop_front());

        let reply = match next {
            Some((delay, reply)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply
            }
            None => {
                let fallback = lock(&self.scripts)
                    .get(camera_id)
                    .and_then(|script| script.fallback.clone());
                return fallback.ok_or_else(|| anyhow!("no status scripted for {camera_id}"));
            }
        };

        match reply {
            ScriptedReply::Snapshot(snapshot) => {
                lock(&self.scripts)
                    .entry(camera_id.to_string())
                    .or_default()
                    .fallback = Some(snapshot.clone());
                Ok(snapshot)
            }
            ScriptedReply::Failure(message) => Err(anyhow!(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[tokio::test]
    async fn zone_store_replaces_sets_and_counts_saves() {
        let store = MemoryZoneStore::new();
        let zone = ZoneSubmission {
            space_number: 1,
            name: "Space 1".into(),
            coordinates: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)],
        };

        let saved = store.save_zones("cam-01", vec![zone.clone()]).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].id.is_empty());
        assert_eq!(store.load_zones("cam-01").await.unwrap(), saved);
        assert!(store.load_zones("cam-02").await.unwrap().is_empty());

        store.set_reject_saves(true);
        assert!(store.save_zones("cam-01", vec![zone]).await.is_err());
        assert_eq!(store.save_calls(), 2);
        assert_eq!(store.load_zones("cam-01").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn scripted_source_replays_then_repeats_last_snapshot() {
        let source = ScriptedStatusSource::new();
        assert!(source.current_status("cam-01").await.is_err());

        let snapshot = OccupancySnapshot {
            total_spaces: 3,
            occupied_spaces: 1,
            free_spaces: 2,
            ..Default::default()
        };
        source.push_snapshot("cam-01", snapshot.clone());
        source.push_failure("cam-01", "boom");

        assert_eq!(source.current_status("cam-01").await.unwrap(), snapshot);
        assert!(source.current_status("cam-01").await.is_err());
        assert_eq!(source.current_status("cam-01").await.unwrap(), snapshot);
        assert_eq!(source.fetches_for("cam-01"), 4);
        assert_eq!(source.fetch_count(), 4);
    }
}
