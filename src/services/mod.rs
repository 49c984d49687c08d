//! Collaborators the editor and poller talk to.
//!
//! The components only see these traits. The SQLite [`crate::db::Database`]
//! implements both; [`memory`] and [`simulated`] provide stand-ins.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{OccupancySnapshot, PersistedZone, ZoneSubmission};

pub mod memory;
pub mod simulated;

pub use memory::{MemoryZoneStore, ScriptedReply, ScriptedStatusSource};
pub use simulated::SimulatedStatusSource;

/// Durable storage for a camera's zone set.
#[async_trait]
pub trait ZonePersistence: Send + Sync + 'static {
    /// Replaces the camera's zone set with `zones` and returns what was stored.
    async fn save_zones(
        &self,
        camera_id: &str,
        zones: Vec<ZoneSubmission>,
    ) -> Result<Vec<PersistedZone>>;

    async fn load_zones(&self, camera_id: &str) -> Result<Vec<PersistedZone>>;
}

/// Source of live occupancy. Must be cheap and side-effect free, it is
/// called on every poll tick.
#[async_trait]
pub trait OccupancyStatusSource: Send + Sync + 'static {
    async fn current_status(&self, camera_id: &str) -> Result<OccupancySnapshot>;
}
