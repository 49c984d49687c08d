use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::models::{occupancy_percent, OccupancySnapshot, OccupancySummary};

use super::loop_worker::SnapshotListener;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FleetTotals {
    pub cameras: usize,
    pub total: u32,
    pub occupied: u32,
    pub free: u32,
    pub percent: f64,
    pub per_camera: BTreeMap<String, OccupancySummary>,
}

/// Sums the latest summary of every camera it has heard about. A camera's
/// last summary stays after polling moves elsewhere, until [`forget`] drops it.
///
/// [`forget`]: FleetOccupancy::forget
#[derive(Default)]
pub struct FleetOccupancy {
    latest: Mutex<BTreeMap<String, OccupancySummary>>,
}

impl FleetOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forget(&self, camera_id: &str) {
        match self.latest.lock() {
            Ok(mut latest) => latest.remove(camera_id),
            Err(poisoned) => poisoned.into_inner().remove(camera_id),
        };
    }

    pub fn totals(&self) -> FleetTotals {
        let latest = match self.latest.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let total = latest.values().map(|s| s.total).sum();
        let occupied = latest.values().map(|s| s.occupied).sum();
        FleetTotals {
            cameras: latest.len(),
            total,
            occupied,
            free: latest.values().map(|s| s.free).sum(),
            percent: occupancy_percent(occupied, total),
            per_camera: latest,
        }
    }
}

impl SnapshotListener for FleetOccupancy {
    fn on_snapshot(&self, camera_id: &str, snapshot: &OccupancySnapshot) {
        let summary = snapshot.summary();
        match self.latest.lock() {
            Ok(mut latest) => latest.insert(camera_id.to_string(), summary),
            Err(poisoned) => poisoned.into_inner().insert(camera_id.to_string(), summary),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: u32, occupied: u32) -> OccupancySnapshot {
        OccupancySnapshot {
            total_spaces: total,
            occupied_spaces: occupied,
            free_spaces: total - occupied,
            ..Default::default()
        }
    }

    #[test]
    fn sums_latest_snapshot_per_camera() {
        let fleet = FleetOccupancy::new();
        fleet.on_snapshot("cam-01", &counts(12, 5));
        fleet.on_snapshot("cam-08", &counts(8, 1));
        fleet.on_snapshot("cam-08", &counts(8, 3));

        let totals = fleet.totals();
        assert_eq!(totals.cameras, 2);
        assert_eq!(totals.total, 20);
        assert_eq!(totals.occupied, 8);
        assert_eq!(totals.free, 12);
        assert_eq!(totals.percent, 40.0);

        fleet.forget("cam-01");
        assert_eq!(fleet.totals().total, 8);
    }

    #[test]
    fn empty_fleet_reports_zero_percent() {
        assert_eq!(FleetOccupancy::new().totals().percent, 0.0);
    }
}
