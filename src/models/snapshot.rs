use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-space state inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SpaceStatus {
    pub id: String,
    pub space_number: u32,
    pub is_occupied: bool,
}

/// Point-in-time occupancy for one camera, as reported by the status source.
///
/// Every field defaults when absent so a partial payload still renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OccupancySnapshot {
    pub total_spaces: u32,
    pub occupied_spaces: u32,
    pub free_spaces: u32,
    pub occupancy_rate: f64,
    pub spaces: Vec<SpaceStatus>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Counts the overlay actually displays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySummary {
    pub total: u32,
    pub occupied: u32,
    pub free: u32,
    pub percent: f64,
}

impl OccupancySummary {
    pub fn percent_label(&self) -> String {
        format!("{:.1}%", self.percent)
    }
}

impl OccupancySnapshot {
    /// Build a snapshot from per-space states, deriving every count.
    pub fn from_spaces(spaces: Vec<SpaceStatus>, last_update: DateTime<Utc>) -> Self {
        let total = u32::try_from(spaces.len()).unwrap_or(u32::MAX);
        let occupied = u32::try_from(spaces.iter().filter(|s| s.is_occupied).count())
            .unwrap_or(u32::MAX);
        Self {
            total_spaces: total,
            occupied_spaces: occupied,
            free_spaces: total - occupied,
            occupancy_rate: occupancy_percent(occupied, total),
            spaces,
            last_update: Some(last_update),
        }
    }

    /// Display counts, tolerant of collaborators that break
    /// `occupied + free == total`.
    ///
    /// Totals of zero with a non-empty `spaces` list are derived from the
    /// list; occupied is capped at total and free is recomputed whenever the
    /// reported numbers disagree.
    pub fn summary(&self) -> OccupancySummary {
        let (total, occupied) = if self.total_spaces == 0 && !self.spaces.is_empty() {
            let total = u32::try_from(self.spaces.len()).unwrap_or(u32::MAX);
            let occupied = u32::try_from(self.spaces.iter().filter(|s| s.is_occupied).count())
                .unwrap_or(u32::MAX);
            (total, occupied)
        } else {
            (self.total_spaces, self.occupied_spaces.min(self.total_spaces))
        };

        let free = if self.total_spaces != 0
            && occupied.saturating_add(self.free_spaces) == total
        {
            self.free_spaces
        } else {
            total - occupied
        };

        OccupancySummary {
            total,
            occupied,
            free,
            percent: occupancy_percent(occupied, total),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.occupied_spaces.checked_add(self.free_spaces) == Some(self.total_spaces)
    }
}

/// Occupancy percentage with one decimal (`5 / 12` is `41.7`).
/// Zero total yields zero.
pub fn occupancy_percent(occupied: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let tenths = (1000.0 * f64::from(occupied) / f64::from(total)).round();
    tenths / 10.0
}
