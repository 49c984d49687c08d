use serde::{Deserialize, Serialize};

use crate::models::{OccupancySnapshot, OccupancySummary};

use super::palette::{Palette, Rgba};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub space_number: u32,
    pub occupied: bool,
    pub label: String,
    pub color: Rgba,
}

/// The per-space grid plus the always-visible summary line. `cells` is empty
/// when the snapshot carries no per-space list; hosts then show only the
/// numeric summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridView {
    pub cells: Vec<GridCell>,
    pub summary: OccupancySummary,
    pub percent_label: String,
    pub summary_only: bool,
}

pub fn occupancy_grid(snapshot: &OccupancySnapshot, palette: &Palette) -> GridView {
    let cells: Vec<GridCell> = snapshot
        .spaces
        .iter()
        .map(|space| GridCell {
            space_number: space.space_number,
            occupied: space.is_occupied,
            label: format!("P{}", space.space_number),
            color: if space.is_occupied {
                palette.occupied
            } else {
                palette.free
            },
        })
        .collect();

    let summary = snapshot.summary();
    GridView {
        summary_only: cells.is_empty(),
        cells,
        percent_label: summary.percent_label(),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpaceStatus;
    use crate::theme::Theme;

    #[test]
    fn one_cell_per_space_in_snapshot_order() {
        let palette = Palette::for_theme(Theme::Light);
        let snapshot = OccupancySnapshot {
            total_spaces: 3,
            occupied_spaces: 1,
            free_spaces: 2,
            spaces: vec![
                SpaceStatus { id: "x".into(), space_number: 3, is_occupied: false },
                SpaceStatus { id: "y".into(), space_number: 1, is_occupied: true },
                SpaceStatus { id: "z".into(), space_number: 2, is_occupied: false },
            ],
            ..Default::default()
        };

        let grid = occupancy_grid(&snapshot, &palette);
        assert!(!grid.summary_only);
        let labels: Vec<&str> = grid.cells.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["P3", "P1", "P2"]);
        assert_eq!(grid.cells[1].color, palette.occupied);
        assert_eq!(grid.cells[0].color, palette.free);
        assert_eq!(grid.percent_label, "33.3%");
    }

    #[test]
    fn falls_back_to_summary_without_spaces() {
        let palette = Palette::for_theme(Theme::Dark);
        let snapshot = OccupancySnapshot {
            total_spaces: 12,
            occupied_spaces: 5,
            free_spaces: 7,
            ..Default::default()
        };
        let grid = occupancy_grid(&snapshot, &palette);
        assert!(grid.summary_only);
        assert_eq!((grid.summary.total, grid.summary.occupied, grid.summary.free), (12, 5, 7));
        assert_eq!(grid.percent_label, "41.7%");
    }
}
