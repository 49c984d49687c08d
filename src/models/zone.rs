use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// A zone as the editor sees it: either the in-progress polygon or an entry
/// of the completed list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDraft {
    pub space_number: u32,
    pub name: String,
    pub coordinates: Vec<Point>,
    pub is_complete: bool,
}

impl ZoneDraft {
    pub fn default_name(space_number: u32) -> String {
        format!("Space {space_number}")
    }

    pub fn to_submission(&self) -> ZoneSubmission {
        ZoneSubmission {
            space_number: self.space_number,
            name: self.name.clone(),
            coordinates: self.coordinates.clone(),
        }
    }
}

/// The only shape the editor ever hands to persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSubmission {
    pub space_number: u32,
    pub name: String,
    pub coordinates: Vec<Point>,
}

/// A zone owned by the persistence side. `id` comes from the store and
/// `is_occupied` from detection; the editor never fills either in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedZone {
    pub id: String,
    pub space_number: u32,
    pub name: String,
    pub coordinates: Vec<Point>,
    #[serde(default)]
    pub is_occupied: bool,
}

impl From<&PersistedZone> for ZoneDraft {
    fn from(zone: &PersistedZone) -> Self {
        Self {
            space_number: zone.space_number,
            name: zone.name.clone(),
            coordinates: zone.coordinates.clone(),
            is_complete: true,
        }
    }
}
