pub mod snapshot;
pub mod zone;

pub use snapshot::{occupancy_percent, OccupancySnapshot, OccupancySummary, SpaceStatus};
pub use zone::{PersistedZone, ZoneDraft, ZoneSubmission};
