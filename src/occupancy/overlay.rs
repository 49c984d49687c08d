use serde::Serialize;

use crate::models::OccupancySnapshot;

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OverlayStatus {
    /// No camera is being polled.
    #[default]
    Idle,
    /// Polling started, nothing has arrived yet.
    Loading,
    Ready,
    /// The first fetch failed and there is nothing to show. Offers retry.
    Unavailable { message: String },
}

/// Identifies one fetch. Results apply only when both parts are still
/// current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTag {
    pub generation: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Snapshot replaced.
    Updated(OccupancySnapshot),
    /// Fetch failed; the previous snapshot (if any) stays.
    Failed { status_changed: bool },
    /// Result belongs to a stopped loop, another camera, or was overtaken by
    /// a newer fetch.
    Stale,
}

/// Overlay data for the camera currently being polled.
#[derive(Debug, Default)]
pub struct OverlayState {
    camera_id: Option<String>,
    generation: u64,
    next_sequence: u64,
    last_applied: u64,
    snapshot: Option<OccupancySnapshot>,
    status: OverlayStatus,
    last_error: Option<String>,
    consecutive_failures: u32,
}

impl OverlayState {
    pub fn camera_id(&self) -> Option<&str> {
        self.camera_id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> Option<&OccupancySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn status(&self) -> &OverlayStatus {
        &self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Switch to `camera_id`, dropping everything from the previous camera.
    /// Returns the new generation.
    pub fn begin(&mut self, camera_id: &str) -> u64 {
        self.generation += 1;
        self.camera_id = Some(camera_id.to_string());
        self.next_sequence = 0;
        self.last_applied = 0;
        self.snapshot = None;
        self.status = OverlayStatus::Loading;
        self.last_error = None;
        self.consecutive_failures = 0;
        self.generation
    }

    /// Stop accepting results for `generation`. A no-op when a newer
    /// generation has already taken over. The last snapshot stays readable.
    pub fn invalidate(&mut self, generation: u64) -> bool {
        if self.generation != generation {
            return false;
        }
        self.generation += 1;
        if self.snapshot.is_none() {
            self.status = OverlayStatus::Idle;
        }
        true
    }

    /// Reserve a sequence number for a fetch in `generation`.
    pub fn next_tag(&mut self, generation: u64) -> Option<FetchTag> {
        if generation != self.generation {
            return None;
        }
        self.next_sequence += 1;
        Some(FetchTag {
            generation,
            sequence: self.next_sequence,
        })
    }

    fn is_current(&self, tag: FetchTag) -> bool {
        tag.generation == self.generation && tag.sequence > self.last_applied
    }

    pub fn apply_success(&mut self, tag: FetchTag, snapshot: OccupancySnapshot) -> ApplyOutcome {
        if !self.is_current(tag) {
            return ApplyOutcome::Stale;
        }
        self.last_applied = tag.sequence;
        self.snapshot = Some(snapshot.clone());
        self.status = OverlayStatus::Ready;
        self.last_error = None;
        self.consecutive_failures = 0;
        ApplyOutcome::Updated(snapshot)
    }

    pub fn apply_failure(&mut self, tag: FetchTag, message: String) -> ApplyOutcome {
        if !self.is_current(tag) {
            return ApplyOutcome::Stale;
        }
        self.consecutive_failures += 1;
        self.last_error = Some(message.clone());

        let next_status = if self.snapshot.is_some() {
            OverlayStatus::Ready
        } else {
            OverlayStatus::Unavailable { message }
        };
        let status_changed = next_status != self.status;
        self.status = next_status;
        ApplyOutcome::Failed { status_changed }
    }
}
