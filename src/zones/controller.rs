use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    events::{emit_event, EventSink, ZONES_CHANGED, ZONES_SAVED},
    geometry::{DisplayRect, ImageSize, Point, ScreenPoint, SurfaceTransform},
    models::{PersistedZone, ZoneDraft},
    render::Palette,
    services::ZonePersistence,
    settings::StartZonePolicy,
    theme::ThemeHandle,
};

use super::{
    error::EditorError,
    reference_image::{load_image_size, ImageSource},
    state::{EditorState, EditorView},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct ZonesChangedEvent<'a> {
    camera_id: &'a str,
    view: EditorView,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct ZonesSavedEvent<'a> {
    camera_id: &'a str,
    zones: &'a [PersistedZone],
}

/// Editor for one camera's zone set. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ZoneEditorController {
    camera_id: Arc<str>,
    state: Arc<Mutex<EditorState>>,
    persistence: Arc<dyn ZonePersistence>,
    events: Arc<dyn EventSink>,
    theme: ThemeHandle,
    load_generation: Arc<AtomicU64>,
}

impl ZoneEditorController {
    pub fn new(
        camera_id: &str,
        policy: StartZonePolicy,
        persistence: Arc<dyn ZonePersistence>,
        events: Arc<dyn EventSink>,
        theme: ThemeHandle,
    ) -> Self {
        Self {
            camera_id: Arc::from(camera_id),
            state: Arc::new(Mutex::new(EditorState::new(policy))),
            persistence,
            events,
            theme,
            load_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Load the reference image and seed the editor with `existing` zones.
    ///
    /// If another initialize starts before this one's image finishes
    /// decoding, this result is dropped and the newer load wins.
    pub async fn initialize(
        &self,
        image: ImageSource,
        existing: Vec<PersistedZone>,
    ) -> Result<ImageSize, EditorError> {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let loaded = load_image_size(image).await;

        let mut state = self.state.lock().await;
        if self.load_generation.load(Ordering::SeqCst) != generation {
            log_debug!("discarding superseded image load for camera {}", self.camera_id);
            return match loaded {
                Ok(size) => Ok(size),
                Err(err) => Err(EditorError::ImageLoadFailed {
                    message: err.to_string(),
                }),
            };
        }

        match loaded {
            Ok(size) => {
                state.load(size, &existing);
                log_info!(
                    "editor ready for camera {}: {}x{} image, {} existing zones, next space {}",
                    self.camera_id,
                    size.width,
                    size.height,
                    existing.len(),
                    state.next_space_number()
                );
                self.emit_changed(&state);
                Ok(size)
            }
            Err(err) => {
                log_error!("reference image for camera {} failed to load: {err:#}", self.camera_id);
                state.unload();
                self.emit_changed(&state);
                Err(EditorError::ImageLoadFailed {
                    message: err.to_string(),
                })
            }
        }
    }

    /// Initialize with whatever zones persistence already holds for the
    /// camera. A failed lookup starts from an empty set.
    pub async fn open(&self, image: ImageSource) -> Result<ImageSize, EditorError> {
        let existing = match self.persistence.load_zones(&self.camera_id).await {
            Ok(zones) => zones,
            Err(err) => {
                log_warn!(
                    "could not load existing zones for camera {}: {err:#}",
                    self.camera_id
                );
                Vec::new()
            }
        };
        self.initialize(image, existing).await
    }

    pub async fn set_policy(&self, policy: StartZonePolicy) {
        self.state.lock().await.set_policy(policy);
    }

    pub async fn view(&self) -> EditorView {
        let state = self.state.lock().await;
        state.view(&self.palette())
    }

    pub async fn start_zone(&self) -> Result<EditorView, EditorError> {
        let mut state = self.state.lock().await;
        state.start_zone()?;
        Ok(self.emit_changed(&state))
    }

    /// Add a click to the draft. `Ok(false)` means the click was ignored
    /// because no zone is being drawn.
    pub async fn add_point(
        &self,
        screen: ScreenPoint,
        display: DisplayRect,
    ) -> Result<bool, EditorError> {
        let mut state = self.state.lock().await;
        let image = state.image().ok_or(EditorError::ImageNotLoaded)?;
        if !state.is_drawing() {
            return Ok(false);
        }
        let transform = SurfaceTransform::new(image, display).ok_or(EditorError::InvalidSurface)?;
        let point = transform.to_image(screen);
        state.add_point(point);
        log_debug!(
            "camera {}: point {} at ({:.1}, {:.1})",
            self.camera_id,
            state.draft_points().len(),
            point.x,
            point.y
        );
        self.emit_changed(&state);
        Ok(true)
    }

    pub async fn undo_last_point(&self) -> Option<Point> {
        let mut state = self.state.lock().await;
        let removed = state.undo_last_point();
        if removed.is_some() {
            self.emit_changed(&state);
        }
        removed
    }

    pub async fn complete_zone(&self) -> Result<ZoneDraft, EditorError> {
        let mut state = self.state.lock().await;
        let zone = state.complete_zone()?;
        log_info!(
            "camera {}: completed space {} with {} points",
            self.camera_id,
            zone.space_number,
            zone.coordinates.len()
        );
        self.emit_changed(&state);
        Ok(zone)
    }

    pub async fn discard_zone(&self) -> bool {
        let mut state = self.state.lock().await;
        let discarded = state.discard_zone();
        if discarded {
            self.emit_changed(&state);
        }
        discarded
    }

    pub async fn delete_zone(&self, index: usize) -> Result<ZoneDraft, EditorError> {
        let mut state = self.state.lock().await;
        let zone = state.delete_zone(index)?;
        log_info!("camera {}: deleted space {}", self.camera_id, zone.space_number);
        self.emit_changed(&state);
        Ok(zone)
    }

    /// Delete whichever completed zone lies under a click.
    pub async fn delete_zone_at(
        &self,
        screen: ScreenPoint,
        display: DisplayRect,
    ) -> Result<Option<ZoneDraft>, EditorError> {
        let mut state = self.state.lock().await;
        let image = state.image().ok_or(EditorError::ImageNotLoaded)?;
        let transform = SurfaceTransform::new(image, display).ok_or(EditorError::InvalidSurface)?;
        let Some(index) = state.zone_at(&transform.to_image(screen)) else {
            return Ok(None);
        };
        let zone = state.delete_zone(index)?;
        self.emit_changed(&state);
        Ok(Some(zone))
    }

    pub async fn clear_all(&self, confirmed: bool) -> Result<EditorView, EditorError> {
        let mut state = self.state.lock().await;
        state.clear_all(confirmed)?;
        log_info!("camera {}: cleared all zones", self.camera_id);
        Ok(self.emit_changed(&state))
    }

    /// Hand the completed zones to persistence. The editor is left exactly
    /// as it was whether the save succeeds or not.
    pub async fn save(&self) -> Result<Vec<PersistedZone>, EditorError> {
        let payload = {
            let state = self.state.lock().await;
            state.save_payload()?
        };
        let count = payload.len();

        match self.persistence.save_zones(&self.camera_id, payload).await {
            Ok(stored) => {
                log_info!("camera {}: saved {} zones", self.camera_id, count);
                emit_event(
                    &*self.events,
                    ZONES_SAVED,
                    &ZonesSavedEvent {
                        camera_id: &self.camera_id,
                        zones: &stored,
                    },
                );
                Ok(stored)
            }
            Err(err) => {
                log_error!("camera {}: saving {} zones failed: {err:#}", self.camera_id, count);
                Err(EditorError::SaveFailed)
            }
        }
    }

    fn palette(&self) -> Palette {
        Palette::for_theme(self.theme.current())
    }

    fn emit_changed(&self, state: &EditorState) -> EditorView {
        let view = state.view(&self.palette());
        emit_event(
            &*self.events,
            ZONES_CHANGED,
            &ZonesChangedEvent {
                camera_id: &self.camera_id,
                view: view.clone(),
            },
        );
        view
    }
}
