use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    events::EventSink,
    geometry::ImageSize,
    models::{OccupancySnapshot, PersistedZone},
    render::{occupancy_grid, occupancy_scene, GridView, Palette, Scene},
    services::OccupancyStatusSource,
    settings::PollSettings,
    theme::ThemeHandle,
};

use super::{
    loop_worker::{lock_overlay, poll_loop, FetchContext, SnapshotListener},
    overlay::{OverlayState, OverlayStatus},
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayView {
    pub camera_id: Option<String>,
    pub status: OverlayStatus,
    pub snapshot: Option<OccupancySnapshot>,
    pub grid: Option<GridView>,
    pub last_error: Option<String>,
    pub can_retry: bool,
}

struct ActivePoll {
    generation: u64,
    cancel_token: CancellationToken,
    retry: Arc<Notify>,
}

/// Polls one camera's occupancy at a time. Clones share the overlay.
#[derive(Clone)]
pub struct OccupancyPoller {
    source: Arc<dyn OccupancyStatusSource>,
    overlay: Arc<Mutex<OverlayState>>,
    active: Arc<Mutex<Option<ActivePoll>>>,
    listeners: Arc<Mutex<Vec<Arc<dyn SnapshotListener>>>>,
    events: Arc<dyn EventSink>,
    theme: ThemeHandle,
    settings: Arc<Mutex<PollSettings>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl OccupancyPoller {
    pub fn new(
        source: Arc<dyn OccupancyStatusSource>,
        events: Arc<dyn EventSink>,
        theme: ThemeHandle,
        settings: PollSettings,
    ) -> Self {
        Self {
            source,
            overlay: Arc::new(Mutex::new(OverlayState::default())),
            active: Arc::new(Mutex::new(None)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            events,
            theme,
            settings: Arc::new(Mutex::new(settings)),
        }
    }

    /// Takes effect on the next `start`.
    pub fn set_settings(&self, settings: PollSettings) {
        *lock(&self.settings) = settings;
    }

    pub fn add_listener(&self, listener: Arc<dyn SnapshotListener>) {
        lock(&self.listeners).push(listener);
    }

    /// Begin polling `camera_id`: one fetch right away, then one per
    /// interval. Any loop already running is cancelled and its in-flight
    /// results will be ignored.
    pub fn start(&self, camera_id: &str) -> PollSubscription {
        let settings = *lock(&self.settings);
        let mut active = lock(&self.active);
        if let Some(previous) = active.take() {
            previous.cancel_token.cancel();
        }
        let generation = lock_overlay(&self.overlay).begin(camera_id);

        let cancel_token = CancellationToken::new();
        let retry = Arc::new(Notify::new());
        *active = Some(ActivePoll {
            generation,
            cancel_token: cancel_token.clone(),
            retry: retry.clone(),
        });

        let ctx = FetchContext {
            camera_id: Arc::from(camera_id),
            generation,
            fetch_timeout: settings.fetch_timeout(),
            source: self.source.clone(),
            overlay: self.overlay.clone(),
            events: self.events.clone(),
            listeners: self.listeners.clone(),
            theme: self.theme.clone(),
        };
        let handle = tokio::spawn(poll_loop(
            ctx,
            settings.interval(),
            retry,
            cancel_token.clone(),
        ));

        PollSubscription {
            camera_id: camera_id.to_string(),
            generation,
            cancel_token: Some(cancel_token),
            handle: Some(handle),
            overlay: self.overlay.clone(),
            active: self.active.clone(),
        }
    }

    /// Fetch now, outside the regular schedule. Returns `false` when nothing
    /// is being polled.
    pub fn retry_now(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(active) => {
                active.retry.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn snapshot(&self) -> Option<OccupancySnapshot> {
        lock_overlay(&self.overlay).snapshot().cloned()
    }

    pub fn status(&self) -> OverlayStatus {
        lock_overlay(&self.overlay).status().clone()
    }

    pub fn view(&self) -> OverlayView {
        let overlay = lock_overlay(&self.overlay);
        let palette = Palette::for_theme(self.theme.current());
        OverlayView {
            camera_id: overlay.camera_id().map(str::to_string),
            status: overlay.status().clone(),
            snapshot: overlay.snapshot().cloned(),
            grid: overlay
                .snapshot()
                .map(|snapshot| occupancy_grid(snapshot, &palette)),
            last_error: overlay.last_error().map(str::to_string),
            can_retry: matches!(overlay.status(), OverlayStatus::Unavailable { .. }),
        }
    }

    /// Zone polygons colored by the current snapshot.
    pub fn scene(&self, image: Option<ImageSize>, zones: &[PersistedZone]) -> Scene {
        let overlay = lock_overlay(&self.overlay);
        let palette = Palette::for_theme(self.theme.current());
        occupancy_scene(image, zones, overlay.snapshot(), &palette)
    }
}

/// Handle to a running poll loop. Stopping (or dropping) it cancels the
/// interval and invalidates any fetch still in flight.
pub struct PollSubscription {
    camera_id: String,
    generation: u64,
    cancel_token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
    overlay: Arc<Mutex<OverlayState>>,
    active: Arc<Mutex<Option<ActivePoll>>>,
}

impl PollSubscription {
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn is_active(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    fn invalidate(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        lock_overlay(&self.overlay).invalidate(self.generation);

        let mut active = lock(&self.active);
        if active
            .as_ref()
            .is_some_and(|current| current.generation == self.generation)
        {
            *active = None;
        }
    }

    pub async fn stop(mut self) -> Result<()> {
        self.invalidate();
        log_info!("stopping occupancy polling for camera {}", self.camera_id);
        match self.handle.take() {
            Some(handle) => handle.await.context("occupancy poll loop failed to join"),
            None => Ok(()),
        }
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.invalidate();
    }
}
