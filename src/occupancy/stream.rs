use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    events::{emit_event, EventSink, STREAM_STATE_CHANGED},
    settings::StreamSettings,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Video,
    Image,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum StreamState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error { message: String },
}

/// What the host should put in the media element's `src`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamLoad {
    pub load_id: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamView {
    pub url: Option<String>,
    pub kind: Option<MediaKind>,
    pub load_id: u64,
    pub state: StreamState,
    pub reloads: u32,
}

#[derive(Default)]
struct StreamInner {
    base_url: Option<String>,
    kind: Option<MediaKind>,
    current_url: Option<String>,
    load_id: u64,
    reloads: u32,
    state: StreamState,
    autoplay: Option<CancellationToken>,
}

impl StreamInner {
    fn cancel_autoplay(&mut self) {
        if let Some(token) = self.autoplay.take() {
            token.cancel();
        }
    }

    fn view(&self) -> StreamView {
        StreamView {
            url: self.current_url.clone(),
            kind: self.kind,
            load_id: self.load_id,
            state: self.state.clone(),
            reloads: self.reloads,
        }
    }
}

/// Lifecycle of the camera stream element shown under the overlay.
///
/// The host reports load outcomes tagged with the `load_id` it was given;
/// reports for anything but the newest load are ignored. Independent of the
/// occupancy poller.
#[derive(Clone)]
pub struct StreamController {
    inner: Arc<Mutex<StreamInner>>,
    settings: StreamSettings,
    events: Arc<dyn EventSink>,
}

/// Appends a cache-busting query parameter so the element really refetches.
fn cache_busted(url: &str, reload: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{separator}t={}-{reload}",
        chrono::Utc::now().timestamp_millis()
    )
}

impl StreamController {
    pub fn new(settings: StreamSettings, events: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StreamInner::default())),
            settings,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, inner: &StreamInner) {
        emit_event(&*self.events, STREAM_STATE_CHANGED, &inner.view());
    }

    pub fn state(&self) -> StreamState {
        self.lock().state.clone()
    }

    pub fn view(&self) -> StreamView {
        self.lock().view()
    }

    /// Point the element at a new source.
    pub fn load(&self, url: &str, kind: MediaKind) -> StreamLoad {
        let mut inner = self.lock();
        inner.cancel_autoplay();
        inner.base_url = Some(url.to_string());
        inner.kind = Some(kind);
        inner.current_url = Some(url.to_string());
        inner.reloads = 0;
        inner.load_id += 1;
        inner.state = StreamState::Loading;
        log_info!("loading stream {url} ({kind:?}), load #{}", inner.load_id);
        self.publish(&inner);
        StreamLoad {
            load_id: inner.load_id,
            url: url.to_string(),
        }
    }

    /// Force a fresh load of the current source. `None` when nothing was
    /// ever loaded.
    pub fn retry(&self) -> Option<StreamLoad> {
        let mut inner = self.lock();
        let base = inner.base_url.clone()?;
        inner.cancel_autoplay();
        inner.reloads += 1;
        let url = cache_busted(&base, inner.reloads);
        inner.current_url = Some(url.clone());
        inner.load_id += 1;
        inner.state = StreamState::Loading;
        log_info!("reloading stream, attempt {}", inner.reloads);
        self.publish(&inner);
        Some(StreamLoad {
            load_id: inner.load_id,
            url,
        })
    }

    /// The element finished loading. Images show right away; video waits for
    /// the autoplay grace period and then starts unless the operator has
    /// already interacted.
    pub fn on_loaded(&self, load_id: u64) -> bool {
        let mut inner = self.lock();
        if load_id != inner.load_id || inner.state != StreamState::Loading {
            log_debug!("ignoring load event for superseded stream load #{load_id}");
            return false;
        }

        match inner.kind {
            Some(MediaKind::Video) if self.settings.autoplay => {
                inner.state = StreamState::Paused;
                let token = CancellationToken::new();
                inner.autoplay = Some(token.clone());
                tokio::spawn(autoplay_after_grace(self.clone(), load_id, token));
            }
            Some(MediaKind::Video) => inner.state = StreamState::Paused,
            _ => inner.state = StreamState::Playing,
        }
        self.publish(&inner);
        true
    }

    pub fn on_error(&self, load_id: u64, message: &str) -> bool {
        let mut inner = self.lock();
        if load_id != inner.load_id {
            log_debug!("ignoring error for superseded stream load #{load_id}");
            return false;
        }
        log_warn!("stream load #{load_id} failed: {message}");
        inner.cancel_autoplay();
        inner.state = StreamState::Error {
            message: message.to_string(),
        };
        self.publish(&inner);
        true
    }

    /// Play/pause on click. Does nothing while loading or in error.
    pub fn toggle(&self) -> StreamState {
        let mut inner = self.lock();
        let next = match inner.state {
            StreamState::Playing => StreamState::Paused,
            StreamState::Paused => StreamState::Playing,
            _ => return inner.state.clone(),
        };
        inner.cancel_autoplay();
        inner.state = next.clone();
        self.publish(&inner);
        next
    }

    fn autoplay(&self, load_id: u64) {
        let mut inner = self.lock();
        inner.autoplay = None;
        if inner.load_id == load_id && inner.state == StreamState::Paused {
            inner.state = StreamState::Playing;
            log_debug!("autoplay started for stream load #{load_id}");
            self.publish(&inner);
        }
    }
}

async fn autoplay_after_grace(
    stream: StreamController,
    load_id: u64,
    cancel_token: CancellationToken,
) {
    let grace = stream.settings.autoplay_grace();
    tokio::select! {
        _ = cancel_token.cancelled() => {}
        _ = tokio::time::sleep(grace) => stream.autoplay(load_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventSink;
    use std::time::Duration;

    fn stream() -> (StreamController, Arc<MemoryEventSink>) {
        let events = Arc::new(MemoryEventSink::new());
        (
            StreamController::new(StreamSettings::default(), events.clone()),
            events,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn video_autoplays_after_grace() {
        let (stream, events) = stream();
        let load = stream.load("http://cam/live.mp4", MediaKind::Video);
        assert_eq!(stream.state(), StreamState::Loading);

        assert!(stream.on_loaded(load.load_id));
        assert_eq!(stream.state(), StreamState::Paused);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(stream.state(), StreamState::Playing);
        assert_eq!(events.count(STREAM_STATE_CHANGED), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn operator_click_during_grace_wins() {
        let (stream, _events) = stream();
        let load = stream.load("http://cam/live.mp4", MediaKind::Video);
        stream.on_loaded(load.load_id);

        assert_eq!(stream.toggle(), StreamState::Playing);
        assert_eq!(stream.toggle(), StreamState::Paused);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(stream.state(), StreamState::Paused);
    }

    #[tokio::test]
    async fn image_plays_on_load_and_errors_retry_with_fresh_url() {
        let (stream, _events) = stream();
        let first = stream.load("http://cam/snapshot.jpg?size=l", MediaKind::Image);

        assert!(stream.on_error(first.load_id, "404"));
        assert_eq!(stream.toggle(), StreamState::Error { message: "404".into() });

        let retry = stream.retry().unwrap();
        assert!(retry.load_id > first.load_id);
        assert!(retry.url.starts_with("http://cam/snapshot.jpg?size=l&t="));
        assert_eq!(stream.state(), StreamState::Loading);

        // Late events from the failed load do nothing.
        assert!(!stream.on_loaded(first.load_id));
        assert!(!stream.on_error(first.load_id, "late"));

        assert!(stream.on_loaded(retry.load_id));
        assert_eq!(stream.state(), StreamState::Playing);
        assert_eq!(stream.view().reloads, 1);
    }

    #[tokio::test]
    async fn retry_without_source_and_toggle_while_loading() {
        let (stream, _events) = stream();
        assert!(stream.retry().is_none());
        stream.load("http://cam/live.mp4", MediaKind::Video);
        assert_eq!(stream.toggle(), StreamState::Loading);
    }
}
