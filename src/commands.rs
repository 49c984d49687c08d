//! Host command surface. Each stdin line is one [`HostCommand`]; the reply
//! is a JSON value or an error string.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::{
    db::Database,
    events::{emit_event, EventSink, THEME_CHANGED},
    geometry::ImageSize,
    occupancy::{FleetOccupancy, MediaKind, OccupancyPoller, PollSubscription, StreamController},
    render::Palette,
    services::{OccupancyStatusSource, SimulatedStatusSource, ZonePersistence},
    settings::{EditorSettings, PollSettings, SettingsStore, StartZonePolicy},
    theme::{Theme, ThemeHandle, ThemePreference},
    zones::{
        commands::{dispatch as dispatch_editor, EditorCommand},
        ZoneEditorController,
    },
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Chance per tick that a simulated space changes state.
const SIMULATED_FLIP_PROBABILITY: f64 = 0.15;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostCommand {
    Editor {
        camera_id: String,
        request: EditorCommand,
    },
    ListCameras,
    LoadZones {
        camera_id: String,
    },
    RecordDetection {
        zone_id: String,
        is_occupied: bool,
    },
    StartPolling {
        camera_id: String,
    },
    StopPolling,
    RetryPoll,
    OverlayView,
    OverlayScene {
        camera_id: String,
        image: Option<ImageSize>,
    },
    FleetTotals,
    ForgetFleetCamera {
        camera_id: String,
    },
    LoadStream {
        url: String,
        kind: MediaKind,
    },
    StreamLoaded {
        load_id: u64,
    },
    StreamError {
        load_id: u64,
        message: String,
    },
    RetryStream,
    ToggleStream,
    StreamView,
    GetTheme,
    ToggleTheme,
    SetTheme {
        preference: ThemePreference,
    },
    UpdatePollSettings {
        poll: PollSettings,
    },
    SetStartZonePolicy {
        policy: StartZonePolicy,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThemeChangedEvent {
    theme: Theme,
    preference: ThemePreference,
    palette: Palette,
}

pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    pub theme: ThemeHandle,
    pub poller: OccupancyPoller,
    pub stream: StreamController,
    pub fleet: Arc<FleetOccupancy>,
    events: Arc<dyn EventSink>,
    zone_store: Arc<dyn ZonePersistence>,
    editors: Mutex<HashMap<String, ZoneEditorController>>,
    subscription: Mutex<Option<PollSubscription>>,
}

fn to_value<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

impl AppState {
    pub fn new(
        db: Database,
        settings: SettingsStore,
        events: Arc<dyn EventSink>,
        simulate: bool,
    ) -> Self {
        let theme = ThemeHandle::new(settings.theme(), Theme::system_default());
        let zone_store: Arc<dyn ZonePersistence> = Arc::new(db.clone());
        let source: Arc<dyn OccupancyStatusSource> = if simulate {
            log_info!("using simulated occupancy source");
            Arc::new(SimulatedStatusSource::new(
                zone_store.clone(),
                SIMULATED_FLIP_PROBABILITY,
            ))
        } else {
            Arc::new(db.clone())
        };

        let poller = OccupancyPoller::new(source, events.clone(), theme.clone(), settings.poll());
        let fleet = Arc::new(FleetOccupancy::new());
        poller.add_listener(fleet.clone());
        let stream = StreamController::new(settings.stream(), events.clone());

        Self {
            db,
            settings,
            theme,
            poller,
            stream,
            fleet,
            events,
            zone_store,
            editors: Mutex::new(HashMap::new()),
            subscription: Mutex::new(None),
        }
    }

    async fn editor(&self, camera_id: &str) -> ZoneEditorController {
        let mut editors = self.editors.lock().await;
        editors
            .entry(camera_id.to_string())
            .or_insert_with(|| {
                ZoneEditorController::new(
                    camera_id,
                    self.settings.editor().start_zone_policy,
                    self.zone_store.clone(),
                    self.events.clone(),
                    self.theme.clone(),
                )
            })
            .clone()
    }

    fn publish_theme(&self, preference: ThemePreference) -> Value {
        let theme = self.theme.current();
        let payload = ThemeChangedEvent {
            theme,
            preference,
            palette: Palette::for_theme(theme),
        };
        emit_event(&*self.events, THEME_CHANGED, &payload);
        json!({ "theme": theme, "preference": preference })
    }

    pub async fn handle(&self, command: HostCommand) -> Result<Value, String> {
        match command {
            HostCommand::Editor { camera_id, request } => {
                let editor = self.editor(&camera_id).await;
                dispatch_editor(&editor, request).await
            }
            HostCommand::ListCameras => {
                to_value(self.db.list_cameras().await.map_err(|e| e.to_string())?)
            }
            HostCommand::LoadZones { camera_id } => to_value(
                self.zone_store
                    .load_zones(&camera_id)
                    .await
                    .map_err(|e| e.to_string())?,
            ),
            HostCommand::RecordDetection {
                zone_id,
                is_occupied,
            } => {
                self.db
                    .record_detection(&zone_id, is_occupied, Utc::now())
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(Value::Null)
            }
            HostCommand::StartPolling { camera_id } => {
                let mut subscription = self.subscription.lock().await;
                let next = self.poller.start(&camera_id);
                if let Some(previous) = subscription.replace(next) {
                    previous.stop().await.map_err(|e| e.to_string())?;
                }
                Ok(json!({ "cameraId": camera_id }))
            }
            HostCommand::StopPolling => {
                let previous = self.subscription.lock().await.take();
                match previous {
                    Some(subscription) => {
                        subscription.stop().await.map_err(|e| e.to_string())?;
                        Ok(json!({ "stopped": true }))
                    }
                    None => Ok(json!({ "stopped": false })),
                }
            }
            HostCommand::RetryPoll => Ok(json!({ "retrying": self.poller.retry_now() })),
            HostCommand::OverlayView => to_value(self.poller.view()),
            HostCommand::OverlayScene { camera_id, image } => {
                let zones = self
                    .zone_store
                    .load_zones(&camera_id)
                    .await
                    .map_err(|e| e.to_string())?;
                to_value(self.poller.scene(image, &zones))
            }
            HostCommand::FleetTotals => to_value(self.fleet.totals()),
            HostCommand::ForgetFleetCamera { camera_id } => {
                self.fleet.forget(&camera_id);
                to_value(self.fleet.totals())
            }
            HostCommand::LoadStream { url, kind } => to_value(self.stream.load(&url, kind)),
            HostCommand::StreamLoaded { load_id } => {
                Ok(json!({ "accepted": self.stream.on_loaded(load_id) }))
            }
            HostCommand::StreamError { load_id, message } => {
                Ok(json!({ "accepted": self.stream.on_error(load_id, &message) }))
            }
            HostCommand::RetryStream => to_value(self.stream.retry()),
            HostCommand::ToggleStream => to_value(self.stream.toggle()),
            HostCommand::StreamView => to_value(self.stream.view()),
            HostCommand::GetTheme => Ok(json!({
                "theme": self.theme.current(),
                "preference": self.settings.theme(),
            })),
            HostCommand::ToggleTheme => {
                let preference = self.theme.toggle();
                self.settings
                    .update_theme(preference)
                    .map_err(|e| e.to_string())?;
                Ok(self.publish_theme(preference))
            }
            HostCommand::SetTheme { preference } => {
                self.theme.set_preference(preference);
                self.settings
                    .update_theme(preference)
                    .map_err(|e| e.to_string())?;
                Ok(self.publish_theme(preference))
            }
            HostCommand::UpdatePollSettings { poll } => {
                self.settings.update_poll(poll).map_err(|e| e.to_string())?;
                self.poller.set_settings(self.settings.poll());
                to_value(self.settings.poll())
            }
            HostCommand::SetStartZonePolicy { policy } => {
                self.settings
                    .update_editor(EditorSettings {
                        start_zone_policy: policy,
                    })
                    .map_err(|e| e.to_string())?;
                let editors: Vec<ZoneEditorController> =
                    self.editors.lock().await.values().cloned().collect();
                for editor in editors {
                    editor.set_policy(policy).await;
                }
                to_value(policy)
            }
        }
    }
}

/// Parse one input line and run it. The reply echoes the request's `id`.
pub async fn handle_line(state: &AppState, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => return json!({ "id": Value::Null, "ok": false, "error": format!("invalid JSON: {err}") }),
    };
    let id = request.get("id").cloned().unwrap_or(Value::Null);

    let command = match serde_json::from_value::<HostCommand>(request) {
        Ok(command) => command,
        Err(err) => return json!({ "id": id, "ok": false, "error": format!("invalid command: {err}") }),
    };

    match state.handle(command).await {
        Ok(result) => json!({ "id": id, "ok": true, "result": result }),
        Err(error) => json!({ "id": id, "ok": false, "error": error }),
    }
}
