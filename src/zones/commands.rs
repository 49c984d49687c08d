use serde::Deserialize;
use serde_json::{json, Value};

use crate::geometry::{DisplayRect, ScreenPoint};
use crate::models::PersistedZone;

use super::{controller::ZoneEditorController, reference_image::ImageSource};

/// Editor requests as they arrive from the host, one per operator action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EditorCommand {
    /// Load the image and whatever zones are already stored for the camera.
    Open { image: ImageSource },
    /// Load the image with an explicit zone set.
    Initialize {
        image: ImageSource,
        #[serde(default)]
        existing: Vec<PersistedZone>,
    },
    View,
    StartZone,
    AddPoint {
        screen: ScreenPoint,
        display: DisplayRect,
    },
    UndoLastPoint,
    CompleteZone,
    DiscardZone,
    DeleteZone { index: usize },
    DeleteZoneAt {
        screen: ScreenPoint,
        display: DisplayRect,
    },
    ClearAll {
        #[serde(default)]
        confirmed: bool,
    },
    Save,
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

pub async fn dispatch(
    editor: &ZoneEditorController,
    command: EditorCommand,
) -> Result<Value, String> {
    match command {
        EditorCommand::Open { image } => to_value(editor.open(image).await.map_err(|e| e.to_string())?),
        EditorCommand::Initialize { image, existing } => to_value(
            editor
                .initialize(image, existing)
                .await
                .map_err(|e| e.to_string())?,
        ),
        EditorCommand::View => to_value(editor.view().await),
        EditorCommand::StartZone => {
            to_value(editor.start_zone().await.map_err(|e| e.to_string())?)
        }
        EditorCommand::AddPoint { screen, display } => {
            let added = editor
                .add_point(screen, display)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({ "added": added }))
        }
        EditorCommand::UndoLastPoint => to_value(editor.undo_last_point().await),
        EditorCommand::CompleteZone => {
            to_value(editor.complete_zone().await.map_err(|e| e.to_string())?)
        }
        EditorCommand::DiscardZone => Ok(json!({ "discarded": editor.discard_zone().await })),
        EditorCommand::DeleteZone { index } => {
            to_value(editor.delete_zone(index).await.map_err(|e| e.to_string())?)
        }
        EditorCommand::DeleteZoneAt { screen, display } => to_value(
            editor
                .delete_zone_at(screen, display)
                .await
                .map_err(|e| e.to_string())?,
        ),
        EditorCommand::ClearAll { confirmed } => {
            to_value(editor.clear_all(confirmed).await.map_err(|e| e.to_string())?)
        }
        EditorCommand::Save => to_value(editor.save().await.map_err(|e| e.to_string())?),
    }
}
