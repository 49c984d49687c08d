pub mod commands;
pub mod controller;
pub mod error;
pub mod reference_image;
pub mod state;

pub use controller::ZoneEditorController;
pub use error::EditorError;
pub use reference_image::ImageSource;
pub use state::{EditorMode, EditorState, EditorView, MIN_ZONE_POINTS};
