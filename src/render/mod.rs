pub mod grid;
pub mod palette;
pub mod scene;

pub use grid::{occupancy_grid, GridCell, GridView};
pub use palette::{Palette, Rgba};
pub use scene::{editor_scene, occupancy_scene, Layer, Scene};
