pub mod aggregate;
pub mod controller;
pub mod loop_worker;
pub mod overlay;
pub mod stream;

pub use aggregate::{FleetOccupancy, FleetTotals};
pub use controller::{OccupancyPoller, OverlayView, PollSubscription};
pub use loop_worker::SnapshotListener;
pub use overlay::OverlayStatus;
pub use stream::{MediaKind, StreamController, StreamLoad, StreamState, StreamView};
