//! Animated AR overlay: marker geometry, motion, painting and the frame loop.

pub mod driver;
pub mod geometry;
pub mod motion;
pub mod raster;
pub mod renderer;
pub mod scheduler;
pub mod surface;

pub use driver::{FrameOutcome, OverlayDriver, TimelineConfig};
pub use geometry::Viewport;
pub use raster::RasterSurface;
pub use scheduler::{FrameClock, QueuedScheduler, StepClock};
pub use surface::OverlaySurface;
