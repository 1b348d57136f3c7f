pub mod canvas;
pub mod compositor;

pub use compositor::{OverlayCompositor, OverlayRegion};
