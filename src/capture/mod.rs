pub mod frame;
#[cfg(feature = "gstreamer-pipeline")]
pub mod gst_capture;
pub mod pattern;
pub mod reader;
pub mod source;

pub use frame::{Frame, FrameMetadata, PixelFormat};
#[cfg(feature = "gstreamer-pipeline")]
pub use gst_capture::GstSource;
pub use pattern::PatternSource;
pub use reader::{ReaderState, ReaderTiming, StreamReader};
pub use source::{DefaultSource, StreamSession, StreamSource};
