//! Opaque video stream capability: open by URL, grab, decode

use image::RgbImage;

use crate::StreamError;

/// Something that can open a decoded video session for a URL.
pub trait StreamSource: Send {
    fn open(&mut self, url: &str) -> Result<Box<dyn StreamSession>, StreamError>;
}

/// One live session. Dropping it releases the underlying connection.
///
/// Grabbing and decoding are separate so a caller with nowhere to put a
/// frame can keep the stream moving without paying for the decode.
pub trait StreamSession: Send {
    /// Advance to the next frame. May block on the network.
    fn grab(&mut self) -> Result<(), StreamError>;

    /// Decode the most recently grabbed frame.
    fn retrieve(&mut self) -> Result<RgbImage, StreamError>;
}

/// Routes `pattern://` URLs to the built-in generator and everything else
/// to the network backend, when one is compiled in.
pub struct DefaultSource {
    pattern: super::pattern::PatternSource,
    #[cfg(feature = "gstreamer-pipeline")]
    network: super::gst_capture::GstSource,
}

impl DefaultSource {
    pub fn new(width: u32, height: u32) -> Result<Self, StreamError> {
        Ok(Self {
            pattern: super::pattern::PatternSource::new(width, height),
            #[cfg(feature = "gstreamer-pipeline")]
            network: super::gst_capture::GstSource::new(width, height)?,
        })
    }
}

impl StreamSource for DefaultSource {
    fn open(&mut self, url: &str) -> Result<Box<dyn StreamSession>, StreamError> {
        if url.starts_with(super::pattern::SCHEME) {
            return self.pattern.open(url);
        }
        #[cfg(feature = "gstreamer-pipeline")]
        return self.network.open(url);

        #[cfg(not(feature = "gstreamer-pipeline"))]
        Err(StreamError::Open {
            url: url.to_owned(),
            reason: "built without the gstreamer-pipeline feature".into(),
        })
    }
}
