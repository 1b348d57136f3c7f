//! GStreamer-backed network streams (RTSP over TCP, or anything uridecodebin plays)

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{debug, info, instrument, warn};

use super::source::{StreamSession, StreamSource};
use crate::StreamError;

/// How long a grab may wait for the next sample before the stream is
/// considered lost
const GRAB_TIMEOUT_SECS: u64 = 10;
const STARTUP_TIMEOUT_SECS: u64 = 5;

pub struct GstSource {
    width: u32,
    height: u32,
}

impl GstSource {
    pub fn new(width: u32, height: u32) -> Result<Self, StreamError> {
        gst::init().map_err(|e| StreamError::Open {
            url: String::new(),
            reason: format!("failed to initialize GStreamer: {e}"),
        })?;
        Ok(Self { width, height })
    }

    /// Build the decode pipeline string for `url`. RTSP is forced onto TCP
    /// with no jitter buffer; the sink keeps a single buffer and drops the
    /// rest so the newest frame always wins.
    pub fn pipeline_string(url: &str, width: u32, height: u32) -> String {
        let source = if url.starts_with("rtsp://") || url.starts_with("rtsps://") {
            format!("rtspsrc location={url} protocols=tcp latency=0 ! decodebin")
        } else {
            format!("uridecodebin uri={url}")
        };
        format!(
            "{source} ! \
             videoconvert ! \
             videoscale ! \
             video/x-raw,format=RGB,width={width},height={height} ! \
             appsink name=appsink max-buffers=1 drop=true sync=false"
        )
    }
}

fn open_error(url: &str, reason: impl std::fmt::Display) -> StreamError {
    StreamError::Open {
        url: url.to_owned(),
        reason: reason.to_string(),
    }
}

impl StreamSource for GstSource {
    #[instrument(skip(self))]
    fn open(&mut self, url: &str) -> Result<Box<dyn StreamSession>, StreamError> {
        let pipeline_str = Self::pipeline_string(url, self.width, self.height);
        debug!("Pipeline: {}", pipeline_str);

        let pipeline = gst::parse::launch(&pipeline_str)
            .map_err(|e| open_error(url, e))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| open_error(url, "not a pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| open_error(url, "failed to find appsink element"))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| open_error(url, "failed to cast to AppSink"))?;

        let session = GstSession {
            pipeline,
            appsink,
            sample: None,
        };
        session.start().map_err(|reason| open_error(url, reason))?;
        info!("Stream opened: {}", url);
        Ok(Box::new(session))
    }
}

struct GstSession {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    sample: Option<gst::Sample>,
}

impl GstSession {
    fn start(&self) -> Result<(), String> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| format!("failed to start pipeline: {e:?}"))?;

        let (state_change, _, _) = self
            .pipeline
            .state(Some(gst::ClockTime::from_seconds(STARTUP_TIMEOUT_SECS)));
        match state_change {
            Ok(gst::StateChangeSuccess::Success)
            | Ok(gst::StateChangeSuccess::Async)
            | Ok(gst::StateChangeSuccess::NoPreroll) => Ok(()),
            Err(e) => Err(format!("pipeline failed to start: {e:?}")),
        }
    }

    /// Pending error message from the bus, if any
    fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let message = bus.pop_filtered(&[gst::MessageType::Error])?;
        match message.view() {
            gst::MessageView::Error(err) => Some(err.error().to_string()),
            _ => None,
        }
    }
}

impl StreamSession for GstSession {
    fn grab(&mut self) -> Result<(), StreamError> {
        let sample = self
            .appsink
            .try_pull_sample(gst::ClockTime::from_seconds(GRAB_TIMEOUT_SECS));
        match sample {
            Some(sample) => {
                self.sample = Some(sample);
                Ok(())
            }
            None if self.appsink.is_eos() => Err(StreamError::EndOfStream),
            None => Err(StreamError::Grab(
                self.bus_error().unwrap_or_else(|| "timed out waiting for a frame".into()),
            )),
        }
    }

    fn retrieve(&mut self) -> Result<RgbImage, StreamError> {
        let sample = self
            .sample
            .take()
            .ok_or_else(|| StreamError::Decode("no frame grabbed".into()))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| StreamError::Decode("sample contains no buffer".into()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| StreamError::Decode("sample has no caps".into()))?;
        let video_info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| StreamError::Decode(format!("failed to parse video info: {e}")))?;
        let map = buffer
            .map_readable()
            .map_err(|_| StreamError::Decode("failed to map buffer".into()))?;

        let (width, height) = (video_info.width(), video_info.height());
        let stride = video_info.stride()[0] as usize;
        let row_len = width as usize * 3;
        let data = map.as_slice();
        if height == 0 || stride < row_len || data.len() < stride * (height as usize - 1) + row_len {
            return Err(StreamError::Decode(format!(
                "buffer of {} bytes too small for {}x{} stride {}",
                data.len(),
                width,
                height,
                stride
            )));
        }

        // rows are padded to the stride, repack them tightly
        let mut rgb = Vec::with_capacity(row_len * height as usize);
        for row in data.chunks(stride).take(height as usize) {
            rgb.extend_from_slice(&row[..row_len]);
        }
        RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| StreamError::Decode("frame size mismatch".into()))
    }
}

impl Drop for GstSession {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop pipeline: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtsp_urls_use_tcp_transport() {
        let s = GstSource::pipeline_string("rtsp://10.0.0.2:554/stream1", 800, 480);
        assert!(s.starts_with("rtspsrc location=rtsp://10.0.0.2:554/stream1 protocols=tcp latency=0"));
        assert!(s.contains("width=800,height=480"));
        assert!(s.contains("max-buffers=1 drop=true"));
    }

    #[test]
    fn other_urls_use_uridecodebin() {
        let s = GstSource::pipeline_string("http://cam.local/video.mjpg", 480, 320);
        assert!(s.starts_with("uridecodebin uri=http://cam.local/video.mjpg"));
    }
}
