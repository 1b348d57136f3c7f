//! Stream reader: keeps a session open for the selected channel and feeds
//! composited, packed frames into the mailbox
//!
//! Connecting -> Streaming -> (Lost | ChannelChanged) -> Connecting ...
//! Any state moves to Closed once the run flag drops. Failures never leave
//! this loop; they are logged and retried with a fixed backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, info, instrument, warn};

use super::frame::{Frame, FrameMetadata};
use super::source::{StreamSession, StreamSource};
use crate::channel::ChannelRegistry;
use crate::display::{pixels, DisplayTarget};
use crate::overlay::OverlayCompositor;
use crate::pipeline::{MailboxProducer, RunFlag};
use crate::{DisplayError, PipelineConfig};

#[derive(Debug, Clone, Copy)]
pub struct ReaderTiming {
    /// Wait after a failed open
    pub reconnect_delay: Duration,
    /// Wait after a session drops mid-stream
    pub lost_delay: Duration,
}

impl From<&PipelineConfig> for ReaderTiming {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay(),
            lost_delay: config.lost_delay(),
        }
    }
}

pub enum ReaderState {
    Connecting,
    Streaming {
        channel: usize,
        session: Box<dyn StreamSession>,
    },
    Lost {
        channel: usize,
    },
    ChannelChanged,
    Closed,
}

impl std::fmt::Debug for ReaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => f.write_str("Connecting"),
            Self::Streaming { channel, .. } => write!(f, "Streaming({channel})"),
            Self::Lost { channel } => write!(f, "Lost({channel})"),
            Self::ChannelChanged => f.write_str("ChannelChanged"),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

pub struct StreamReader<S> {
    source: S,
    registry: Arc<ChannelRegistry>,
    compositor: OverlayCompositor,
    target: DisplayTarget,
    mailbox: MailboxProducer,
    run: RunFlag,
    timing: ReaderTiming,
    sequence: u64,
}

impl<S: StreamSource> StreamReader<S> {
    pub fn new(
        source: S,
        registry: Arc<ChannelRegistry>,
        target: DisplayTarget,
        mailbox: MailboxProducer,
        run: RunFlag,
        timing: ReaderTiming,
    ) -> Self {
        let compositor = OverlayCompositor::new(target.width, target.height, registry.len());
        Self {
            source,
            registry,
            compositor,
            target,
            mailbox,
            run,
            timing,
            sequence: 0,
        }
    }

    pub fn run(mut self) {
        info!("Starting stream reader");
        let mut state = ReaderState::Connecting;
        loop {
            state = self.step(state);
            if let ReaderState::Closed = state {
                break;
            }
        }
        info!("Stream reader stopped");
    }

    /// Advance the state machine by one transition.
    pub fn step(&mut self, state: ReaderState) -> ReaderState {
        if !self.run.is_running() {
            return ReaderState::Closed;
        }
        match state {
            ReaderState::Connecting => self.connect(),
            ReaderState::Streaming { channel, session } => self.stream(channel, session),
            ReaderState::Lost { channel } => {
                metrics::counter!("stream_reconnects").increment(1);
                self.backoff(self.timing.lost_delay, channel)
            }
            ReaderState::ChannelChanged => ReaderState::Connecting,
            ReaderState::Closed => ReaderState::Closed,
        }
    }

    fn backoff(&self, delay: Duration, channel: usize) -> ReaderState {
        debug!("Retrying channel {} in {:?}", channel, delay);
        if self.run.sleep(delay) {
            ReaderState::Connecting
        } else {
            ReaderState::Closed
        }
    }

    fn connect(&mut self) -> ReaderState {
        let channel = self.registry.current_index();
        let camera = self.registry.camera(channel).clone();
        info!("Connecting to camera: {} at {}", camera.name, camera.url);

        match self.source.open(&camera.url) {
            Ok(session) => {
                self.compositor.show_channel(&camera.name);
                info!("Streaming: {}", camera.name);
                ReaderState::Streaming { channel, session }
            }
            Err(e) => {
                warn!("Failed to open camera {}: {}", camera.name, e);
                self.backoff(self.timing.reconnect_delay, channel)
            }
        }
    }

    fn stream(&mut self, channel: usize, mut session: Box<dyn StreamSession>) -> ReaderState {
        if self.registry.current_index() != channel {
            info!("Channel changed, releasing {}", self.registry.camera(channel).name);
            return ReaderState::ChannelChanged;
        }

        if let Err(e) = session.grab() {
            warn!("Lost connection to {}: {}", self.registry.camera(channel).name, e);
            return ReaderState::Lost { channel };
        }
        let timestamp = Instant::now();

        // The render loop has not taken the last frame yet: keep the stream
        // moving but skip the decode.
        if self.mailbox.is_occupied() {
            self.mailbox.note_skip();
            return ReaderState::Streaming { channel, session };
        }

        let image = match session.retrieve() {
            Ok(image) => image,
            Err(e) => {
                warn!("Decode failed on {}: {}", self.registry.camera(channel).name, e);
                return ReaderState::Lost { channel };
            }
        };

        match self.compose(image, channel, timestamp) {
            Ok(frame) => {
                self.mailbox.offer(frame);
            }
            Err(e) => warn!("Dropping frame: {}", e),
        }
        ReaderState::Streaming { channel, session }
    }

    /// Scale to the display, blend the overlay and pack for the device.
    #[instrument(skip(self, image, timestamp))]
    pub fn compose(
        &mut self,
        mut image: RgbImage,
        channel: usize,
        timestamp: Instant,
    ) -> Result<Frame, DisplayError> {
        if image.dimensions() != (self.target.width, self.target.height) {
            image = imageops::resize(&image, self.target.width, self.target.height, FilterType::Nearest);
        }
        self.compositor.apply(&mut image);
        let data = pixels::pack(&image, &self.target)?;

        self.sequence += 1;
        Ok(Frame {
            data,
            meta: Arc::new(FrameMetadata {
                sequence: self.sequence,
                channel,
                width: self.target.width,
                height: self.target.height,
                stride: self.target.stride() as u32,
                format: self.target.format,
            }),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{frame_mailbox, run_flag, MailboxConsumer, StopHandle};
    use crate::{CameraDescriptor, StreamError};
    use image::Rgb;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Script {
        opened: Mutex<Vec<String>>,
        failing_opens: AtomicUsize,
        live_sessions: AtomicUsize,
        grabs_before_loss: Mutex<Option<usize>>,
    }

    struct ScriptedSource {
        script: Arc<Script>,
        frame_size: (u32, u32),
    }

    struct ScriptedSession {
        script: Arc<Script>,
        frame_size: (u32, u32),
        grabs: usize,
    }

    impl StreamSource for ScriptedSource {
        fn open(&mut self, url: &str) -> Result<Box<dyn StreamSession>, StreamError> {
            self.script.opened.lock().unwrap().push(url.to_owned());
            let failing = self.script.failing_opens.load(Ordering::SeqCst);
            if failing > 0 {
                self.script.failing_opens.store(failing - 1, Ordering::SeqCst);
                return Err(StreamError::Open {
                    url: url.to_owned(),
                    reason: "connection refused".into(),
                });
            }
            self.script.live_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                script: self.script.clone(),
                frame_size: self.frame_size,
                grabs: 0,
            }))
        }
    }

    impl StreamSession for ScriptedSession {
        fn grab(&mut self) -> Result<(), StreamError> {
            self.grabs += 1;
            match *self.script.grabs_before_loss.lock().unwrap() {
                Some(limit) if self.grabs > limit => Err(StreamError::EndOfStream),
                _ => Ok(()),
            }
        }

        fn retrieve(&mut self) -> Result<RgbImage, StreamError> {
            Ok(RgbImage::from_pixel(self.frame_size.0, self.frame_size.1, Rgb([40, 80, 120])))
        }
    }

    impl Drop for ScriptedSession {
        fn drop(&mut self) {
            self.script.live_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        reader: StreamReader<ScriptedSource>,
        script: Arc<Script>,
        registry: Arc<ChannelRegistry>,
        consumer: MailboxConsumer,
        stop: StopHandle,
    }

    fn harness(cameras: usize, frame_size: (u32, u32)) -> Harness {
        let cameras = (0..cameras)
            .map(|i| CameraDescriptor {
                name: format!("cam{i}"),
                url: format!("rtsp://cam{i}/stream"),
            })
            .collect();
        let registry = Arc::new(ChannelRegistry::new(cameras).unwrap());
        let script = Arc::new(Script::default());
        let (producer, consumer) = frame_mailbox();
        let (stop, run) = run_flag();
        let reader = StreamReader::new(
            ScriptedSource {
                script: script.clone(),
                frame_size,
            },
            registry.clone(),
            DisplayTarget::new(64, 48, 16).unwrap(),
            producer,
            run,
            ReaderTiming {
                reconnect_delay: Duration::from_millis(1),
                lost_delay: Duration::from_millis(1),
            },
        );
        Harness {
            reader,
            script,
            registry,
            consumer,
            stop,
        }
    }

    #[test]
    fn failed_open_retries_then_streams() {
        let mut h = harness(2, (64, 48));
        h.script.failing_opens.store(2, Ordering::SeqCst);

        let state = h.reader.step(ReaderState::Connecting);
        assert!(matches!(state, ReaderState::Connecting));
        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Connecting));
        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Streaming { channel: 0, .. }));

        let opened = h.script.opened.lock().unwrap().clone();
        assert_eq!(opened, vec!["rtsp://cam0/stream"; 3]);
    }

    #[test]
    fn streaming_fills_the_mailbox_then_skips_decode() {
        let mut h = harness(2, (64, 48));
        let state = h.reader.step(ReaderState::Connecting);
        let state = h.reader.step(state);
        assert_eq!(h.consumer.pending(), 1);

        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Streaming { .. }));
        assert_eq!(h.consumer.pending(), 1);
        assert_eq!(h.consumer.stats().skipped, 1);

        let frame = h.consumer.take().unwrap();
        assert_eq!(frame.meta.sequence, 1);
        assert_eq!(frame.meta.channel, 0);
        assert_eq!(frame.data.len(), 64 * 48 * 2);

        h.reader.step(state);
        assert_eq!(h.consumer.take().unwrap().meta.sequence, 2);
    }

    #[test]
    fn channel_switch_releases_and_reconnects() {
        let mut h = harness(3, (64, 48));
        let state = h.reader.step(ReaderState::Connecting);
        assert_eq!(h.script.live_sessions.load(Ordering::SeqCst), 1);

        h.registry.next();
        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::ChannelChanged));
        assert_eq!(h.script.live_sessions.load(Ordering::SeqCst), 0);

        let state = h.reader.step(state);
        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Streaming { channel: 1, .. }));
        assert_eq!(
            h.script.opened.lock().unwrap().last().map(String::as_str),
            Some("rtsp://cam1/stream")
        );
    }

    #[test]
    fn lost_stream_reconnects_same_channel() {
        let mut h = harness(2, (64, 48));
        *h.script.grabs_before_loss.lock().unwrap() = Some(1);

        let state = h.reader.step(ReaderState::Connecting);
        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Streaming { .. }));
        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Lost { channel: 0 }));
        assert_eq!(h.script.live_sessions.load(Ordering::SeqCst), 0);

        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Connecting));
        h.reader.step(state);
        assert_eq!(h.script.opened.lock().unwrap().len(), 2);
    }

    #[test]
    fn mismatched_frames_are_resized() {
        let mut h = harness(1, (32, 16));
        let state = h.reader.step(ReaderState::Connecting);
        h.reader.step(state);
        let frame = h.consumer.take().unwrap();
        assert_eq!((frame.meta.width, frame.meta.height), (64, 48));
        assert_eq!(frame.data.len(), 64 * 48 * 2);
    }

    #[test]
    fn stop_closes_and_releases() {
        let mut h = harness(2, (64, 48));
        let state = h.reader.step(ReaderState::Connecting);
        h.stop.stop();
        let state = h.reader.step(state);
        assert!(matches!(state, ReaderState::Closed));
        assert_eq!(h.script.live_sessions.load(Ordering::SeqCst), 0);
    }
}
