//! Touch panel listener: raw evdev stream to channel-switch intents

use std::sync::Arc;
use std::time::{Duration, Instant};

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key};
use tracing::{debug, info, warn};

use super::calibration::Calibration;
use crate::channel::ChannelRegistry;
use crate::pipeline::RunFlag;

/// The subset of the device event stream the viewer cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEvent {
    AbsX(i32),
    AbsY(i32),
    Touch { pressed: bool },
}

impl TouchEvent {
    pub fn from_input(event: &InputEvent) -> Option<Self> {
        match event.kind() {
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_X) => Some(Self::AbsX(event.value())),
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_Y) => Some(Self::AbsY(event.value())),
            InputEventKind::Key(Key::BTN_TOUCH) => Some(Self::Touch {
                pressed: event.value() != 0,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub raw_x: i32,
    pub raw_y: i32,
}

/// Accumulates the most recent axis values between releases
#[derive(Debug, Default)]
pub struct TouchTracker {
    raw_x: i32,
    raw_y: i32,
}

impl TouchTracker {
    /// Feed one event; yields the completed sample on release.
    pub fn on_event(&mut self, event: TouchEvent) -> Option<TouchSample> {
        match event {
            TouchEvent::AbsX(value) => self.raw_x = value,
            TouchEvent::AbsY(value) => self.raw_y = value,
            TouchEvent::Touch { pressed: true } => {}
            TouchEvent::Touch { pressed: false } => {
                return Some(TouchSample {
                    raw_x: self.raw_x,
                    raw_y: self.raw_y,
                });
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Previous,
    Next,
}

/// Turns released samples into channel switches on the registry
pub struct TouchNavigator {
    registry: Arc<ChannelRegistry>,
    calibration: Calibration,
    width: u32,
    height: u32,
    margin: u32,
    debounce: Duration,
    last_switch: Option<Instant>,
}

impl TouchNavigator {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        calibration: Calibration,
        (width, height): (u32, u32),
        margin: u32,
        debounce: Duration,
    ) -> Self {
        Self {
            registry,
            calibration,
            width,
            height,
            margin,
            debounce,
            last_switch: None,
        }
    }

    /// Which navigation zone, if any, a screen x-coordinate falls in
    pub fn classify(&self, x: u32) -> Option<Intent> {
        if x < self.margin {
            Some(Intent::Previous)
        } else if x > self.width.saturating_sub(self.margin) {
            Some(Intent::Next)
        } else {
            None
        }
    }

    /// Apply a released sample. Returns the intent that was carried out.
    pub fn on_release(&mut self, sample: TouchSample, now: Instant) -> Option<Intent> {
        self.registry.note_interaction(now);

        let (x, y) = match self.calibration.map(sample.raw_x, sample.raw_y, self.width, self.height) {
            Ok(point) => point,
            Err(e) => {
                warn!("Ignoring touch ({}, {}): {}", sample.raw_x, sample.raw_y, e);
                return None;
            }
        };
        debug!("Touch at pixel ({}, {})", x, y);

        let intent = self.classify(x)?;
        if let Some(last) = self.last_switch {
            if now.saturating_duration_since(last) < self.debounce {
                debug!("Debounced {:?}", intent);
                return None;
            }
        }

        match intent {
            Intent::Previous => self.registry.previous(),
            Intent::Next => self.registry.next(),
        };
        self.last_switch = Some(now);
        Some(intent)
    }
}

/// Feeds decoded events through the tracker and navigator until stopped
pub struct TouchHandler {
    tracker: TouchTracker,
    navigator: TouchNavigator,
    run: RunFlag,
}

impl TouchHandler {
    pub fn new(navigator: TouchNavigator, run: RunFlag) -> Self {
        Self {
            tracker: TouchTracker::default(),
            navigator,
            run,
        }
    }

    /// Apply a batch of events. Once the run flag drops, the rest of the
    /// batch is discarded and false is returned.
    pub fn handle<I>(&mut self, events: I, now: Instant) -> bool
    where
        I: IntoIterator<Item = TouchEvent>,
    {
        for event in events {
            if !self.run.is_running() {
                return false;
            }
            if let Some(sample) = self.tracker.on_event(event) {
                self.navigator.on_release(sample, now);
            }
        }
        self.run.is_running()
    }
}

pub struct TouchListener {
    device: Device,
    handler: TouchHandler,
}

impl TouchListener {
    pub fn new(device: Device, navigator: TouchNavigator, run: RunFlag) -> Self {
        Self {
            device,
            handler: TouchHandler::new(navigator, run),
        }
    }

    /// Read loop. Returns when stopped or when the device goes away.
    pub async fn run(self) {
        let Self { device, mut handler } = self;
        let name = device.name().unwrap_or("unnamed device").to_owned();
        let mut events = match device.into_event_stream() {
            Ok(events) => events,
            Err(e) => {
                warn!("Cannot read touch device {}, navigation disabled: {}", name, e);
                return;
            }
        };
        info!("Touch listener started on {}", name);

        let run = handler.run.clone();
        loop {
            tokio::select! {
                event = events.next_event() => match event {
                    Ok(event) => {
                        let decoded = TouchEvent::from_input(&event);
                        if !handler.handle(decoded, Instant::now()) {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Touch device read failed, navigation disabled: {}", e);
                        return;
                    }
                },
                _ = run.stopped() => break,
            }
        }
        info!("Touch listener stopped");
    }
}
