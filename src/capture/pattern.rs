//! Built-in colour-bar stream for bringing up a display without cameras
//!
//! `pattern://<anything>` opens a session that scrolls eight vertical bars
//! at 25 fps. The text after the scheme picks the phase, so different
//! channels are visibly different.

use std::thread;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use super::source::{StreamSession, StreamSource};
use crate::StreamError;

pub const SCHEME: &str = "pattern://";

const FRAME_INTERVAL: Duration = Duration::from_millis(40);

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

pub struct PatternSource {
    width: u32,
    height: u32,
}

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl StreamSource for PatternSource {
    fn open(&mut self, url: &str) -> Result<Box<dyn StreamSession>, StreamError> {
        let name = url.strip_prefix(SCHEME).ok_or_else(|| StreamError::Open {
            url: url.to_owned(),
            reason: format!("not a {SCHEME} url"),
        })?;
        let phase = name.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        Ok(Box::new(PatternSession {
            width: self.width,
            height: self.height,
            offset: phase % self.width.max(1),
            last_grab: None,
        }))
    }
}

struct PatternSession {
    width: u32,
    height: u32,
    offset: u32,
    last_grab: Option<Instant>,
}

impl StreamSession for PatternSession {
    fn grab(&mut self) -> Result<(), StreamError> {
        // pace like a live camera so callers never spin
        if let Some(last) = self.last_grab {
            let wait = FRAME_INTERVAL.saturating_sub(last.elapsed());
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
        self.last_grab = Some(Instant::now());
        self.offset = (self.offset + 4) % self.width.max(1);
        Ok(())
    }

    fn retrieve(&mut self) -> Result<RgbImage, StreamError> {
        let bar_width = (self.width / BARS.len() as u32).max(1);
        let (width, offset) = (self.width.max(1), self.offset);
        Ok(RgbImage::from_fn(self.width, self.height, |x, _| {
            let bar = ((x + offset) % width / bar_width) as usize;
            Rgb(BARS[bar.min(BARS.len() - 1)])
        }))
    }
}
