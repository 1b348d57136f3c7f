use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// A composited frame already packed for the display
#[derive(Clone)]
pub struct Frame {
    /// Immutable packed pixels - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Grab timestamp for latency tracking
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    /// Channel the frame was decoded from
    pub channel: usize,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

/// Framebuffer pixel layouts we can pack into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 4 bytes per pixel, stored B, G, R, pad
    Rgba32,
    /// 2 bytes per pixel, little-endian 5-6-5
    Rgb565,
    /// 3 bytes per pixel, R, G, B
    Rgb24,
}

impl PixelFormat {
    pub fn from_bits_per_pixel(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Self::Rgba32),
            24 => Some(Self::Rgb24),
            16 => Some(Self::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba32 => 4,
            Self::Rgb24 => 3,
            Self::Rgb565 => 2,
        }
    }
}
