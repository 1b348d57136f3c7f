//! Error types for each stage of the viewer

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration failures. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no cameras configured")]
    NoCameras,

    #[error("camera #{index} has an empty `{field}`")]
    EmptyField { index: usize, field: &'static str },

    #[error("pipeline.target_fps must be greater than zero")]
    ZeroFrameRate,

    #[error("invalid touch calibration: {0}")]
    Calibration(#[from] CalibrationError),
}

/// Touch axis names used in calibration diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("{axis} raw range {min}..{max} is empty")]
    DegenerateRange { axis: Axis, min: i32, max: i32 },

    #[error("display size {width}x{height} cannot hold a touch point")]
    EmptyDisplay { width: u32, height: u32 },
}

/// Transient stream failures. Retried by the reader, never propagated further.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to open {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("grab failed: {0}")]
    Grab(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("stream ended")]
    EndOfStream,
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to open display device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to map display memory: {0}")]
    Map(#[source] io::Error),

    #[error("display write failed: {0}")]
    Write(#[source] io::Error),

    #[error("unsupported framebuffer depth: {0} bits per pixel")]
    UnsupportedDepth(u32),

    #[error("packed frame is {actual} bytes, display expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("display backend `{0}` is not compiled in")]
    BackendUnavailable(&'static str),

    #[error("display backend error: {0}")]
    Backend(String),

    #[error("display was closed")]
    Closed,
}
