#[cfg(feature = "sdl2-window")]
pub mod display;
pub mod framebuffer;
pub mod pixels;

use tracing::info;

use crate::capture::PixelFormat;
use crate::{DisplayBackend, DisplayConfig, DisplayError};

#[cfg(feature = "sdl2-window")]
pub use display::Sdl2Display;
pub use framebuffer::{CursorGuard, DeviceFileDisplay, FramebufferDisplay};

/// Fallback geometry when the display cannot describe itself
pub const FALLBACK_WIDTH: u32 = 1280;
pub const FALLBACK_HEIGHT: u32 = 720;
pub const FALLBACK_BITS_PER_PIXEL: u32 = 32;

/// Geometry and pixel layout of the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTarget {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl DisplayTarget {
    pub fn new(width: u32, height: u32, bits_per_pixel: u32) -> Result<Self, DisplayError> {
        let format = PixelFormat::from_bits_per_pixel(bits_per_pixel)
            .ok_or(DisplayError::UnsupportedDepth(bits_per_pixel))?;
        Ok(Self {
            width,
            height,
            format,
        })
    }

    pub fn fallback() -> Self {
        Self {
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
            format: PixelFormat::Rgba32,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Size of one packed frame in bytes
    pub fn frame_len(&self) -> usize {
        self.stride() * self.height as usize
    }
}

/// Final output stage. `&mut self` keeps writes from overlapping.
pub trait DisplaySink {
    fn target(&self) -> &DisplayTarget;

    /// Write one packed frame starting at the top-left of the device.
    fn write(&mut self, frame: &[u8]) -> Result<(), DisplayError>;

    fn blank(&mut self) -> Result<(), DisplayError> {
        let blank = pixels::blank(self.target());
        self.write(&blank)
    }

    /// Loading screen shown while the first stream connects
    fn splash(&mut self) -> Result<(), DisplayError> {
        let splash = pixels::splash(self.target());
        self.write(&splash)
    }
}

impl<T: DisplaySink + ?Sized> DisplaySink for Box<T> {
    fn target(&self) -> &DisplayTarget {
        (**self).target()
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), DisplayError> {
        (**self).write(frame)
    }

    fn blank(&mut self) -> Result<(), DisplayError> {
        (**self).blank()
    }

    fn splash(&mut self) -> Result<(), DisplayError> {
        (**self).splash()
    }
}

/// Open the configured backend. Failure here is fatal to the viewer.
pub fn open_sink(config: &DisplayConfig) -> Result<Box<dyn DisplaySink>, DisplayError> {
    info!("Opening {:?} display", config.backend);
    match config.backend {
        DisplayBackend::Framebuffer => {
            let target = crate::utils::resolve_display_target(config);
            Ok(Box::new(FramebufferDisplay::open(&config.device, target)?))
        }
        DisplayBackend::DeviceFile => {
            let target = crate::utils::resolve_display_target(config);
            Ok(Box::new(DeviceFileDisplay::open(&config.device, target)?))
        }
        #[cfg(feature = "sdl2-window")]
        DisplayBackend::Sdl2 => Ok(Box::new(Sdl2Display::new(config)?)),
        #[cfg(not(feature = "sdl2-window"))]
        DisplayBackend::Sdl2 => Err(DisplayError::BackendUnavailable("sdl2")),
    }
}
