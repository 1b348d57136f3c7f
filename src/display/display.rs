//! SDL2 Window Display Module
//! Presents packed RGB24 frames in a fullscreen SDL2 window, for boards
//! driving an HDMI panel through a desktop or KMS session.

use sdl2::event::Event;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture};
use sdl2::video::Window;
use sdl2::EventPump;
use tracing::{info, instrument, warn};

use super::{DisplaySink, DisplayTarget};
use crate::capture::PixelFormat;
use crate::{DisplayConfig, DisplayError};

fn sdl_error(e: impl ToString) -> DisplayError {
    DisplayError::Backend(e.to_string())
}

pub struct Sdl2Display {
    // Freed along with the renderer owned by `canvas`
    texture: Texture,
    canvas: Canvas<Window>,
    event_pump: EventPump,
    _context: sdl2::Sdl,
    target: DisplayTarget,
}

impl Sdl2Display {
    #[instrument(skip(config))]
    pub fn new(config: &DisplayConfig) -> Result<Self, DisplayError> {
        let context = sdl2::init().map_err(sdl_error)?;
        let video_subsystem = context.video().map_err(sdl_error)?;

        let (width, height) = match (config.width, config.height) {
            (Some(w), Some(h)) => (w, h),
            _ => match video_subsystem.current_display_mode(0) {
                Ok(mode) => (mode.w as u32, mode.h as u32),
                Err(e) => {
                    warn!("Display mode unavailable ({}), using fallback size", e);
                    (super::FALLBACK_WIDTH, super::FALLBACK_HEIGHT)
                }
            },
        };
        info!("SDL2 display {}x{}", width, height);

        let window = video_subsystem
            .window("doorview", width, height)
            .fullscreen_desktop()
            .build()
            .map_err(sdl_error)?;
        context.mouse().show_cursor(false);

        let canvas = window.into_canvas().present_vsync().build().map_err(sdl_error)?;
        let texture = canvas
            .texture_creator()
            .create_texture_streaming(PixelFormatEnum::RGB24, width, height)
            .map_err(sdl_error)?;
        let event_pump = context.event_pump().map_err(sdl_error)?;

        Ok(Self {
            texture,
            canvas,
            event_pump,
            _context: context,
            target: DisplayTarget {
                width,
                height,
                format: PixelFormat::Rgb24,
            },
        })
    }
}

impl DisplaySink for Sdl2Display {
    fn target(&self) -> &DisplayTarget {
        &self.target
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), DisplayError> {
        for event in self.event_pump.poll_iter() {
            if let Event::Quit { .. } = event {
                info!("Quit event received");
                return Err(DisplayError::Closed);
            }
        }

        self.texture
            .update(None, frame, self.target.stride())
            .map_err(sdl_error)?;

        self.canvas.clear();
        self.canvas.copy(&self.texture, None, None).map_err(sdl_error)?;
        self.canvas.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::pixels;

    #[test]
    fn streaming_texture_matches_target_across_writes() {
        std::env::set_var("SDL_VIDEODRIVER", "dummy");
        let config = DisplayConfig {
            width: Some(64),
            height: Some(48),
            ..DisplayConfig::default()
        };
        // No usable video driver on this host
        let Ok(mut display) = Sdl2Display::new(&config) else {
            return;
        };

        let query = display.texture.query();
        assert_eq!((query.width, query.height), (64, 48));
        assert_eq!(query.format, PixelFormatEnum::RGB24);

        let blank = pixels::blank(display.target());
        for _ in 0..3 {
            display.write(&blank).unwrap();
        }
        let query = display.texture.query();
        assert_eq!((query.width, query.height), (64, 48));
    }
}
