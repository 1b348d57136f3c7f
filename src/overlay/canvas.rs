//! Off-screen RGB + alpha buffer that embedded-graphics can draw into

use std::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

/// Transparent until drawn on. Every pixel drawn takes the colour given
/// and the current pen alpha.
pub struct Canvas {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Vec<u8>,
    pen_alpha: u8,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgb: vec![0; pixels * 3],
            alpha: vec![0; pixels],
            pen_alpha: u8::MAX,
        }
    }

    pub fn set_pen_alpha(&mut self, alpha: u8) {
        self.pen_alpha = alpha;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.rgb, self.alpha)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x < 0 || coord.y < 0 {
                continue;
            }
            let (x, y) = (coord.x as u32, coord.y as u32);
            if x >= self.width || y >= self.height {
                continue;
            }
            let index = (y * self.width + x) as usize;
            self.rgb[index * 3..index * 3 + 3].copy_from_slice(&[color.r(), color.g(), color.b()]);
            self.alpha[index] = self.pen_alpha;
        }
        Ok(())
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
