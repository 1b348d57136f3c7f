//! Pre-rendered UI regions blended onto each frame
//!
//! Regions are rendered once (carets) or once per channel switch (label)
//! and only their bounding boxes are touched per frame.

use embedded_graphics::mono_font::{ascii::FONT_10X20, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Triangle};
use embedded_graphics::text::{Baseline, Text};
use image::{Rgb, RgbImage};
use tracing::{debug, instrument};

use super::canvas::Canvas;

const LABEL_TOP: i32 = 20;
const LABEL_COLOR: Rgb888 = Rgb888::new(0, 255, 255);
const SHADOW_COLOR: Rgb888 = Rgb888::new(0, 0, 0);
const SHADOW_OFFSET: u32 = 2;

const SPLASH_MESSAGE: &str = "Loading Cameras...";
const SPLASH_BACKGROUND: [u8; 3] = [0, 0, 255];
const SPLASH_TEXT_COLOR: Rgb888 = Rgb888::WHITE;

const CARET_SIZE: u32 = 60;
const CARET_INSET: i32 = 10;
const CARET_COLOR: Rgb888 = Rgb888::new(200, 200, 200);
const CARET_ALPHA: u8 = 180;

/// A pre-rendered, alpha-masked UI element and where it goes.
/// Bounds are half-open: `x1..x2`, `y1..y2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRegion {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub rgb: Vec<u8>,
    pub alpha: Vec<u8>,
}

impl OverlayRegion {
    fn from_canvas(x: i32, y: i32, canvas: Canvas) -> Self {
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        let (rgb, alpha) = canvas.into_parts();
        Self {
            x1: x,
            y1: y,
            x2: x + w,
            y2: y + h,
            rgb,
            alpha,
        }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1) as u32
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x1..self.x2).contains(&x) && (self.y1..self.y2).contains(&y)
    }
}

/// Blend one overlay channel value over a frame value.
///
/// Alpha is widened to 0..=256 so that 0 keeps `src` and 255 yields `overlay`
/// exactly while staying in integer arithmetic.
#[inline]
pub fn blend(src: u8, overlay: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha) + u32::from(alpha >> 7);
    ((u32::from(src) * (256 - a) + u32::from(overlay) * a) >> 8) as u8
}

/// Blend `region` onto `frame`, touching only the part of its bounding
/// box that lies inside the frame.
pub fn blend_region(frame: &mut RgbImage, region: &OverlayRegion) {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let x_start = region.x1.max(0);
    let x_end = region.x2.min(fw);
    let y_start = region.y1.max(0);
    let y_end = region.y2.min(fh);
    if x_start >= x_end || y_start >= y_end {
        return;
    }

    let region_w = region.width() as usize;
    let stride = fw as usize * 3;
    let buf: &mut [u8] = frame;

    for y in y_start..y_end {
        let row = (y - region.y1) as usize * region_w;
        let dst_row = y as usize * stride;
        for x in x_start..x_end {
            let src_index = row + (x - region.x1) as usize;
            let alpha = region.alpha[src_index];
            if alpha == 0 {
                continue;
            }
            let overlay = &region.rgb[src_index * 3..src_index * 3 + 3];
            let dst = &mut buf[dst_row + x as usize * 3..dst_row + x as usize * 3 + 3];
            for (d, &o) in dst.iter_mut().zip(overlay) {
                *d = blend(*d, o, alpha);
            }
        }
    }
}

pub struct OverlayCompositor {
    width: u32,
    label: Option<OverlayRegion>,
    label_name: Option<String>,
    carets: Vec<OverlayRegion>,
}

impl OverlayCompositor {
    /// Carets are only rendered when there is somewhere to navigate to.
    #[instrument]
    pub fn new(width: u32, height: u32, channel_count: usize) -> Self {
        let carets = if channel_count > 1 {
            vec![render_caret(width, height, true), render_caret(width, height, false)]
        } else {
            Vec::new()
        };
        Self {
            width,
            label: None,
            label_name: None,
            carets,
        }
    }

    /// Re-render the label if `name` differs from the one shown.
    pub fn show_channel(&mut self, name: &str) {
        if self.label_name.as_deref() == Some(name) {
            return;
        }
        debug!("Rendering label for {}", name);
        self.label = Some(render_label(name, self.width));
        self.label_name = Some(name.to_owned());
    }

    /// Full-screen placeholder shown before any stream has delivered a frame
    pub fn splash(width: u32, height: u32) -> RgbImage {
        let mut frame = RgbImage::from_pixel(width, height, Rgb(SPLASH_BACKGROUND));
        let style = MonoTextStyle::new(&FONT_10X20, SPLASH_TEXT_COLOR);
        let text = Text::with_baseline(SPLASH_MESSAGE, Point::zero(), style, Baseline::Top);

        let size = text.bounding_box().size;
        let mut canvas = Canvas::new(size.width, size.height);
        text.draw(&mut canvas).ok();

        let x = (width as i32 - size.width as i32) / 2;
        let y = (height as i32 - size.height as i32) / 2;
        blend_region(&mut frame, &OverlayRegion::from_canvas(x, y, canvas));
        frame
    }

    pub fn label(&self) -> Option<&OverlayRegion> {
        self.label.as_ref()
    }

    pub fn carets(&self) -> &[OverlayRegion] {
        &self.carets
    }

    pub fn regions(&self) -> impl Iterator<Item = &OverlayRegion> {
        self.label.iter().chain(self.carets.iter())
    }

    pub fn apply(&self, frame: &mut RgbImage) {
        for region in self.regions() {
            blend_region(frame, region);
        }
    }
}

fn render_label(name: &str, screen_width: u32) -> OverlayRegion {
    let text_style = MonoTextStyle::new(&FONT_10X20, LABEL_COLOR);
    let shadow_style = MonoTextStyle::new(&FONT_10X20, SHADOW_COLOR);

    let bounds = Text::with_baseline(name, Point::zero(), text_style, Baseline::Top).bounding_box();
    let mut canvas = Canvas::new(
        bounds.size.width + SHADOW_OFFSET,
        bounds.size.height + SHADOW_OFFSET,
    );
    let shadow_at = Point::new(SHADOW_OFFSET as i32, SHADOW_OFFSET as i32);
    Text::with_baseline(name, shadow_at, shadow_style, Baseline::Top)
        .draw(&mut canvas)
        .ok();
    Text::with_baseline(name, Point::zero(), text_style, Baseline::Top)
        .draw(&mut canvas)
        .ok();

    let x = (screen_width as i32 - canvas.width() as i32) / 2;
    OverlayRegion::from_canvas(x, LABEL_TOP, canvas)
}

fn render_caret(screen_width: u32, screen_height: u32, left: bool) -> OverlayRegion {
    let size = CARET_SIZE as i32;
    let mut canvas = Canvas::new(CARET_SIZE, CARET_SIZE);
    canvas.set_pen_alpha(CARET_ALPHA);

    let (tip, back) = if left { (0, size - 1) } else { (size - 1, 0) };
    Triangle::new(
        Point::new(tip, size / 2),
        Point::new(back, 0),
        Point::new(back, size - 1),
    )
    .into_styled(PrimitiveStyle::with_fill(CARET_COLOR))
    .draw(&mut canvas)
    .ok();

    let x = if left {
        CARET_INSET
    } else {
        screen_width as i32 - size - CARET_INSET
    };
    let y = screen_height as i32 / 2 - size / 2;
    OverlayRegion::from_canvas(x, y, canvas)
}
