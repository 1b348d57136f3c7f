//! Raw touch-sensor coordinates to screen pixels

use serde::{Deserialize, Serialize};

use crate::error::{Axis, CalibrationError};

/// Usable raw range of the touch sensor on each of its own axes.
///
/// The panel is mounted rotated 90 degrees and mirrored left/right relative
/// to the display, so the sensor's Y axis drives screen X (inverted) and
/// the sensor's X axis drives screen Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub x_raw_min: i32,
    pub x_raw_max: i32,
    pub y_raw_min: i32,
    pub y_raw_max: i32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            x_raw_min: 300,
            x_raw_max: 3900,
            y_raw_min: 300,
            y_raw_max: 3950,
        }
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.x_raw_max == self.x_raw_min {
            return Err(CalibrationError::DegenerateRange {
                axis: Axis::X,
                min: self.x_raw_min,
                max: self.x_raw_max,
            });
        }
        if self.y_raw_max == self.y_raw_min {
            return Err(CalibrationError::DegenerateRange {
                axis: Axis::Y,
                min: self.y_raw_min,
                max: self.y_raw_max,
            });
        }
        Ok(())
    }

    /// Map a raw sample to a pixel inside `[0, width) x [0, height)`.
    pub fn map(
        &self,
        raw_x: i32,
        raw_y: i32,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32), CalibrationError> {
        if width == 0 || height == 0 {
            return Err(CalibrationError::EmptyDisplay { width, height });
        }
        self.validate()?;

        // swap axes
        let (sx, sy) = (i64::from(raw_y), i64::from(raw_x));
        let (w, h) = (i64::from(width), i64::from(height));

        let y_span = i64::from(self.y_raw_max) - i64::from(self.y_raw_min);
        let x_span = i64::from(self.x_raw_max) - i64::from(self.x_raw_min);

        let tx = (sx - i64::from(self.y_raw_min)) * w / y_span;
        let ty = (sy - i64::from(self.x_raw_min)) * h / x_span;

        // mirror horizontally
        let tx = w - tx;

        Ok((tx.clamp(0, w - 1) as u32, ty.clamp(0, h - 1) as u32))
    }
}
