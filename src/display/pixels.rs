//! RGB888 to framebuffer-native byte layouts
//!
//! Bit-exact: this is the contract with the display controller. No scaling
//! or colour correction happens here.

use bytes::{Bytes, BytesMut};
use image::RgbImage;
use tracing::instrument;

use super::DisplayTarget;
use crate::capture::PixelFormat;
use crate::overlay::OverlayCompositor;
use crate::DisplayError;

/// Pad byte written into the fourth byte of 32-bit pixels
pub const PAD_BYTE: u8 = 0xFF;

/// 5-6-5 packing of one pixel
#[inline]
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3)
}

/// Pack tightly-packed RGB888 bytes into `format`, appending to `out`.
pub fn pack_into(rgb: &[u8], format: PixelFormat, out: &mut BytesMut) {
    match format {
        PixelFormat::Rgba32 => {
            out.reserve(rgb.len() / 3 * 4);
            for px in rgb.chunks_exact(3) {
                // little-endian XRGB8888
                out.extend_from_slice(&[px[2], px[1], px[0], PAD_BYTE]);
            }
        }
        PixelFormat::Rgb565 => {
            out.reserve(rgb.len() / 3 * 2);
            for px in rgb.chunks_exact(3) {
                out.extend_from_slice(&rgb565(px[0], px[1], px[2]).to_le_bytes());
            }
        }
        PixelFormat::Rgb24 => out.extend_from_slice(rgb),
    }
}

/// Pack a full frame for `target`. The frame must already be target-sized.
#[instrument(skip_all, fields(format = ?target.format))]
pub fn pack(frame: &RgbImage, target: &DisplayTarget) -> Result<Bytes, DisplayError> {
    if (frame.width(), frame.height()) != (target.width, target.height) {
        return Err(DisplayError::SizeMismatch {
            expected: target.frame_len(),
            actual: frame.width() as usize * frame.height() as usize * target.bytes_per_pixel(),
        });
    }
    let mut out = BytesMut::with_capacity(target.frame_len());
    pack_into(frame.as_raw(), target.format, &mut out);
    Ok(out.freeze())
}

/// An all-black frame in the target's layout. Note the pad byte stays set
/// for 32-bit targets.
pub fn blank(target: &DisplayTarget) -> Bytes {
    let black = vec![0u8; target.width as usize * target.height as usize * 3];
    let mut out = BytesMut::with_capacity(target.frame_len());
    pack_into(&black, target.format, &mut out);
    out.freeze()
}

/// The loading splash in the target's layout
pub fn splash(target: &DisplayTarget) -> Bytes {
    let frame = OverlayCompositor::splash(target.width, target.height);
    let mut out = BytesMut::with_capacity(target.frame_len());
    pack_into(frame.as_raw(), target.format, &mut out);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn rgb565_primaries() {
        assert_eq!(rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 255), 0x001F);
        assert_eq!(rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb565(0, 0, 0), 0x0000);
        // low bits are truncated, not rounded
        assert_eq!(rgb565(7, 3, 7), 0x0000);
        assert_eq!(rgb565(8, 4, 8), 0x0821);
    }

    #[test]
    fn rgb565_is_little_endian() {
        let mut out = BytesMut::new();
        pack_into(&[255, 0, 0, 0, 0, 255], PixelFormat::Rgb565, &mut out);
        assert_eq!(&out[..], &[0x00, 0xF8, 0x1F, 0x00]);
    }

    #[test]
    fn rgba32_expands_with_pad_byte() {
        let mut out = BytesMut::new();
        pack_into(&[10, 20, 30, 40, 50, 60], PixelFormat::Rgba32, &mut out);
        assert_eq!(&out[..], &[30, 20, 10, 0xFF, 60, 50, 40, 0xFF]);
    }

    #[test]
    fn rgb24_passes_through() {
        let input = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        let mut out = BytesMut::new();
        pack_into(&input, PixelFormat::Rgb24, &mut out);
        assert_eq!(&out[..], &input);
    }

    #[test]
    fn pack_matches_target_length() {
        let frame = RgbImage::from_pixel(8, 4, Rgb([0, 255, 0]));
        for (bpp, len) in [(32, 128), (16, 64), (24, 96)] {
            let target = DisplayTarget::new(8, 4, bpp).unwrap();
            let packed = pack(&frame, &target).unwrap();
            assert_eq!(packed.len(), len);
            assert_eq!(packed.len(), target.frame_len());
        }
    }

    #[test]
    fn pack_rejects_wrong_size() {
        let frame = RgbImage::new(8, 4);
        let target = DisplayTarget::new(16, 4, 16).unwrap();
        assert!(matches!(
            pack(&frame, &target),
            Err(DisplayError::SizeMismatch { expected: 128, actual: 64 })
        ));
    }

    #[test]
    fn splash_is_packed_for_the_target() {
        let target = DisplayTarget::new(320, 240, 16).unwrap();
        let packed = splash(&target);
        assert_eq!(packed.len(), target.frame_len());
        // pure blue background in 5-6-5
        assert_eq!(&packed[..2], &rgb565(0, 0, 255).to_le_bytes());
    }

    #[test]
    fn blank_frames() {
        let target = DisplayTarget::new(2, 1, 32).unwrap();
        assert_eq!(&blank(&target)[..], &[0, 0, 0, 0xFF, 0, 0, 0, 0xFF]);
        let target = DisplayTarget::new(2, 1, 16).unwrap();
        assert_eq!(&blank(&target)[..], &[0, 0, 0, 0]);
    }
}
