use std::fs;
use std::path::{Path, PathBuf};

use evdev::Device;
use tracing::{info, warn};

use crate::display::{DisplayTarget, FALLBACK_BITS_PER_PIXEL, FALLBACK_HEIGHT, FALLBACK_WIDTH};
use crate::DisplayConfig;

/// Geometry as reported by a framebuffer's sysfs directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbGeometry {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
}

fn parse_virtual_size(input: &str) -> Option<(u32, u32)> {
    let (w, h) = input.trim().split_once(',')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// One line of an fbdev `modes` file, e.g. `U:800x480p-60`
fn parse_mode(line: &str) -> Option<(u32, u32)> {
    let mode = line.trim();
    let mode = mode.split_once(':').map_or(mode, |(_, m)| m);
    let (w, rest) = mode.split_once('x')?;
    let h = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Visible mode size. `virtual_size` can be taller than the screen when the
/// driver allocates for panning, so it is only the fallback.
fn read_visible_size(sysfs: &Path) -> Option<(u32, u32)> {
    let from_modes = fs::read_to_string(sysfs.join("modes"))
        .ok()
        .and_then(|modes| modes.lines().find_map(parse_mode));
    from_modes.or_else(|| {
        let size = fs::read_to_string(sysfs.join("virtual_size")).ok()?;
        parse_virtual_size(&size)
    })
}

/// Read the mode size and `bits_per_pixel` from e.g. `/sys/class/graphics/fb0`
pub fn read_fb_geometry(sysfs: &Path) -> Option<FbGeometry> {
    let (width, height) = read_visible_size(sysfs)?;
    let bits = fs::read_to_string(sysfs.join("bits_per_pixel")).ok()?;
    let bits_per_pixel = bits.trim().parse().ok()?;
    Some(FbGeometry {
        width,
        height,
        bits_per_pixel,
    })
}

/// Work out the output geometry: explicit config first, then sysfs, then
/// the 1280x720 @ 32bpp fallback.
pub fn resolve_display_target(config: &DisplayConfig) -> DisplayTarget {
    let detected = read_fb_geometry(&config.sysfs);
    if detected.is_none() {
        warn!(
            "No framebuffer geometry under {}, assuming {}x{} @ {}bpp",
            config.sysfs.display(),
            FALLBACK_WIDTH,
            FALLBACK_HEIGHT,
            FALLBACK_BITS_PER_PIXEL
        );
    }

    let width = config
        .width
        .or(detected.map(|g| g.width))
        .unwrap_or(FALLBACK_WIDTH);
    let height = config
        .height
        .or(detected.map(|g| g.height))
        .unwrap_or(FALLBACK_HEIGHT);
    let bits = config
        .bits_per_pixel
        .or(detected.map(|g| g.bits_per_pixel))
        .unwrap_or(FALLBACK_BITS_PER_PIXEL);

    match DisplayTarget::new(width, height, bits) {
        Ok(target) => {
            info!("Display target: {}x{} {:?}", width, height, target.format);
            target
        }
        Err(e) => {
            warn!("{}, using {}bpp", e, FALLBACK_BITS_PER_PIXEL);
            DisplayTarget {
                width,
                height,
                ..DisplayTarget::fallback()
            }
        }
    }
}

/// Case-insensitive substring match of a device name against `patterns`
pub fn matches_touch_panel(name: &str, patterns: &[String]) -> bool {
    let name = name.to_lowercase();
    patterns
        .iter()
        .any(|pattern| name.contains(&pattern.to_lowercase()))
}

/// First input device whose name matches a known touch panel
pub fn find_touch_device(patterns: &[String]) -> Option<(PathBuf, Device)> {
    info!("Scanning for touch devices...");

    for (path, device) in evdev::enumerate() {
        let name = device.name().unwrap_or_default();
        if matches_touch_panel(name, patterns) {
            info!("Using touch device: {} at {}", name, path.display());
            return Some((path, device));
        }
    }
    None
}
