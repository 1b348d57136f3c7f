//! Linux framebuffer output, memory-mapped or written through the device file

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info, instrument, warn};

use super::{DisplaySink, DisplayTarget};
use crate::DisplayError;

fn open_device(path: &Path) -> Result<File, DisplayError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| DisplayError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn check_len(target: &DisplayTarget, frame: &[u8]) -> Result<(), DisplayError> {
    if frame.len() != target.frame_len() {
        return Err(DisplayError::SizeMismatch {
            expected: target.frame_len(),
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Memory-mapped `/dev/fbN`. The mapping lives as long as the display.
pub struct FramebufferDisplay {
    mem: MmapMut,
    target: DisplayTarget,
    path: PathBuf,
}

impl FramebufferDisplay {
    #[instrument(skip(target))]
    pub fn open(path: &Path, target: DisplayTarget) -> Result<Self, DisplayError> {
        let file = open_device(path)?;
        // Device nodes report a zero length, so the size comes from the target.
        let mem = unsafe { MmapOptions::new().len(target.frame_len()).map_mut(&file) }
            .map_err(DisplayError::Map)?;

        info!(
            "Framebuffer {} mapped: {}x{} {:?}",
            path.display(),
            target.width,
            target.height,
            target.format
        );
        Ok(Self {
            mem,
            target,
            path: path.to_path_buf(),
        })
    }
}

impl DisplaySink for FramebufferDisplay {
    fn target(&self) -> &DisplayTarget {
        &self.target
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), DisplayError> {
        check_len(&self.target, frame)?;
        self.mem[..frame.len()].copy_from_slice(frame);
        Ok(())
    }
}

impl Drop for FramebufferDisplay {
    fn drop(&mut self) {
        debug!("Unmapping framebuffer {}", self.path.display());
    }
}

/// Framebuffer written with seek + write, for drivers that refuse mmap
pub struct DeviceFileDisplay {
    file: File,
    target: DisplayTarget,
}

impl DeviceFileDisplay {
    #[instrument(skip(target))]
    pub fn open(path: &Path, target: DisplayTarget) -> Result<Self, DisplayError> {
        let file = open_device(path)?;
        info!(
            "Framebuffer {} opened for writing: {}x{} {:?}",
            path.display(),
            target.width,
            target.height,
            target.format
        );
        Ok(Self { file, target })
    }
}

impl DisplaySink for DeviceFileDisplay {
    fn target(&self) -> &DisplayTarget {
        &self.target
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), DisplayError> {
        check_len(&self.target, frame)?;
        self.file.seek(SeekFrom::Start(0)).map_err(DisplayError::Write)?;
        self.file.write_all(frame).map_err(DisplayError::Write)?;
        self.file.flush().map_err(DisplayError::Write)
    }
}

const HIDE_CURSOR: &[u8] = b"\x1b[?25l";
const SHOW_CURSOR: &[u8] = b"\x1b[?25h";

/// Hides the text console cursor over the framebuffer until dropped.
/// Best effort: a missing or unwritable tty only logs.
pub struct CursorGuard {
    tty: Option<File>,
}

impl CursorGuard {
    pub fn hide(path: &Path) -> Self {
        let tty = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|mut tty| tty.write_all(HIDE_CURSOR).map(|_| tty));
        match tty {
            Ok(tty) => {
                debug!("Console cursor hidden on {}", path.display());
                Self { tty: Some(tty) }
            }
            Err(e) => {
                warn!("Could not hide cursor on {}: {}", path.display(), e);
                Self { tty: None }
            }
        }
    }

    pub fn disabled() -> Self {
        Self { tty: None }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        if let Some(tty) = self.tty.as_mut() {
            if let Err(e) = tty.write_all(SHOW_CURSOR) {
                warn!("Could not restore console cursor: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn fake_device(len: usize) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len(len as u64).unwrap();
        file
    }

    fn contents(file: &tempfile::NamedTempFile) -> Vec<u8> {
        let mut buf = Vec::new();
        File::open(file.path()).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn mapped_write_lands_at_offset_zero() {
        let target = DisplayTarget::new(4, 2, 16).unwrap();
        let device = fake_device(target.frame_len());
        {
            let mut display = FramebufferDisplay::open(device.path(), target).unwrap();
            let frame: Vec<u8> = (0..16).collect();
            display.write(&frame).unwrap();
        }
        assert_eq!(contents(&device), (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn device_file_rewrites_from_start() {
        let target = DisplayTarget::new(2, 2, 24).unwrap();
        let device = fake_device(0);
        let mut display = DeviceFileDisplay::open(device.path(), target).unwrap();

        display.write(&[1; 12]).unwrap();
        display.write(&[2; 12]).unwrap();
        assert_eq!(contents(&device), vec![2; 12]);

        display.blank().unwrap();
        assert_eq!(contents(&device), vec![0; 12]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let target = DisplayTarget::new(2, 2, 32).unwrap();
        let device = fake_device(target.frame_len());
        let mut display = FramebufferDisplay::open(device.path(), target).unwrap();
        assert!(matches!(
            display.write(&[0; 3]),
            Err(DisplayError::SizeMismatch { expected: 16, actual: 3 })
        ));
    }

    #[test]
    fn missing_device_is_an_open_error() {
        let target = DisplayTarget::fallback();
        let result = DeviceFileDisplay::open(Path::new("/nonexistent/fb9"), target);
        assert!(matches!(result, Err(DisplayError::Open { .. })));
    }

    #[test]
    fn cursor_is_restored_on_drop() {
        let tty = tempfile::NamedTempFile::new().unwrap();
        {
            let _guard = CursorGuard::hide(tty.path());
        }
        assert_eq!(contents(&tty), b"\x1b[?25l\x1b[?25h".to_vec());
    }
}
