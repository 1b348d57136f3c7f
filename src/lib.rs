pub mod capture;
pub mod channel;
pub mod display;
pub mod error;
pub mod input;
pub mod overlay;
pub mod pipeline;
pub mod utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use capture::{Frame, PixelFormat};
pub use channel::ChannelRegistry;
pub use error::{CalibrationError, ConfigError, DisplayError, StreamError};
pub use input::Calibration;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DOORVIEW";

/// One camera feed the viewer can switch to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub name: String,
    pub url: String,
}

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cameras: Vec<CameraDescriptor>,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub touch: TouchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayBackend {
    /// Memory-mapped fbdev
    Framebuffer,
    /// Seek-and-write fbdev, for drivers without mmap support
    DeviceFile,
    /// SDL2 window surface
    Sdl2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub backend: DisplayBackend,
    pub device: PathBuf,
    /// sysfs directory describing `device`
    pub sysfs: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bits_per_pixel: Option<u32>,
    /// Console whose cursor is hidden while the framebuffer is in use
    pub cursor_tty: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    pub enabled: bool,
    /// Case-insensitive substrings matched against input device names
    pub name_patterns: Vec<String>,
    /// Width in pixels of the left/right navigation zones
    pub margin: u32,
    pub debounce_ms: u64,
    pub calibration: Calibration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_fps: u32,
    /// Idle seconds before advancing to the next channel; 0 disables
    pub auto_cycle_secs: u64,
    pub reconnect_delay_ms: u64,
    pub lost_delay_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backend: DisplayBackend::Framebuffer,
            device: PathBuf::from("/dev/fb0"),
            sysfs: PathBuf::from("/sys/class/graphics/fb0"),
            width: None,
            height: None,
            bits_per_pixel: None,
            cursor_tty: Some(PathBuf::from("/dev/tty1")),
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name_patterns: vec![
                "touchscreen".into(),
                "ads7846".into(),
                "waveshare".into(),
            ],
            margin: 80,
            debounce_ms: 500,
            calibration: Calibration::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_fps: 12,
            auto_cycle_secs: 1800,
            reconnect_delay_ms: 5000,
            lost_delay_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }

    pub fn auto_cycle(&self) -> Option<Duration> {
        (self.auto_cycle_secs > 0).then(|| Duration::from_secs(self.auto_cycle_secs))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn lost_delay(&self) -> Duration {
        Duration::from_millis(self.lost_delay_ms)
    }
}

impl TouchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load from `path`, layered with `DOORVIEW_*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let config: Config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        info!("Loaded {} cameras", config.cameras.len());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cameras.is_empty() {
            return Err(ConfigError::NoCameras);
        }
        for (index, camera) in self.cameras.iter().enumerate() {
            if camera.name.trim().is_empty() {
                return Err(ConfigError::EmptyField { index, field: "name" });
            }
            if camera.url.trim().is_empty() {
                return Err(ConfigError::EmptyField { index, field: "url" });
            }
        }
        if self.pipeline.target_fps == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        self.touch.calibration.validate()?;
        Ok(())
    }
}
