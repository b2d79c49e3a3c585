//! Configuration management with serde serialization/deserialization
//!
//! This module provides the configuration structures for a capture session
//! (output codec, rate limiting, settle behaviour, browser viewport) and the
//! geometry types shared by the resolver, planner and stitcher.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for stitchshot
///
/// # Examples
///
/// ```rust
/// use stitchshot::{Config, OutputFormat};
///
/// let config = Config::default();
/// assert_eq!(config.settings.output_format, OutputFormat::Webp);
///
/// let config = Config {
///     settings: stitchshot::CaptureSettings {
///         output_format: OutputFormat::Jpeg,
///         output_quality: 0.9,
///     },
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Output codec and quality for the stitched image
    pub settings: CaptureSettings,

    /// Spacing enforced between visible-area capture calls
    pub rate_limit: RateLimitConfig,

    /// Extra delay after the two-frame paint wait (default: none)
    ///
    /// Pages with scroll-triggered animations or lazy images sometimes need
    /// a little longer than two frames to repaint.
    pub settle_delay: Duration,

    /// Browser viewport used when launching Chromium
    pub viewport: Viewport,

    /// Time to wait after navigation before the session starts (default: 1s)
    pub page_load_wait: Duration,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string (default: Chrome default)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: CaptureSettings::default(),
            rate_limit: RateLimitConfig::default(),
            settle_delay: Duration::ZERO,
            viewport: Viewport::default(),
            page_load_wait: Duration::from_secs(1),
            chrome_path: None,
            user_agent: None,
        }
    }
}

/// Output settings for one capture session. Immutable once a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub output_format: OutputFormat,

    /// Encoder quality in `[0, 1]`. Ignored by lossless codecs.
    pub output_quality: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Webp,
            output_quality: 0.8,
        }
    }
}

impl CaptureSettings {
    /// Quality clamped into `[0, 1]`; non-finite values fall back to the default.
    pub fn quality(&self) -> f32 {
        if self.output_quality.is_finite() {
            self.output_quality.clamp(0.0, 1.0)
        } else {
            CaptureSettings::default().output_quality
        }
    }

    /// Encoding requested from the capture primitive for every tile.
    ///
    /// JPEG output is tiled as JPEG at the same quality; PNG and WebP output
    /// are tiled losslessly and only the composite is encoded in the final codec.
    pub fn tile_format(&self) -> TileFormat {
        match self.output_format {
            OutputFormat::Jpeg => TileFormat::Jpeg {
                quality: (self.quality() * 100.0).round() as u8,
            },
            OutputFormat::Png | OutputFormat::Webp => TileFormat::Png,
        }
    }
}

/// Supported output image formats
///
/// - PNG: lossless, largest files
/// - JPEG: lossy, honours quality
/// - WebP: written by the pure-Rust encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// Largest width or height the codec can store.
    pub fn max_dimension(&self) -> u32 {
        match self {
            OutputFormat::Png => u32::MAX,
            OutputFormat::Jpeg => u16::MAX as u32,
            OutputFormat::Webp => 16383,
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" | "image/jpeg" => Ok(OutputFormat::Jpeg),
            "webp" | "image/webp" => Ok(OutputFormat::Webp),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// Encoding of a single tile as requested from the capture primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Png,
    /// JPEG with integer quality 0-100
    Jpeg { quality: u8 },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between two capture calls (default: 1100ms)
    ///
    /// The platform rejects captures issued faster than this, so the
    /// orchestrator waits proactively instead of retrying.
    pub min_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1100),
        }
    }
}

/// Browser viewport configuration
///
/// ```rust
/// use stitchshot::Viewport;
///
/// let retina = Viewport {
///     width: 1440,
///     height: 900,
///     device_scale_factor: 2.0,
/// };
/// assert!(retina.device_scale_factor > 1.0);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Viewport {
    /// Viewport width in CSS pixels (default: 1920)
    pub width: u32,

    /// Viewport height in CSS pixels (default: 1080)
    pub height: u32,

    /// Device pixel ratio (default: 1.0)
    ///
    /// Values > 1.0 make the capture primitive return images larger than
    /// the CSS viewport, which the stitcher scales back down.
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
        }
    }
}

/// Rectangle in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct CssRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CssRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Device-pixel rectangle covering this one at `dpr`, floored per component.
    pub fn to_device(&self, dpr: f64) -> DeviceRect {
        let scale = |v: f64| (v * dpr).floor().max(0.0) as u32;
        DeviceRect {
            x: scale(self.x),
            y: scale(self.y),
            width: scale(self.width),
            height: scale(self.height),
        }
    }
}

/// Rectangle in device pixels of a decoded tile image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DeviceRect {
    /// Intersection with an image of `width x height`; `None` when empty.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<DeviceRect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clamped = DeviceRect {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (clamped.width > 0 && clamped.height > 0).then_some(clamped)
    }
}

/// Which element the session scrolls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroller {
    /// The page's own scrolling root
    Window,
    /// A nested scroll container, identified by its probe index
    Element(usize),
}

/// Measurements of the region being captured, taken once per session.
///
/// `total_height >= viewport_height` does not hold for short pages.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTarget {
    pub scroller: Scroller,
    /// Visible region of the scroller inside the viewport, CSS px
    pub crop_rect: CssRect,
    pub total_width: u32,
    pub total_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_pixel_ratio: f64,
}

impl CaptureTarget {
    pub fn is_window_scroller(&self) -> bool {
        matches!(self.scroller, Scroller::Window)
    }
}

/// Generate Chrome command-line arguments based on configuration
///
/// ```rust
/// use stitchshot::{Config, get_chrome_args};
///
/// let args = get_chrome_args(&Config::default());
/// assert!(args.iter().any(|a| a == "--headless"));
/// ```
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let unique_id = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());

    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!(
            "--force-device-scale-factor={}",
            config.viewport.device_scale_factor
        ),
        format!("--user-data-dir=/tmp/stitchshot-profile-{unique_id}"),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, crate::CaptureError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .map_err(crate::CaptureError::BrowserLaunchFailed)
}

/// Check a configuration before any browser is launched.
pub fn validate_config(config: &Config) -> Result<(), crate::CaptureError> {
    use crate::CaptureError::ConfigurationError;

    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err(ConfigurationError(
            "Viewport dimensions must be greater than 0".to_string(),
        ));
    }

    if !(config.viewport.device_scale_factor > 0.0) {
        return Err(ConfigurationError(
            "Device scale factor must be greater than 0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.settings.output_quality) {
        return Err(ConfigurationError(format!(
            "Output quality must be within [0, 1], got {}",
            config.settings.output_quality
        )));
    }

    if config.rate_limit.min_interval.is_zero() {
        return Err(ConfigurationError(
            "Capture interval must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
