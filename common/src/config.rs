use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub stream: StreamConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub url: String,
    #[serde(default = "default_quality")]
    pub quality: u32,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_mode")]
    pub mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Brightest,
    ColorBlob,
}

/// Constants of the motion estimator and its noise filters.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_detector")]
    pub detector: DetectorKind,
    /// Warm-up window after a session starts during which no speed is emitted.
    #[serde(default = "default_measure_delay_ms")]
    pub measure_delay_ms: u64,
    #[serde(default = "default_true")]
    pub distance_filter: bool,
    /// Displacements shorter than this are treated as detector jitter.
    #[serde(default = "default_min_distance_px")]
    pub min_distance_px: f64,
    #[serde(default = "default_true")]
    pub jump_filter: bool,
    /// Largest believable change between two accepted speeds.
    #[serde(default = "default_max_plausible_delta_kmh")]
    pub max_plausible_delta_kmh: f64,
    /// Oblique mount compensation. 0 disables the correction.
    #[serde(default = "default_camera_angle_deg")]
    pub camera_angle_deg: f64,
    #[serde(default = "default_pixel_to_kmh_scale")]
    pub pixel_to_kmh_scale: f64,
    #[serde(default)]
    pub color_blob: ColorBlobConfig,
}

/// HSV thresholds for the white-ball blob detector (OpenCV ranges).
#[derive(Debug, Clone, Deserialize)]
pub struct ColorBlobConfig {
    #[serde(default = "default_max_saturation")]
    pub max_saturation: u8,
    #[serde(default = "default_min_value")]
    pub min_value: u8,
    #[serde(default = "default_min_area")]
    pub min_area: usize,
    #[serde(default = "default_max_area")]
    pub max_area: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Reset the shown speed to "0" once `speed_hold_ms` passes without an update.
    #[serde(default = "default_true")]
    pub hold: bool,
    #[serde(default = "default_speed_hold_ms")]
    pub speed_hold_ms: u64,
    /// Suppress updates arriving sooner than `speed_update_interval_ms`.
    #[serde(default)]
    pub throttle: bool,
    #[serde(default = "default_speed_update_interval_ms")]
    pub speed_update_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Begin measuring as soon as the driver starts.
    #[serde(default)]
    pub auto_start: bool,
    /// Directory for annotated PNG snapshots of displayed samples.
    #[serde(default)]
    pub snapshot_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detector: default_detector(),
            measure_delay_ms: default_measure_delay_ms(),
            distance_filter: true,
            min_distance_px: default_min_distance_px(),
            jump_filter: true,
            max_plausible_delta_kmh: default_max_plausible_delta_kmh(),
            camera_angle_deg: default_camera_angle_deg(),
            pixel_to_kmh_scale: default_pixel_to_kmh_scale(),
            color_blob: ColorBlobConfig::default(),
        }
    }
}

impl Default for ColorBlobConfig {
    fn default() -> Self {
        Self {
            max_saturation: default_max_saturation(),
            min_value: default_min_value(),
            min_area: default_min_area(),
            max_area: default_max_area(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hold: true,
            speed_hold_ms: default_speed_hold_ms(),
            throttle: false,
            speed_update_interval_ms: default_speed_update_interval_ms(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.stream.validate()?;
        config.tracker.validate()?;
        Ok(config)
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "stream.fps must be positive, got {}",
                self.fps
            )));
        }
        match self.mode.as_str() {
            "mjpeg" | "polling" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "stream.mode must be 'mjpeg' or 'polling', got '{other}'"
            ))),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..90.0).contains(&self.camera_angle_deg) {
            return Err(ConfigError::Invalid(format!(
                "camera_angle_deg must be in [0, 90), got {}",
                self.camera_angle_deg
            )));
        }
        if !self.pixel_to_kmh_scale.is_finite() || self.pixel_to_kmh_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pixel_to_kmh_scale must be positive, got {}",
                self.pixel_to_kmh_scale
            )));
        }
        if !self.min_distance_px.is_finite() || self.min_distance_px < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_distance_px must be non-negative, got {}",
                self.min_distance_px
            )));
        }
        if !self.max_plausible_delta_kmh.is_finite() || self.max_plausible_delta_kmh < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_plausible_delta_kmh must be non-negative, got {}",
                self.max_plausible_delta_kmh
            )));
        }
        if self.color_blob.min_area >= self.color_blob.max_area {
            return Err(ConfigError::Invalid(format!(
                "color_blob.min_area ({}) must be below max_area ({})",
                self.color_blob.min_area, self.color_blob.max_area
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_quality() -> u32 {
    80
}
fn default_fps() -> f64 {
    10.0
}
fn default_mode() -> String {
    "mjpeg".into()
}
fn default_detector() -> DetectorKind {
    DetectorKind::Brightest
}
fn default_measure_delay_ms() -> u64 {
    1000
}
fn default_min_distance_px() -> f64 {
    10.0
}
fn default_max_plausible_delta_kmh() -> f64 {
    100.0
}
fn default_camera_angle_deg() -> f64 {
    45.0
}
fn default_pixel_to_kmh_scale() -> f64 {
    0.1
}
fn default_max_saturation() -> u8 {
    30
}
fn default_min_value() -> u8 {
    100
}
fn default_min_area() -> usize {
    50
}
fn default_max_area() -> usize {
    500
}
fn default_speed_hold_ms() -> u64 {
    5000
}
fn default_speed_update_interval_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".into()
}
