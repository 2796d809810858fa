//! Configuration schema and TOML loading for every LKAS process.
//!
//! The schema mirrors the groups enumerated in `SPEC_FULL.md` §6: `camera`,
//! `detector.cv`, `analyzer`, `controller`, `throttle_policy`, `loop`, `shm`,
//! `broadcast`, and the ambient `shared` group (log level, service name).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts;

/// Log level for configuration, following `tracing`'s level names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_env_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_service_name() -> String {
    "lkas".to_string()
}

/// Error type for configuration loading/validation, shared across every
/// process that reads the config file.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Ambient logging/identity fields shared by every process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            service_name: default_service_name(),
        }
    }
}

/// Camera sensor geometry (`[camera]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fov")]
    pub fov: f64,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub rotation: [f64; 3],
}

fn default_fov() -> f64 {
    90.0
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fov: default_fov(),
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
        }
    }
}

/// Classical CV pipeline parameters (`[detector.cv]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorCvConfig {
    #[serde(default = "default_canny_low")]
    pub canny_low: f64,
    #[serde(default = "default_canny_high")]
    pub canny_high: f64,
    #[serde(default = "default_hough_threshold")]
    pub hough_threshold: i32,
    #[serde(default = "default_hough_min_line_len")]
    pub hough_min_line_len: f64,
    #[serde(default = "default_hough_max_line_gap")]
    pub hough_max_line_gap: f64,
    #[serde(default = "default_min_slope")]
    pub min_slope: f64,
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,
    #[serde(default = "default_roi_top_y")]
    pub roi_top_y: f64,
    #[serde(default = "default_roi_top_left_x")]
    pub roi_top_left_x: f64,
    #[serde(default = "default_roi_top_right_x")]
    pub roi_top_right_x: f64,
    #[serde(default = "default_roi_bottom_left_x")]
    pub roi_bottom_left_x: f64,
    #[serde(default = "default_roi_bottom_right_x")]
    pub roi_bottom_right_x: f64,
}

fn default_canny_low() -> f64 {
    50.0
}
fn default_canny_high() -> f64 {
    150.0
}
fn default_hough_threshold() -> i32 {
    20
}
fn default_hough_min_line_len() -> f64 {
    20.0
}
fn default_hough_max_line_gap() -> f64 {
    300.0
}
fn default_min_slope() -> f64 {
    0.3
}
fn default_smoothing_factor() -> f64 {
    0.8
}
fn default_roi_top_y() -> f64 {
    0.6
}
fn default_roi_top_left_x() -> f64 {
    0.45
}
fn default_roi_top_right_x() -> f64 {
    0.55
}
fn default_roi_bottom_left_x() -> f64 {
    0.1
}
fn default_roi_bottom_right_x() -> f64 {
    0.9
}

impl Default for DetectorCvConfig {
    fn default() -> Self {
        Self {
            canny_low: default_canny_low(),
            canny_high: default_canny_high(),
            hough_threshold: default_hough_threshold(),
            hough_min_line_len: default_hough_min_line_len(),
            hough_max_line_gap: default_hough_max_line_gap(),
            min_slope: default_min_slope(),
            smoothing_factor: default_smoothing_factor(),
            roi_top_y: default_roi_top_y(),
            roi_top_left_x: default_roi_top_left_x(),
            roi_top_right_x: default_roi_top_right_x(),
            roi_bottom_left_x: default_roi_bottom_left_x(),
            roi_bottom_right_x: default_roi_bottom_right_x(),
        }
    }
}

/// `[detector]` wraps the `cv` sub-table (`[detector.cv]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub cv: DetectorCvConfig,
    /// Address the detector worker listens on for its own parameter/reset
    /// channel (`SPEC_FULL.md` §4.B, §4.E) — separate from the
    /// orchestrator's `broadcast.action_url` since the two are independent
    /// processes with no shared memory for this purpose.
    #[serde(default = "default_detector_action_url")]
    pub action_url: String,
}

fn default_detector_action_url() -> String {
    "0.0.0.0:7802".to_string()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cv: DetectorCvConfig::default(),
            action_url: default_detector_action_url(),
        }
    }
}

/// Lane-status thresholds (`[analyzer]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_lane_width_m")]
    pub lane_width_m: f64,
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    #[serde(default = "default_departure_threshold")]
    pub departure_threshold: f64,
}

fn default_lane_width_m() -> f64 {
    consts::LANE_WIDTH_M_DEFAULT
}
fn default_drift_threshold() -> f64 {
    consts::DRIFT_THRESHOLD_DEFAULT
}
fn default_departure_threshold() -> f64 {
    consts::DEPARTURE_THRESHOLD_DEFAULT
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lane_width_m: default_lane_width_m(),
            drift_threshold: default_drift_threshold(),
            departure_threshold: default_departure_threshold(),
        }
    }
}

/// PD steering gains (`[controller]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default = "default_kd")]
    pub kd: f64,
}

fn default_kp() -> f64 {
    consts::KP_DEFAULT
}
fn default_kd() -> f64 {
    consts::KD_DEFAULT
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            kd: default_kd(),
        }
    }
}

/// Adaptive throttle interpolation (`[throttle_policy]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlePolicyConfig {
    #[serde(default = "default_throttle_base")]
    pub base: f32,
    #[serde(default = "default_throttle_min")]
    pub min: f32,
    #[serde(default = "default_steer_threshold")]
    pub steer_threshold: f32,
    #[serde(default = "default_steer_max")]
    pub steer_max: f32,
}

fn default_throttle_base() -> f32 {
    consts::THROTTLE_BASE_DEFAULT
}
fn default_throttle_min() -> f32 {
    consts::THROTTLE_MIN_DEFAULT
}
fn default_steer_threshold() -> f32 {
    consts::STEER_THRESHOLD_DEFAULT
}
fn default_steer_max() -> f32 {
    consts::STEER_MAX_DEFAULT
}

impl Default for ThrottlePolicyConfig {
    fn default() -> Self {
        Self {
            base: default_throttle_base(),
            min: default_throttle_min(),
            steer_threshold: default_steer_threshold(),
            steer_max: default_steer_max(),
        }
    }
}

/// Tick-loop scheduling (`[loop]`). `r#loop` avoids the Rust keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u64,
    #[serde(default = "default_failsafe_consecutive")]
    pub failsafe_consecutive: u32,
}

fn default_tick_hz() -> u32 {
    consts::TICK_HZ_DEFAULT
}
fn default_warmup_frames() -> u64 {
    consts::WARMUP_FRAMES_DEFAULT
}
fn default_failsafe_consecutive() -> u32 {
    consts::FAILSAFE_CONSECUTIVE_DEFAULT
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            warmup_frames: default_warmup_frames(),
            failsafe_consecutive: default_failsafe_consecutive(),
        }
    }
}

impl LoopConfig {
    /// Tick period as a `Duration`.
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }
}

/// SHM channel naming and attach policy (`[shm]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShmConfig {
    #[serde(default = "default_image_name")]
    pub image_name: String,
    #[serde(default = "default_detection_name")]
    pub detection_name: String,
    #[serde(default = "default_attach_retry_count")]
    pub attach_retry_count: u32,
    #[serde(default = "default_attach_retry_delay_s")]
    pub attach_retry_delay_s: f64,
}

fn default_image_name() -> String {
    consts::SHM_IMAGE_NAME_DEFAULT.to_string()
}
fn default_detection_name() -> String {
    consts::SHM_DETECTION_NAME_DEFAULT.to_string()
}
fn default_attach_retry_count() -> u32 {
    consts::SHM_ATTACH_RETRY_COUNT_DEFAULT
}
fn default_attach_retry_delay_s() -> f64 {
    consts::SHM_ATTACH_RETRY_DELAY_S_DEFAULT
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            image_name: default_image_name(),
            detection_name: default_detection_name(),
            attach_retry_count: default_attach_retry_count(),
            attach_retry_delay_s: default_attach_retry_delay_s(),
        }
    }
}

/// Telemetry broadcaster (`[broadcast]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_broadcast_url")]
    pub broadcast_url: String,
    #[serde(default = "default_action_url")]
    pub action_url: String,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub send_frames: bool,
}

fn default_true() -> bool {
    true
}
fn default_broadcast_url() -> String {
    "0.0.0.0:7800".to_string()
}
fn default_action_url() -> String {
    "0.0.0.0:7801".to_string()
}
fn default_jpeg_quality() -> u8 {
    consts::JPEG_QUALITY_DEFAULT
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            broadcast_url: default_broadcast_url(),
            action_url: default_action_url(),
            jpeg_quality: default_jpeg_quality(),
            send_frames: false,
        }
    }
}

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub throttle_policy: ThrottlePolicyConfig,
    #[serde(rename = "loop", default)]
    pub loop_: LoopConfig,
    #[serde(default)]
    pub shm: ShmConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

impl Config {
    /// Validate cross-field and bounds constraints not expressible through
    /// `serde(default)` alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(consts::TICK_HZ_MIN..=consts::TICK_HZ_MAX).contains(&self.loop_.tick_hz) {
            return Err(ConfigError::ValidationError(format!(
                "loop.tick_hz={} out of range [{}, {}]",
                self.loop_.tick_hz,
                consts::TICK_HZ_MIN,
                consts::TICK_HZ_MAX
            )));
        }
        if self.throttle_policy.min > self.throttle_policy.base {
            return Err(ConfigError::ValidationError(format!(
                "throttle_policy.min={} must be <= throttle_policy.base={}",
                self.throttle_policy.min, self.throttle_policy.base
            )));
        }
        if self.throttle_policy.steer_threshold > self.throttle_policy.steer_max {
            return Err(ConfigError::ValidationError(format!(
                "throttle_policy.steer_threshold={} must be <= steer_max={}",
                self.throttle_policy.steer_threshold, self.throttle_policy.steer_max
            )));
        }
        if self.analyzer.drift_threshold >= self.analyzer.departure_threshold {
            return Err(ConfigError::ValidationError(format!(
                "analyzer.drift_threshold={} must be < departure_threshold={}",
                self.analyzer.drift_threshold, self.analyzer.departure_threshold
            )));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::ValidationError(
                "camera.width and camera.height must be > 0".to_string(),
            ));
        }
        if self.detector.cv.canny_low >= self.detector.cv.canny_high {
            return Err(ConfigError::ValidationError(format!(
                "detector.cv.canny_low={} must be < canny_high={}",
                self.detector.cv.canny_low, self.detector.cv.canny_high
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.cv.smoothing_factor) {
            return Err(ConfigError::ValidationError(format!(
                "detector.cv.smoothing_factor={} out of range [0, 1]",
                self.detector.cv.smoothing_factor
            )));
        }
        if self.shared.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "shared.service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate configuration from a TOML file on disk.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            ConfigError::ParseError(e.to_string())
        }
    })?;
    load_config_from_str(&content)
}

/// Load and validate configuration from a TOML string (used by tests, and
/// by any caller that already has the file contents in hand).
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_all_defaults_and_validates() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.loop_.tick_hz, consts::TICK_HZ_DEFAULT);
        assert_eq!(config.shared.service_name, "lkas");
    }

    #[test]
    fn rejects_tick_hz_out_of_range() {
        let err = load_config_from_str("[loop]\ntick_hz = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_inverted_throttle_bounds() {
        let toml_str = "[throttle_policy]\nbase = 0.2\nmin = 0.5\n";
        let err = load_config_from_str(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_inverted_status_thresholds() {
        let toml_str = "[analyzer]\ndrift_threshold = 0.5\ndeparture_threshold = 0.2\n";
        let err = load_config_from_str(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn parses_full_schema_with_nested_detector_cv_table() {
        let toml_str = r#"
            [shared]
            log_level = "debug"
            service_name = "lkas-orchestrator"

            [camera]
            width = 1280
            height = 720

            [detector.cv]
            canny_low = 40.0
            canny_high = 120.0

            [loop]
            tick_hz = 30
            warmup_frames = 10
        "#;
        let config = load_config_from_str(toml_str).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.detector.cv.canny_low, 40.0);
        assert_eq!(config.loop_.tick_hz, 30);
        assert_eq!(config.loop_.warmup_frames, 10);
    }

    #[test]
    fn missing_file_reports_file_not_found() {
        let err = load_config(Path::new("/nonexistent/lkas/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn tick_period_matches_tick_hz() {
        let loop_cfg = LoopConfig {
            tick_hz: 20,
            ..Default::default()
        };
        assert!((loop_cfg.tick_period().as_secs_f64() - 0.05).abs() < 1e-9);
    }
}
