//! System-wide constants for the LKAS workspace.
//!
//! Single source of truth for numeric limits and defaults. Imported by all
//! crates — no duplication permitted.

/// Tick rate of the orchestrator's control loop [Hz].
pub const TICK_HZ_DEFAULT: u32 = 20;

/// Minimum allowed tick rate [Hz].
pub const TICK_HZ_MIN: u32 = 1;

/// Maximum allowed tick rate [Hz].
pub const TICK_HZ_MAX: u32 = 120;

/// Default number of warm-up frames before lane-keeping engages.
pub const WARMUP_FRAMES_DEFAULT: u64 = 50;

/// Default consecutive-miss threshold before entering failsafe (`K`).
pub const FAILSAFE_CONSECUTIVE_DEFAULT: u32 = 5;

/// Fraction of one tick period allotted to waiting for a detection (0.8 * dt).
pub const DETECTION_READ_TIMEOUT_FRACTION: f64 = 0.8;

/// Maximum age, in frames, of a detection the orchestrator may still apply.
pub const MAX_DETECTION_STALENESS_FRAMES: u64 = 2;

/// Multiple of one tick period after which a stalled simulator tick is fatal.
pub const SIMULATOR_TICK_TIMEOUT_MULTIPLIER: f64 = 2.0;

/// Default lane width used to estimate a missing lane side [m].
pub const LANE_WIDTH_M_DEFAULT: f64 = 3.7;

/// Default lateral-offset drift threshold (normalized [-1,1]).
pub const DRIFT_THRESHOLD_DEFAULT: f64 = 0.15;

/// Default lateral-offset departure threshold (normalized [-1,1]).
pub const DEPARTURE_THRESHOLD_DEFAULT: f64 = 0.35;

/// Default proportional gain for the steering PD law.
pub const KP_DEFAULT: f64 = 0.5;

/// Default derivative gain for the steering PD law.
pub const KD_DEFAULT: f64 = 0.2;

/// Default base (cruise) throttle.
pub const THROTTLE_BASE_DEFAULT: f32 = 0.45;

/// Default minimum throttle at maximum steering.
pub const THROTTLE_MIN_DEFAULT: f32 = 0.15;

/// Default |steer| above which throttle begins to taper.
pub const STEER_THRESHOLD_DEFAULT: f32 = 0.3;

/// Default |steer| at which throttle reaches its minimum.
pub const STEER_MAX_DEFAULT: f32 = 0.9;

/// Default attach retry count for SHM consumers.
pub const SHM_ATTACH_RETRY_COUNT_DEFAULT: u32 = 20;

/// Default delay between SHM attach retries [s].
pub const SHM_ATTACH_RETRY_DELAY_S_DEFAULT: f64 = 0.5;

/// Default name of the image ring.
pub const SHM_IMAGE_NAME_DEFAULT: &str = "camera_feed";

/// Default name of the detection ring.
pub const SHM_DETECTION_NAME_DEFAULT: &str = "detection_results";

/// Default JPEG quality used for the `frame` broadcast topic.
pub const JPEG_QUALITY_DEFAULT: u8 = 80;

/// Default broadcast high-water mark (slots kept before dropping oldest).
pub const BROADCAST_HWM_DEFAULT: usize = 10;

/// Default EMA-reset window: frames a lane side may be absent before the
/// smoother forgets its previous estimate.
pub const SMOOTHING_RESET_FRAMES_DEFAULT: u32 = 3;

/// Number of frames between periodic status line logs.
pub const STATUS_LOG_INTERVAL_FRAMES: u64 = 30;

/// Residual scale [px] dividing the weighted-LSQ fit residual when
/// computing per-side detection confidence (`clamp(1 - residual/scale, 0, 1)`).
pub const LANE_FIT_RESIDUAL_SCALE_PX: f64 = 20.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lkas/config.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rate_bounds_are_consistent() {
        assert!(TICK_HZ_MIN <= TICK_HZ_DEFAULT);
        assert!(TICK_HZ_DEFAULT <= TICK_HZ_MAX);
    }

    #[test]
    fn throttle_bounds_are_consistent() {
        assert!(THROTTLE_MIN_DEFAULT <= THROTTLE_BASE_DEFAULT);
        assert!(STEER_THRESHOLD_DEFAULT <= STEER_MAX_DEFAULT);
    }

    #[test]
    fn threshold_ordering_holds() {
        assert!(DRIFT_THRESHOLD_DEFAULT < DEPARTURE_THRESHOLD_DEFAULT);
    }
}
