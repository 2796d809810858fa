//! PD steering law and adaptive throttle: `LaneMetrics` → `ControlCommand`.

use lkas_common::config::{ControllerConfig, ThrottlePolicyConfig};
use lkas_common::model::{ControlCommand, ControlMode, LaneMetrics, LaneStatus};

/// Heading angle normalizer: `heading_angle_norm = heading_angle_rad / (pi/4)`.
const HEADING_NORM_DIVISOR: f64 = std::f64::consts::FRAC_PI_4;

/// Map lane metrics to a steering/throttle/brake command.
///
/// `NO_LANES` short-circuits to the creep failsafe command (`SPEC_FULL.md`
/// §4.C failure semantics); otherwise this always computes the full PD +
/// adaptive-throttle command in `LANE_KEEPING` mode. Whether the caller
/// actually applies it (warm-up gating, explicit failsafe mode) is the
/// orchestrator's decision, not this function's.
pub fn decide(
    metrics: &LaneMetrics,
    controller: &ControllerConfig,
    throttle_policy: &ThrottlePolicyConfig,
) -> ControlCommand {
    if metrics.status == LaneStatus::NoLanes {
        return ControlCommand::creep(throttle_policy.base, ControlMode::Failsafe);
    }

    let heading_angle_norm = (metrics.heading_angle_rad / HEADING_NORM_DIVISOR).clamp(-1.0, 1.0);
    let steer_raw = -(controller.kp * metrics.lateral_offset_norm + controller.kd * heading_angle_norm);
    let steering = steer_raw.clamp(-1.0, 1.0) as f32;

    let throttle = adaptive_throttle(steering.abs(), throttle_policy);

    ControlCommand::new(steering, throttle, 0.0, ControlMode::LaneKeeping)
}

/// `SPEC_FULL.md` §4.C adaptive throttle: flat at `base` below
/// `steer_threshold`, linearly tapering to `min` at `steer_max`.
fn adaptive_throttle(abs_steer: f32, policy: &ThrottlePolicyConfig) -> f32 {
    if abs_steer <= policy.steer_threshold {
        return policy.base;
    }
    let span = policy.steer_max - policy.steer_threshold;
    let t = if span > 0.0 {
        ((abs_steer - policy.steer_threshold) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    policy.base - (policy.base - policy.min) * t
}
