//! Core data model shared by the detector, decision controller, and
//! orchestrator: [`Lane`], [`DetectionResult`], [`LaneMetrics`], and
//! [`ControlCommand`].

use serde::{Deserialize, Serialize};

/// One detected lane boundary, expressed as a line segment in image pixel
/// coordinates running from the bottom of the frame (`p1`) to a fixed
/// horizon line near the top of the region of interest (`p2`).
///
/// Invariant: `y1 > y2` — the bottom point always has the larger `y`. The
/// producer (the detector) is responsible for this; consumers may assume it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// Confidence in `[0, 1]`, derived from the line-fit residual.
    pub confidence: f64,
}

impl Lane {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Slope `dy/dx`; `None` for a (near-)vertical segment.
    pub fn slope(&self) -> Option<f64> {
        let dx = self.x2 - self.x1;
        if dx.abs() < f64::EPSILON {
            None
        } else {
            Some((self.y2 - self.y1) / dx)
        }
    }

    /// Euclidean length of the segment.
    pub fn length(&self) -> f64 {
        ((self.x2 - self.x1).powi(2) + (self.y2 - self.y1).powi(2)).sqrt()
    }

    /// `x` at a given `y`, via linear interpolation along the segment.
    /// Returns `None` for a perfectly horizontal segment.
    pub fn x_at_y(&self, y: f64) -> Option<f64> {
        let dy = self.y2 - self.y1;
        if dy.abs() < f64::EPSILON {
            return None;
        }
        let t = (y - self.y1) / dy;
        Some(self.x1 + t * (self.x2 - self.x1))
    }
}

/// One detector output frame. Either lane may be absent; `frame_id` matches
/// the image frame that produced it and is monotonically non-decreasing
/// across a single detector's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub frame_id: u64,
    pub timestamp: f64,
    pub processing_time_ms: f64,
    pub left_lane: Option<Lane>,
    pub right_lane: Option<Lane>,
}

impl DetectionResult {
    pub fn empty(frame_id: u64, timestamp: f64, processing_time_ms: f64) -> Self {
        Self {
            frame_id,
            timestamp,
            processing_time_ms,
            left_lane: None,
            right_lane: None,
        }
    }

    /// True when both lane sides were detected this frame.
    pub fn has_both(&self) -> bool {
        self.left_lane.is_some() && self.right_lane.is_some()
    }

    /// True when neither lane side was detected this frame.
    pub fn has_none(&self) -> bool {
        self.left_lane.is_none() && self.right_lane.is_none()
    }
}

/// Coarse classification of how well-centered the vehicle is in its lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneStatus {
    Centered,
    Drift,
    Departure,
    NoLanes,
}

/// Geometry derived from a [`DetectionResult`] plus camera intrinsics:
/// lateral offset, heading angle, and lane width, all relative to image
/// center at the bottom row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneMetrics {
    pub lateral_offset_px: f64,
    pub lateral_offset_m: f64,
    pub lateral_offset_norm: f64,
    pub heading_angle_rad: f64,
    pub lane_center_x_px: f64,
    pub lane_width_px: f64,
    pub status: LaneStatus,
}

/// Supervisory mode a [`ControlCommand`] was produced under. Mirrors
/// [`crate::mode::Mode`] but travels with the command itself so a consumer
/// (broadcaster, logger) does not need the orchestrator's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Warmup,
    LaneKeeping,
    Failsafe,
}

/// A steering/throttle/brake triple ready to hand to the vehicle actuator.
///
/// Invariant: `throttle` and `brake` are never simultaneously positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub steering: f32,
    pub throttle: f32,
    pub brake: f32,
    pub mode: ControlMode,
}

impl ControlCommand {
    pub fn new(steering: f32, throttle: f32, brake: f32, mode: ControlMode) -> Self {
        let cmd = Self {
            steering: steering.clamp(-1.0, 1.0),
            throttle: throttle.clamp(0.0, 1.0),
            brake: brake.clamp(0.0, 1.0),
            mode,
        };
        debug_assert!(
            cmd.throttle == 0.0 || cmd.brake == 0.0,
            "throttle and brake must not both be positive"
        );
        cmd
    }

    /// The zero-steer, base-throttle, no-brake command used by warm-up and
    /// failsafe (see `SPEC_FULL.md` §9 Open Question resolutions).
    pub fn creep(base_throttle: f32, mode: ControlMode) -> Self {
        Self::new(0.0, base_throttle, 0.0, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_slope_is_none_for_vertical_segment() {
        let lane = Lane::new(100.0, 600.0, 100.0, 300.0, 0.9);
        assert!(lane.slope().is_none());
    }

    #[test]
    fn lane_slope_matches_expected_for_diagonal_segment() {
        let lane = Lane::new(0.0, 0.0, 10.0, 20.0, 1.0);
        assert_eq!(lane.slope(), Some(2.0));
    }

    #[test]
    fn lane_x_at_y_interpolates() {
        let lane = Lane::new(240.0, 600.0, 360.0, 360.0, 1.0);
        let x = lane.x_at_y(480.0).unwrap();
        assert!((x - 300.0).abs() < 1e-6);
    }

    #[test]
    fn control_command_clamps_out_of_range_values() {
        let cmd = ControlCommand::new(2.0, 5.0, -5.0, ControlMode::LaneKeeping);
        assert_eq!(cmd.steering, 1.0);
        assert_eq!(cmd.throttle, 1.0);
        assert_eq!(cmd.brake, 0.0);
    }

    #[test]
    fn creep_command_has_zero_steer_and_no_brake() {
        let cmd = ControlCommand::creep(0.45, ControlMode::Warmup);
        assert_eq!(cmd.steering, 0.0);
        assert_eq!(cmd.brake, 0.0);
        assert_eq!(cmd.throttle, 0.45);
    }

    #[test]
    fn detection_result_has_both_and_has_none() {
        let mut d = DetectionResult::empty(0, 0.0, 1.0);
        assert!(d.has_none());
        assert!(!d.has_both());
        d.left_lane = Some(Lane::new(0.0, 0.0, 1.0, 1.0, 1.0));
        assert!(!d.has_none());
        assert!(!d.has_both());
        d.right_lane = Some(Lane::new(0.0, 0.0, 1.0, 1.0, 1.0));
        assert!(d.has_both());
    }
}
