//! Lane geometry analysis: `DetectionResult` + camera geometry → `LaneMetrics`.

use lkas_common::config::{AnalyzerConfig, CameraConfig, DetectorCvConfig};
use lkas_common::model::{DetectionResult, Lane, LaneMetrics, LaneStatus};

use crate::error::{DecideError, DecideResult};

/// Image geometry needed by `analyze`, derived once from `Config` at
/// startup rather than threaded through as four loose arguments per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageGeometry {
    pub width: f64,
    pub height: f64,
    /// `y = roi_top_y * height` — the fixed horizon every present lane is
    /// extrapolated to (see `SPEC_FULL.md` §4.B step 7).
    pub roi_top_y_px: f64,
    /// Lane width assumed when only one side is detected, in pixels.
    /// Derived from the bottom-row ROI fractions, which is the only notion
    /// of "lane width" the camera geometry carries on its own.
    pub default_lane_width_px: f64,
}

impl ImageGeometry {
    pub fn new(camera: &CameraConfig, cv: &DetectorCvConfig) -> Self {
        let width = camera.width as f64;
        let height = camera.height as f64;
        Self {
            width,
            height,
            roi_top_y_px: cv.roi_top_y * height,
            default_lane_width_px: (cv.roi_bottom_right_x - cv.roi_bottom_left_x) * width,
        }
    }
}

/// Bottom/top x of the lane center, accounting for a missing side by
/// offsetting the present lane by half the assumed lane width.
fn lane_center(
    left: Option<&Lane>,
    right: Option<&Lane>,
    lane_width_px: f64,
) -> Option<(f64, f64)> {
    match (left, right) {
        (Some(l), Some(r)) => Some(((l.x1 + r.x1) / 2.0, (l.x2 + r.x2) / 2.0)),
        (Some(l), None) => Some((l.x1 + lane_width_px / 2.0, l.x2 + lane_width_px / 2.0)),
        (None, Some(r)) => Some((r.x1 - lane_width_px / 2.0, r.x2 - lane_width_px / 2.0)),
        (None, None) => None,
    }
}

/// Compute `LaneMetrics` from one detection frame and the camera geometry
/// used to produce it. Pure: no state carried across calls (see
/// `SPEC_FULL.md` §9 Open Question resolution 4).
pub fn analyze(
    detection: &DetectionResult,
    geom: &ImageGeometry,
    analyzer: &AnalyzerConfig,
) -> DecideResult<LaneMetrics> {
    if geom.width <= 0.0 || geom.height <= 0.0 {
        return Err(DecideError::InvalidGeometry(format!(
            "width={}, height={} must both be positive",
            geom.width, geom.height
        )));
    }

    let lane_width_px = match (&detection.left_lane, &detection.right_lane) {
        (Some(l), Some(r)) => (r.x1 - l.x1).abs(),
        _ => geom.default_lane_width_px,
    };

    let Some((center_bottom, center_top)) = lane_center(
        detection.left_lane.as_ref(),
        detection.right_lane.as_ref(),
        lane_width_px,
    ) else {
        return Ok(LaneMetrics {
            lateral_offset_px: 0.0,
            lateral_offset_m: 0.0,
            lateral_offset_norm: 0.0,
            heading_angle_rad: 0.0,
            lane_center_x_px: geom.width / 2.0,
            lane_width_px: geom.default_lane_width_px,
            status: LaneStatus::NoLanes,
        });
    };

    let lateral_offset_px = center_bottom - geom.width / 2.0;
    let lateral_offset_norm = (lateral_offset_px / (geom.width / 2.0)).clamp(-1.0, 1.0);
    let lateral_offset_m = lateral_offset_px * (analyzer.lane_width_m / lane_width_px);

    let dx = center_top - center_bottom;
    let dy = geom.height - geom.roi_top_y_px;
    let heading_angle_rad = dx.atan2(dy);

    let abs_norm = lateral_offset_norm.abs();
    let status = if abs_norm >= analyzer.departure_threshold {
        LaneStatus::Departure
    } else if abs_norm >= analyzer.drift_threshold {
        LaneStatus::Drift
    } else {
        LaneStatus::Centered
    };

    Ok(LaneMetrics {
        lateral_offset_px,
        lateral_offset_m,
        lateral_offset_norm,
        heading_angle_rad,
        lane_center_x_px: center_bottom,
        lane_width_px,
        status,
    })
}
