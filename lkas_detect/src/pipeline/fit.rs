//! Step 7 and 9: aggregate a side's candidate segments into one line by
//! weighted least squares (weight = segment length), extrapolate to the
//! image bottom and the ROI horizon, and derive a confidence score.

use lkas_common::consts::LANE_FIT_RESIDUAL_SCALE_PX;

use super::hough::Segment;

/// A fitted lane line, already extrapolated to `(bottom_y, top_y)`.
#[derive(Debug, Clone, Copy)]
pub struct FittedLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

/// Fit `x = m*y + b` to a side's candidate segments, weighting each
/// endpoint by its segment's length, then extrapolate to `bottom_y` (image
/// bottom) and `top_y` (ROI horizon). Returns `None` if no candidates
/// survived (the side is absent this frame).
pub fn fit_side(segments: &[Segment], bottom_y: f64, top_y: f64) -> Option<FittedLine> {
    if segments.is_empty() {
        return None;
    }

    let points: Vec<(f64, f64, f64)> = segments
        .iter()
        .flat_map(|s| {
            let weight = s.length();
            [(s.y1, s.x1, weight), (s.y2, s.x2, weight)]
        })
        .collect();

    let sum_w: f64 = points.iter().map(|(_, _, w)| w).sum();
    if sum_w <= 0.0 {
        return None;
    }

    let sum_wy: f64 = points.iter().map(|(y, _, w)| w * y).sum();
    let sum_wx: f64 = points.iter().map(|(_, x, w)| w * x).sum();
    let sum_wyy: f64 = points.iter().map(|(y, _, w)| w * y * y).sum();
    let sum_wxy: f64 = points.iter().map(|(y, x, w)| w * x * y).sum();

    let denom = sum_w * sum_wyy - sum_wy * sum_wy;
    let (slope, intercept) = if denom.abs() < f64::EPSILON {
        // All points share the same y (degenerate) — fall back to a
        // vertical-ish line through the weighted-mean x.
        (0.0, sum_wx / sum_w)
    } else {
        let m = (sum_w * sum_wxy - sum_wy * sum_wx) / denom;
        let b = (sum_wx - m * sum_wy) / sum_w;
        (m, b)
    };

    let residual_sq: f64 = points
        .iter()
        .map(|(y, x, w)| {
            let predicted = slope * y + intercept;
            w * (x - predicted).powi(2)
        })
        .sum();
    let rmse = (residual_sq / sum_w).sqrt();
    let confidence = (1.0 - rmse / LANE_FIT_RESIDUAL_SCALE_PX).clamp(0.0, 1.0);

    Some(FittedLine {
        x1: slope * bottom_y + intercept,
        y1: bottom_y,
        x2: slope * top_y + intercept,
        y2: top_y,
        confidence,
    })
}
