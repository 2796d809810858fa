//! The classical CV lane detector: the nine-step pipeline in
//! `SPEC_FULL.md` §4.B, wired together and carrying EMA state across calls.

use image::RgbImage;
use lkas_common::config::DetectorCvConfig;
use lkas_common::model::{DetectionResult, Lane};

use crate::pipeline::{self, classify, fit, hough::HoughParams, roi::Roi, smoothing::SideSmoother};

/// Stateful classical detector: owns its tunable parameters and the EMA
/// smoothers carried between frames.
pub struct ClassicalDetector {
    params: DetectorCvConfig,
    smoothing_reset_frames: u32,
    left_smoother: SideSmoother,
    right_smoother: SideSmoother,
}

impl ClassicalDetector {
    pub fn new(params: DetectorCvConfig, smoothing_reset_frames: u32) -> Self {
        Self {
            params,
            smoothing_reset_frames,
            left_smoother: SideSmoother::default(),
            right_smoother: SideSmoother::default(),
        }
    }

    /// Apply a single named parameter update (see `SPEC_FULL.md` §4.E).
    /// Unknown names are rejected so the caller can log and ignore them.
    pub fn apply_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "canny_low" => self.params.canny_low = value,
            "canny_high" => self.params.canny_high = value,
            "hough_threshold" => self.params.hough_threshold = value as i32,
            "hough_min_line_len" => self.params.hough_min_line_len = value,
            "hough_max_line_gap" => self.params.hough_max_line_gap = value,
            "min_slope" => self.params.min_slope = value,
            "smoothing_factor" => self.params.smoothing_factor = value,
            "roi_top_y" => self.params.roi_top_y = value,
            "roi_top_left_x" => self.params.roi_top_left_x = value,
            "roi_top_right_x" => self.params.roi_top_right_x = value,
            "roi_bottom_left_x" => self.params.roi_bottom_left_x = value,
            "roi_bottom_right_x" => self.params.roi_bottom_right_x = value,
            _ => return false,
        }
        true
    }

    /// Reset the EMA smoothing state, discarding any carried-over lane
    /// estimate. Invoked on vehicle respawn (`SPEC_FULL.md` §4.D).
    pub fn reset_smoothing(&mut self) {
        self.left_smoother = SideSmoother::default();
        self.right_smoother = SideSmoother::default();
    }

    pub fn name(&self) -> &'static str {
        "classical"
    }

    /// Run the full pipeline on one RGB frame.
    pub fn detect(&mut self, image: &RgbImage, frame_id: u64, timestamp: f64) -> DetectionResult {
        let start = std::time::Instant::now();
        let (width, height) = image.dimensions();

        let gray = pipeline::to_grayscale(image);
        let blurred = pipeline::blur(&gray);
        let mut edges = pipeline::canny_edges(&blurred, self.params.canny_low, self.params.canny_high);

        let roi = Roi {
            top_y_frac: self.params.roi_top_y,
            top_left_x_frac: self.params.roi_top_left_x,
            top_right_x_frac: self.params.roi_top_right_x,
            bottom_left_x_frac: self.params.roi_bottom_left_x,
            bottom_right_x_frac: self.params.roi_bottom_right_x,
        };
        pipeline::roi::apply_mask(&mut edges, &roi);

        let hough_params = HoughParams {
            threshold: self.params.hough_threshold,
            min_line_len: self.params.hough_min_line_len,
            max_line_gap: self.params.hough_max_line_gap,
        };
        let segments = pipeline::hough::detect_segments(&edges, &hough_params);
        let (left_candidates, right_candidates) = classify::classify_all(&segments, width, self.params.min_slope);

        let bottom_y = roi.bottom_y(height);
        let top_y = roi.top_y(height);
        let left_fit = fit::fit_side(&left_candidates, bottom_y, top_y);
        let right_fit = fit::fit_side(&right_candidates, bottom_y, top_y);

        let alpha = self.params.smoothing_factor;
        let left_smoothed = self
            .left_smoother
            .update(left_fit, alpha, self.smoothing_reset_frames);
        let right_smoothed = self
            .right_smoother
            .update(right_fit, alpha, self.smoothing_reset_frames);

        let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        DetectionResult {
            frame_id,
            timestamp,
            processing_time_ms,
            left_lane: left_smoothed.map(fitted_to_lane),
            right_lane: right_smoothed.map(fitted_to_lane),
        }
    }
}

fn fitted_to_lane(fitted: fit::FittedLine) -> Lane {
    Lane::new(fitted.x1, fitted.y1, fitted.x2, fitted.y2, fitted.confidence)
}
