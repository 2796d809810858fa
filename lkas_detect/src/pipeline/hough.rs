//! Step 5: probabilistic Hough transform. Votes edge pixels into a
//! `(rho, theta)` accumulator, then for each bin above `threshold` walks the
//! edge image along that line to extract contiguous segments, merging runs
//! separated by at most `max_line_gap` pixels and keeping only runs at
//! least `min_line_len` pixels long.

use image::GrayImage;

pub const RHO_RESOLUTION: f64 = 1.0;
pub const THETA_RESOLUTION: f64 = std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Segment {
    pub fn length(&self) -> f64 {
        ((self.x2 - self.x1).powi(2) + (self.y2 - self.y1).powi(2)).sqrt()
    }

    /// `None` for a vertical segment.
    pub fn slope(&self) -> Option<f64> {
        if (self.x2 - self.x1).abs() < f64::EPSILON {
            None
        } else {
            Some((self.y2 - self.y1) / (self.x2 - self.x1))
        }
    }

    pub fn midpoint_x(&self) -> f64 {
        (self.x1 + self.x2) / 2.0
    }
}

pub struct HoughParams {
    pub threshold: i32,
    pub min_line_len: f64,
    pub max_line_gap: f64,
}

/// Detect line segments in an edge image.
pub fn detect_segments(edges: &GrayImage, params: &HoughParams) -> Vec<Segment> {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let diag = ((width * width + height * height) as f64).sqrt();
    let n_rho = (2.0 * diag / RHO_RESOLUTION).ceil() as usize + 1;
    let n_theta = (std::f64::consts::PI / THETA_RESOLUTION).ceil() as usize;

    let mut accumulator = vec![0u32; n_rho * n_theta];
    let edge_points: Vec<(u32, u32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect();

    for &(x, y) in &edge_points {
        for theta_idx in 0..n_theta {
            let theta = theta_idx as f64 * THETA_RESOLUTION;
            let rho = x as f64 * theta.cos() + y as f64 * theta.sin();
            let rho_idx = ((rho + diag) / RHO_RESOLUTION).round() as usize;
            if rho_idx < n_rho {
                accumulator[theta_idx * n_rho + rho_idx] += 1;
            }
        }
    }

    let mut segments = Vec::new();
    for theta_idx in 0..n_theta {
        for rho_idx in 0..n_rho {
            let votes = accumulator[theta_idx * n_rho + rho_idx];
            if (votes as i32) < params.threshold {
                continue;
            }
            let theta = theta_idx as f64 * THETA_RESOLUTION;
            let rho = rho_idx as f64 * RHO_RESOLUTION - diag;
            segments.extend(trace_line(&edge_points, theta, rho, params));
        }
    }
    segments
}

/// Walk the edge points lying within half a pixel of the line
/// `x*cos(theta) + y*sin(theta) = rho`, ordered along the line, merging
/// runs separated by at most `max_line_gap` and keeping those at least
/// `min_line_len` long.
fn trace_line(edge_points: &[(u32, u32)], theta: f64, rho: f64, params: &HoughParams) -> Vec<Segment> {
    let cos_t = theta.cos();
    let sin_t = theta.sin();

    let mut on_line: Vec<(f64, f64, f64)> = edge_points
        .iter()
        .filter_map(|&(x, y)| {
            let (xf, yf) = (x as f64, y as f64);
            let dist = (xf * cos_t + yf * sin_t - rho).abs();
            if dist <= 0.5 {
                // Project onto the line's direction to get a 1D ordering.
                let along = -xf * sin_t + yf * cos_t;
                Some((along, xf, yf))
            } else {
                None
            }
        })
        .collect();
    on_line.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut segments = Vec::new();
    let mut run_start: Option<(f64, f64)> = None;
    let mut run_end: Option<(f64, f64)> = None;
    let mut last_along = f64::NEG_INFINITY;

    for (along, x, y) in on_line {
        match run_start {
            None => {
                run_start = Some((x, y));
                run_end = Some((x, y));
            }
            Some(_) => {
                if along - last_along > params.max_line_gap {
                    if let (Some(start), Some(end)) = (run_start, run_end) {
                        push_if_long_enough(&mut segments, start, end, params.min_line_len);
                    }
                    run_start = Some((x, y));
                }
                run_end = Some((x, y));
            }
        }
        last_along = along;
    }
    if let (Some(start), Some(end)) = (run_start, run_end) {
        push_if_long_enough(&mut segments, start, end, params.min_line_len);
    }
    segments
}

fn push_if_long_enough(segments: &mut Vec<Segment>, start: (f64, f64), end: (f64, f64), min_len: f64) {
    let segment = Segment {
        x1: start.0,
        y1: start.1,
        x2: end.0,
        y2: end.1,
    };
    if segment.length() >= min_len {
        segments.push(segment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn line_image(width: u32, height: u32, points: &[(u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([0]));
        for &(x, y) in points {
            img.put_pixel(x, y, Luma([255]));
        }
        img
    }

    #[test]
    fn detects_a_clean_diagonal_line() {
        let points: Vec<(u32, u32)> = (10..40).map(|i| (i, i)).collect();
        let img = line_image(50, 50, &points);
        let params = HoughParams {
            threshold: 15,
            min_line_len: 10.0,
            max_line_gap: 2.0,
        };
        let segments = detect_segments(&img, &params);
        assert!(!segments.is_empty());
        assert!(segments.iter().any(|s| s.length() > 15.0));
    }

    #[test]
    fn empty_edge_image_yields_no_segments() {
        let img = GrayImage::from_pixel(20, 20, Luma([0]));
        let params = HoughParams {
            threshold: 5,
            min_line_len: 5.0,
            max_line_gap: 1.0,
        };
        assert!(detect_segments(&img, &params).is_empty());
    }

    #[test]
    fn short_fragments_below_min_length_are_dropped() {
        let points = vec![(5, 5), (6, 6)];
        let img = line_image(20, 20, &points);
        let params = HoughParams {
            threshold: 1,
            min_line_len: 50.0,
            max_line_gap: 2.0,
        };
        assert!(detect_segments(&img, &params).is_empty());
    }
}
