//! `Detector` sum type and factory, grounded on `evo_hal::driver_registry`'s
//! constructor-injection pattern: no global dictionary of closures, one
//! small match on a config tag.

use image::RgbImage;
use lkas_common::config::DetectorConfig;
use lkas_common::model::DetectionResult;

use crate::classical::ClassicalDetector;
use crate::error::{DetectError, DetectResult};

/// Shared capability every detector variant implements.
pub trait LaneDetector {
    fn detect(&mut self, image: &RgbImage, frame_id: u64, timestamp: f64) -> DetectionResult;
    fn apply_parameter(&mut self, name: &str, value: f64) -> bool;
    fn reset(&mut self);
    fn name(&self) -> &'static str;
}

/// Placeholder seam for a future learned detector. Not implemented by this
/// spec (§4.B names `DeepLearning` only to fix the trait shape); any
/// concrete implementation plugs in here without touching the worker loop.
pub trait DlDetector: Send {
    fn detect(&mut self, image: &RgbImage, frame_id: u64, timestamp: f64) -> DetectionResult;
    fn apply_parameter(&mut self, name: &str, value: f64) -> bool;
    fn reset(&mut self);
    fn name(&self) -> &'static str;
}

/// The detector in use, selected once at startup by `DetectorFactory`.
pub enum Detector {
    Classical(ClassicalDetector),
    DeepLearning(Box<dyn DlDetector>),
}

impl LaneDetector for Detector {
    fn detect(&mut self, image: &RgbImage, frame_id: u64, timestamp: f64) -> DetectionResult {
        match self {
            Detector::Classical(d) => d.detect(image, frame_id, timestamp),
            Detector::DeepLearning(d) => d.detect(image, frame_id, timestamp),
        }
    }

    fn apply_parameter(&mut self, name: &str, value: f64) -> bool {
        match self {
            Detector::Classical(d) => d.apply_parameter(name, value),
            Detector::DeepLearning(d) => d.apply_parameter(name, value),
        }
    }

    fn reset(&mut self) {
        match self {
            Detector::Classical(d) => d.reset_smoothing(),
            Detector::DeepLearning(d) => d.reset(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Detector::Classical(d) => d.name(),
            Detector::DeepLearning(d) => d.name(),
        }
    }
}

/// Construct a [`Detector`] from config. `"classical"` is the only tag
/// implemented; any other value is a configuration error.
pub fn create_detector(config: &DetectorConfig, tag: &str) -> DetectResult<Detector> {
    match tag {
        "classical" => Ok(Detector::Classical(ClassicalDetector::new(
            config.cv.clone(),
            lkas_common::consts::SMOOTHING_RESET_FRAMES_DEFAULT,
        ))),
        other => Err(DetectError::UnknownDetector(other.to_string())),
    }
}
