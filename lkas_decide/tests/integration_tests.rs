//! End-to-end `analyze()` → `decide()` scenarios against the default config.

use lkas_common::config::{AnalyzerConfig, CameraConfig, ControllerConfig, DetectorCvConfig, ThrottlePolicyConfig};
use lkas_common::model::{ControlMode, DetectionResult, Lane, LaneStatus};
use lkas_decide::{analyze, decide, ImageGeometry};

fn geometry() -> ImageGeometry {
    ImageGeometry::new(&CameraConfig::default(), &DetectorCvConfig::default())
}

#[test]
fn perfectly_centered_vehicle_gets_zero_steer_and_lane_keeping_mode() {
    let width = CameraConfig::default().width as f64;
    let detection = DetectionResult {
        frame_id: 10,
        timestamp: 0.5,
        processing_time_ms: 3.0,
        left_lane: Some(Lane::new(width * 0.25, 600.0, width * 0.3, 360.0, 0.9)),
        right_lane: Some(Lane::new(width * 0.75, 600.0, width * 0.7, 360.0, 0.9)),
    };

    let metrics = analyze(&detection, &geometry(), &AnalyzerConfig::default()).unwrap();
    assert_eq!(metrics.status, LaneStatus::Centered);

    let cmd = decide(
        &metrics,
        &ControllerConfig::default(),
        &ThrottlePolicyConfig::default(),
    );
    assert_eq!(cmd.mode, ControlMode::LaneKeeping);
    assert_eq!(cmd.steering, 0.0);
    assert_eq!(cmd.brake, 0.0);
}

#[test]
fn drifting_vehicle_steers_toward_center_and_tapers_throttle() {
    let width = CameraConfig::default().width as f64;
    let detection = DetectionResult {
        frame_id: 11,
        timestamp: 0.55,
        processing_time_ms: 3.0,
        left_lane: Some(Lane::new(width * 0.55, 600.0, width * 0.58, 360.0, 0.85)),
        right_lane: Some(Lane::new(width * 0.95, 600.0, width * 0.9, 360.0, 0.85)),
    };

    let metrics = analyze(&detection, &geometry(), &AnalyzerConfig::default()).unwrap();
    assert_ne!(metrics.status, LaneStatus::Centered);

    let policy = ThrottlePolicyConfig::default();
    let cmd = decide(&metrics, &ControllerConfig::default(), &policy);
    assert_ne!(cmd.steering, 0.0);
    // A meaningfully off-center frame should never command more than base
    // throttle, and must never command both throttle and brake.
    assert!(cmd.throttle <= policy.base);
    assert!(cmd.throttle == 0.0 || cmd.brake == 0.0);
}

#[test]
fn no_lanes_detected_forces_failsafe_creep() {
    let detection = DetectionResult::empty(12, 0.6, 1.0);
    let metrics = analyze(&detection, &geometry(), &AnalyzerConfig::default()).unwrap();
    assert_eq!(metrics.status, LaneStatus::NoLanes);

    let policy = ThrottlePolicyConfig::default();
    let cmd = decide(&metrics, &ControllerConfig::default(), &policy);
    assert_eq!(cmd.mode, ControlMode::Failsafe);
    assert_eq!(cmd.steering, 0.0);
    assert_eq!(cmd.brake, 0.0);
    assert_eq!(cmd.throttle, policy.base);
}

#[test]
fn single_lane_detection_still_produces_a_usable_command() {
    let width = CameraConfig::default().width as f64;
    let detection = DetectionResult {
        frame_id: 13,
        timestamp: 0.65,
        processing_time_ms: 3.0,
        left_lane: Some(Lane::new(width * 0.2, 600.0, width * 0.3, 360.0, 0.7)),
        right_lane: None,
    };

    let metrics = analyze(&detection, &geometry(), &AnalyzerConfig::default()).unwrap();
    assert_ne!(metrics.status, LaneStatus::NoLanes);

    let cmd = decide(
        &metrics,
        &ControllerConfig::default(),
        &ThrottlePolicyConfig::default(),
    );
    assert_eq!(cmd.mode, ControlMode::LaneKeeping);
}
