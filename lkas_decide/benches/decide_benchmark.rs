//! Decision controller micro-benchmark: throughput of `analyze()` and
//! `decide()` over a representative detection frame.

use criterion::{criterion_group, criterion_main, Criterion};

use lkas_common::config::{AnalyzerConfig, CameraConfig, ControllerConfig, DetectorCvConfig, ThrottlePolicyConfig};
use lkas_common::model::{DetectionResult, Lane};
use lkas_decide::analyze::{analyze, ImageGeometry};
use lkas_decide::decide::decide;

fn reference_detection() -> DetectionResult {
    DetectionResult {
        frame_id: 1,
        timestamp: 0.0,
        processing_time_ms: 4.0,
        left_lane: Some(Lane::new(260.0, 480.0, 290.0, 288.0, 0.9)),
        right_lane: Some(Lane::new(580.0, 480.0, 550.0, 288.0, 0.9)),
    }
}

fn bench_analyze(c: &mut Criterion) {
    let detection = reference_detection();
    let geom = ImageGeometry::new(&CameraConfig::default(), &DetectorCvConfig::default());
    let analyzer = AnalyzerConfig::default();

    c.bench_function("analyze", |b| {
        b.iter(|| analyze(&detection, &geom, &analyzer).unwrap())
    });
}

fn bench_decide(c: &mut Criterion) {
    let detection = reference_detection();
    let geom = ImageGeometry::new(&CameraConfig::default(), &DetectorCvConfig::default());
    let analyzer = AnalyzerConfig::default();
    let controller = ControllerConfig::default();
    let throttle_policy = ThrottlePolicyConfig::default();
    let metrics = analyze(&detection, &geom, &analyzer).unwrap();

    c.bench_function("decide", |b| {
        b.iter(|| decide(&metrics, &controller, &throttle_policy))
    });
}

fn bench_analyze_then_decide(c: &mut Criterion) {
    let detection = reference_detection();
    let geom = ImageGeometry::new(&CameraConfig::default(), &DetectorCvConfig::default());
    let analyzer = AnalyzerConfig::default();
    let controller = ControllerConfig::default();
    let throttle_policy = ThrottlePolicyConfig::default();

    c.bench_function("analyze_then_decide", |b| {
        b.iter(|| {
            let metrics = analyze(&detection, &geom, &analyzer).unwrap();
            decide(&metrics, &controller, &throttle_policy)
        })
    });
}

criterion_group!(benches, bench_analyze, bench_decide, bench_analyze_then_decide);
criterion_main!(benches);
