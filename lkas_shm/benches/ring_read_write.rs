use criterion::{criterion_group, criterion_main, Criterion};
use lkas_shm::detection::{DetectionRingReader, DetectionRingWriter, LaneRecord};
use lkas_shm::image::{slot_capacity, ImageRingReader, ImageRingWriter};
use tempfile::TempDir;

fn bench_image_ring(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench_image_ring").to_string_lossy().to_string();
    let capacity = slot_capacity(640, 480, 3);
    let mut writer = ImageRingWriter::create("bench_image_ring", &path, capacity, 1).unwrap();
    let mut reader = ImageRingReader::attach("bench_image_ring", &path, capacity).unwrap();
    let frame = vec![128u8; 640 * 480 * 3];

    c.bench_function("image_ring_write", |b| {
        b.iter(|| {
            writer.write(0.0, 640, 480, 3, &frame).unwrap();
        })
    });

    c.bench_function("image_ring_read", |b| {
        b.iter(|| {
            writer.write(0.0, 640, 480, 3, &frame).unwrap();
            reader
                .read(std::time::Duration::from_millis(10))
                .unwrap();
        })
    });
}

fn bench_detection_ring(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir
        .path()
        .join("bench_detection_ring")
        .to_string_lossy()
        .to_string();
    let mut writer = DetectionRingWriter::create("bench_detection_ring", &path, 1).unwrap();
    let mut reader = DetectionRingReader::attach("bench_detection_ring", &path).unwrap();
    let lane = LaneRecord {
        x1: 10,
        y1: 0,
        x2: 20,
        y2: 480,
        confidence: 0.95,
    };

    c.bench_function("detection_ring_write_and_read", |b| {
        b.iter(|| {
            writer.write(0, 0.0, 1.2, Some(lane), Some(lane)).unwrap();
            reader
                .read(std::time::Duration::from_millis(10))
                .unwrap();
        })
    });
}

criterion_group!(benches, bench_image_ring, bench_detection_ring);
criterion_main!(benches);
