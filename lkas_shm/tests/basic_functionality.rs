//! Integration tests exercising the image and detection rings end to end,
//! including multi-reader and crash-recovery scenarios a unit test inside
//! the crate can't easily set up.

use lkas_shm::detection::{DetectionRingReader, DetectionRingWriter, LaneRecord};
use lkas_shm::image::{slot_capacity, ImageRingReader, ImageRingWriter};
use lkas_shm::ShmResult;
use tempfile::TempDir;

fn ring_path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().to_string()
}

#[test]
fn image_ring_survives_several_writes() -> ShmResult<()> {
    let dir = TempDir::new().unwrap();
    let path = ring_path(&dir, "image_multi");
    let capacity = slot_capacity(8, 8, 3);
    let mut writer = ImageRingWriter::create("image_multi", &path, capacity, std::process::id())?;
    let mut reader = ImageRingReader::attach("image_multi", &path, capacity)?;

    for value in 0..10u8 {
        let pixels = vec![value; 8 * 8 * 3];
        writer.write(value as f64, 8, 8, 3, &pixels)?;
        let frame = reader
            .read(std::time::Duration::from_millis(100))?
            .expect("frame should be available");
        assert_eq!(frame.pixels[0], value);
    }
    Ok(())
}

#[test]
fn image_ring_supports_concurrent_readers() -> ShmResult<()> {
    let dir = TempDir::new().unwrap();
    let path = ring_path(&dir, "image_concurrent");
    let capacity = slot_capacity(2, 2, 3);
    let mut writer = ImageRingWriter::create("image_concurrent", &path, capacity, std::process::id())?;
    writer.write(0.0, 2, 2, 3, &[9u8; 2 * 2 * 3])?;

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let path = path.clone();
            let capacity = capacity;
            std::thread::spawn(move || -> ShmResult<()> {
                let mut reader = ImageRingReader::attach("image_concurrent", &path, capacity)?;
                let frame = reader
                    .read(std::time::Duration::from_millis(100))?
                    .expect("frame should be available");
                assert_eq!(frame.pixels[0], 9);
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap()?;
    }
    Ok(())
}

#[test]
fn attaching_to_a_missing_image_ring_fails() {
    let result = ImageRingReader::attach("missing_ring", "/tmp/lkas_definitely_missing", 64);
    assert!(result.is_err());
}

#[test]
fn detection_ring_carries_partial_lane_sets() -> ShmResult<()> {
    let dir = TempDir::new().unwrap();
    let path = ring_path(&dir, "detection_partial");
    let mut writer = DetectionRingWriter::create("detection_partial", &path, std::process::id())?;
    let mut reader = DetectionRingReader::attach("detection_partial", &path)?;

    let left = LaneRecord {
        x1: 100,
        y1: 0,
        x2: 120,
        y2: 480,
        confidence: 0.8,
    };
    writer.write(1, 10.0, 3.5, Some(left), None)?;

    let frame = reader
        .read(std::time::Duration::from_millis(100))?
        .expect("frame should be available");
    assert!(frame.left.is_some());
    assert!(frame.right.is_none());
    assert_eq!(frame.processing_time_ms, 3.5);
    Ok(())
}

#[test]
fn detection_ring_reader_skips_stale_frames() -> ShmResult<()> {
    let dir = TempDir::new().unwrap();
    let path = ring_path(&dir, "detection_stale");
    let mut writer = DetectionRingWriter::create("detection_stale", &path, std::process::id())?;
    let mut reader = DetectionRingReader::attach("detection_stale", &path)?;

    writer.write(1, 0.0, 1.0, None, None)?;
    assert!(reader.read(std::time::Duration::from_millis(50))?.is_some());

    // No new write: a second read should time out rather than replay frame 1.
    assert!(reader.read(std::time::Duration::from_millis(20))?.is_none());
    Ok(())
}
