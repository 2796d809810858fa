//! The detector worker loop: attach to the image ring, run the detector on
//! each new frame, publish to the detection ring. Grounded on
//! `evo_hal::core::HalCore::run`'s shape (timing stats, periodic status
//! logging, graceful shutdown via a shared running flag) adapted from a
//! fixed-cycle RT loop to a blocking-read worker loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use lkas_common::consts::STATUS_LOG_INTERVAL_FRAMES;
use lkas_shm::detection::{DetectionRingWriter, LaneRecord};
use lkas_shm::image::ImageRingReader;

use crate::detector::{Detector, LaneDetector};
use crate::error::DetectResult;
use crate::inbound::{drain_inbound, DetectorInboundMessage, MAX_INBOUND_PER_FRAME};

const IMAGE_READ_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct WorkerStats {
    frames_processed: u64,
    frames_missed: u64,
    max_processing_time_ms: f64,
}

/// Owns the two rings and the detector; runs until told to stop.
pub struct DetectorWorker {
    detector: Detector,
    image_reader: ImageRingReader,
    detection_writer: DetectionRingWriter,
    inbound_rx: Receiver<DetectorInboundMessage>,
    running: Arc<AtomicBool>,
    stats: WorkerStats,
}

impl DetectorWorker {
    pub fn new(
        detector: Detector,
        image_reader: ImageRingReader,
        detection_writer: DetectionRingWriter,
        inbound_rx: Receiver<DetectorInboundMessage>,
    ) -> Self {
        Self {
            detector,
            image_reader,
            detection_writer,
            inbound_rx,
            running: Arc::new(AtomicBool::new(true)),
            stats: WorkerStats::default(),
        }
    }

    /// Shared flag a signal handler can clear to request a clean stop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Apply a live parameter update (`SPEC_FULL.md` §4.E). Unknown names
    /// are logged and ignored, never fatal.
    pub fn apply_parameter(&mut self, name: &str, value: f64) {
        if !self.detector.apply_parameter(name, value) {
            tracing::warn!(param = name, value, "ignoring unknown detector parameter");
        }
    }

    /// Reset EMA smoothing state (vehicle respawn).
    pub fn reset_detector(&mut self) {
        self.detector.reset();
    }

    /// Drain whatever parameter/reset messages have queued up on the
    /// inbound channel since the last frame and apply them. Called
    /// between frames, never mid-frame, so updates land atomically
    /// (`SPEC_FULL.md` §4.B).
    fn process_inbound(&mut self) {
        for message in drain_inbound(&self.inbound_rx, MAX_INBOUND_PER_FRAME) {
            match message {
                DetectorInboundMessage::Reset => {
                    tracing::info!("detector EMA reset requested");
                    self.reset_detector();
                }
                DetectorInboundMessage::Parameter { name, value } => {
                    self.apply_parameter(&name, value);
                }
            }
        }
    }

    /// Run until `running` is cleared. Never terminates on a single bad
    /// frame; only a read loop that can't get frames at all is a caller
    /// concern (the caller decides whether the absence of frames is fatal).
    pub fn run(&mut self) -> DetectResult<()> {
        tracing::info!(detector = self.detector.name(), "detector worker starting");

        while self.running.load(Ordering::SeqCst) {
            self.process_inbound();

            let frame = match self.image_reader.read(IMAGE_READ_TIMEOUT) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "image ring read failed, retrying");
                    continue;
                }
            };

            let started = Instant::now();
            let rgb_image = match to_rgb_image(&frame) {
                Some(image) => image,
                None => {
                    tracing::warn!(frame_id = frame.frame_id, "malformed frame, treating as miss");
                    self.stats.frames_missed += 1;
                    continue;
                }
            };

            let result = self.detector.detect(&rgb_image, frame.frame_id, frame.timestamp);
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.stats.max_processing_time_ms = self.stats.max_processing_time_ms.max(elapsed_ms);
            self.stats.frames_processed += 1;
            if result.has_none() {
                self.stats.frames_missed += 1;
            }

            let left = result.left_lane.map(lane_to_record);
            let right = result.right_lane.map(lane_to_record);
            if let Err(e) = self.detection_writer.write(
                result.frame_id,
                result.timestamp,
                result.processing_time_ms,
                left,
                right,
            ) {
                tracing::warn!(error = %e, "detection ring write failed");
            }

            if self.stats.frames_processed % STATUS_LOG_INTERVAL_FRAMES == 0 {
                tracing::debug!(
                    frames_processed = self.stats.frames_processed,
                    frames_missed = self.stats.frames_missed,
                    max_processing_time_ms = self.stats.max_processing_time_ms,
                    "detector worker status"
                );
            }
        }

        tracing::info!(
            frames_processed = self.stats.frames_processed,
            "detector worker stopped"
        );
        Ok(())
    }
}

fn to_rgb_image(frame: &lkas_shm::ImageFrame) -> Option<RgbImage> {
    if frame.channels != 3 {
        return None;
    }
    RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
}

fn lane_to_record(lane: lkas_common::model::Lane) -> LaneRecord {
    LaneRecord {
        x1: lane.x1 as i32,
        y1: lane.y1 as i32,
        x2: lane.x2 as i32,
        y2: lane.y2 as i32,
        confidence: lane.confidence,
    }
}
