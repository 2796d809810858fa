//! The fixed-rate tick loop (`SPEC_FULL.md` §4.D, 20 Hz / `Δt = 50 ms`).
//!
//! Split deliberately into pure, synchronously-testable pieces
//! (`DetectionTracker::resolve`, `gate_warmup`) and the `Orchestrator`
//! struct that wires them to the SHM rings and the vehicle actor. Keeping
//! the decision logic pure mirrors how `lkas_decide` itself is tested —
//! feed it fixed inputs, assert the output — without needing a live ring
//! or simulator in every test.

use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use lkas_common::config::Config;
use lkas_common::mode::{Mode, ModeEvent, ModeMachine, TransitionResult};
use lkas_common::model::{ControlCommand, ControlMode, DetectionResult};
use lkas_decide::{analyze, decide, ImageGeometry};
use lkas_shm::detection::{DetectionFrame, DetectionRingReader, LaneRecord};
use lkas_shm::image::ImageRingWriter;
use tracing::{info, warn};

use crate::broadcast::{BroadcastMessage, Broadcaster};
use crate::error::{OrchestrateError, OrchestrateResult};
use crate::inbound::{drain_inbound, Action, InboundMessage};
use crate::vehicle::{RawFrame, VehicleActor};

/// Bound on how long the orchestrator waits to connect to the detector's
/// own parameter channel before giving up on one forwarded message.
/// Forwarding is fire-and-forget, like the broadcaster: a detector that
/// is slow or down for one tick must never stall the control loop.
const DETECTOR_FORWARD_TIMEOUT: Duration = Duration::from_millis(200);

/// Forward one JSON line to the detector worker's parameter/reset channel
/// (`SPEC_FULL.md` §4.D, §4.E). Never fatal: a connect or write failure is
/// logged and dropped, same as a lagged broadcast subscriber.
fn forward_to_detector(addr: &str, payload: &serde_json::Value) {
    let socket_addr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(addr, error = %e, "detector action_url is not a valid socket address");
            return;
        }
    };
    match TcpStream::connect_timeout(&socket_addr, DETECTOR_FORWARD_TIMEOUT) {
        Ok(mut stream) => {
            let mut line = payload.to_string();
            line.push('\n');
            if let Err(e) = stream.write_all(line.as_bytes()) {
                warn!(error = %e, "failed to forward message to detector");
            }
        }
        Err(e) => {
            warn!(addr, error = %e, "failed to connect to detector parameter channel");
        }
    }
}

/// Encode one raw RGB8 frame to JPEG for the `frame` broadcast topic.
/// Encoding failures are logged and treated as "no frame this tick" rather
/// than fatal — telemetry is best-effort, unlike the SHM image ring.
fn encode_frame_jpeg(frame: &RawFrame, quality: u8) -> Option<Vec<u8>> {
    let buffer = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())?;
    let image = DynamicImage::ImageRgb8(buffer);
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    match image.write_with_encoder(encoder) {
        Ok(()) => Some(buf),
        Err(e) => {
            warn!(error = %e, "failed to JPEG-encode telemetry frame");
            None
        }
    }
}

/// Bound on inbound messages drained per tick, so a burst of client traffic
/// cannot stall the loop (`SPEC_FULL.md` §5 suspension points: inbound
/// polling is explicitly non-blocking).
const MAX_INBOUND_PER_TICK: usize = 32;

fn lane_record_to_lane(record: LaneRecord) -> lkas_common::model::Lane {
    lkas_common::model::Lane::new(
        record.x1 as f64,
        record.y1 as f64,
        record.x2 as f64,
        record.y2 as f64,
        record.confidence,
    )
}

fn detection_frame_to_result(frame: DetectionFrame) -> DetectionResult {
    DetectionResult {
        frame_id: frame.frame_id,
        timestamp: frame.timestamp,
        processing_time_ms: frame.processing_time_ms,
        left_lane: frame.left.map(lane_record_to_lane),
        right_lane: frame.right.map(lane_record_to_lane),
    }
}

/// Tracks the last detection seen and how many consecutive ticks have
/// gone by without a usable (non-empty) one, for the `K`-consecutive
/// failsafe rule (`SPEC_FULL.md` §4.D).
#[derive(Debug, Default)]
pub struct DetectionTracker {
    last: Option<(u64, DetectionResult)>,
    consecutive_misses: u32,
}

impl DetectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Resolve this tick's detection. Returns `(detection, is_miss)`:
    /// `detection` is `None` only when nothing was read and nothing
    /// recoverable is cached; `is_miss` tracks the `K`-consecutive counter
    /// (a timeout and a fresh `NO_LANES` reading both count as a miss, a
    /// reading with at least one lane present resets the counter).
    pub fn resolve(
        &mut self,
        read: Option<DetectionResult>,
        image_frame_id: u64,
        max_staleness_frames: u64,
    ) -> (Option<DetectionResult>, bool) {
        match read {
            Some(result) => {
                let is_miss = result.has_none();
                self.consecutive_misses = if is_miss { self.consecutive_misses + 1 } else { 0 };
                self.last = Some((image_frame_id, result.clone()));
                (Some(result), is_miss)
            }
            None => {
                self.consecutive_misses += 1;
                let reused = match &self.last {
                    Some((at, result))
                        if image_frame_id.saturating_sub(*at) <= max_staleness_frames =>
                    {
                        Some(result.clone())
                    }
                    _ => None,
                };
                (reused, true)
            }
        }
    }
}

/// Warm-up envelope (invariant 5, `SPEC_FULL.md` §8): for `frame_id <
/// warmup_frames`, steering is forced to `0` and throttle to `base`
/// regardless of what the controller computed.
pub fn gate_warmup(cmd: ControlCommand, frame_id: u64, warmup_frames: u64, base_throttle: f32) -> ControlCommand {
    if frame_id < warmup_frames {
        ControlCommand::creep(base_throttle, ControlMode::Warmup)
    } else {
        cmd
    }
}

/// Cumulative counters backing the `SPEC_FULL.md` §7 status line.
#[derive(Debug)]
struct OrchestratorStats {
    frames_processed: u64,
    timeouts: u64,
    failsafe_entries: u64,
    reattaches: u64,
    last_status_at: Instant,
}

impl OrchestratorStats {
    fn new(initial_reattaches: u32) -> Self {
        Self {
            frames_processed: 0,
            timeouts: 0,
            failsafe_entries: 0,
            reattaches: initial_reattaches as u64,
            last_status_at: Instant::now(),
        }
    }
}

/// Owns the tick loop's I/O: the image ring it writes, the detection ring
/// it reads, the vehicle actor, and the broadcaster it publishes to. One
/// instance per orchestrator process.
pub struct Orchestrator {
    config: Config,
    mode: ModeMachine,
    vehicle: Box<dyn VehicleActor>,
    image_writer: ImageRingWriter,
    detection_reader: DetectionRingReader,
    geometry: ImageGeometry,
    tracker: DetectionTracker,
    broadcaster: Broadcaster,
    inbound_rx: Receiver<InboundMessage>,
    running: Arc<AtomicBool>,
    next_frame_id: u64,
    stats: OrchestratorStats,
}

impl Orchestrator {
    /// `detection_reattach_count` seeds the `reattaches` counter with the
    /// number of attach retries the caller already spent connecting to the
    /// detection ring at startup (`SPEC_FULL.md` §7).
    pub fn new(
        config: Config,
        vehicle: Box<dyn VehicleActor>,
        image_writer: ImageRingWriter,
        detection_reader: DetectionRingReader,
        broadcaster: Broadcaster,
        inbound_rx: Receiver<InboundMessage>,
        detection_reattach_count: u32,
    ) -> Self {
        let geometry = ImageGeometry::new(&config.camera, &config.detector.cv);
        Self {
            config,
            mode: ModeMachine::new(),
            vehicle,
            image_writer,
            detection_reader,
            geometry,
            tracker: DetectionTracker::new(),
            broadcaster,
            inbound_rx,
            running: Arc::new(AtomicBool::new(true)),
            next_frame_id: 0,
            stats: OrchestratorStats::new(detection_reattach_count),
        }
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }

    /// Run the fixed-rate loop until `running_flag()` is cleared (by a
    /// signal handler) or a fatal error occurs.
    pub fn run(&mut self) -> OrchestrateResult<()> {
        let tick_period = self.config.loop_.tick_period();
        while self.running.load(Ordering::SeqCst) {
            let tick_start = Instant::now();
            self.tick(tick_period)?;
            let elapsed = tick_start.elapsed();
            if let Some(remaining) = tick_period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }

    fn process_inbound(&mut self) {
        for message in drain_inbound(&self.inbound_rx, MAX_INBOUND_PER_TICK) {
            match message {
                InboundMessage::Action(Action::Respawn) => {
                    info!("respawn requested");
                    self.vehicle.respawn();
                    self.next_frame_id = 0;
                    self.mode = ModeMachine::new();
                    self.reset_detector_smoothing();
                }
                InboundMessage::Action(Action::Pause) => {
                    info!("pause requested");
                    let transition = self.mode.handle_event(ModeEvent::Pause);
                    self.log_transition(transition);
                }
                InboundMessage::Action(Action::Resume) => {
                    info!("resume requested");
                    let transition = self.mode.handle_event(ModeEvent::Resume);
                    self.log_transition(transition);
                }
                InboundMessage::Parameter(update) if update.category == "decision" => {
                    self.apply_decision_parameter(&update.name, update.value);
                }
                InboundMessage::Parameter(update) if update.category == "detection" => {
                    // The detector is a separate process; forward the
                    // update to its own parameter channel rather than
                    // applying it here.
                    forward_to_detector(
                        &self.config.detector.action_url,
                        &serde_json::json!({
                            "category": "detection",
                            "name": update.name,
                            "value": update.value,
                        }),
                    );
                }
                InboundMessage::Parameter(update) => {
                    tracing::debug!(category = %update.category, "ignoring unknown parameter category");
                }
            }
        }
    }

    /// Tell the detector worker to reset its EMA smoothing state after a
    /// respawn teleport (`SPEC_FULL.md` §4.D) — otherwise the smoother
    /// keeps lane estimates from the old spawn point.
    fn reset_detector_smoothing(&self) {
        forward_to_detector(
            &self.config.detector.action_url,
            &serde_json::json!({ "action": "reset" }),
        );
    }

    fn apply_decision_parameter(&mut self, name: &str, value: f64) {
        let applied = match name {
            "kp" => {
                self.config.controller.kp = value;
                true
            }
            "kd" => {
                self.config.controller.kd = value;
                true
            }
            "base" => {
                self.config.throttle_policy.base = value as f32;
                true
            }
            "min" => {
                self.config.throttle_policy.min = value as f32;
                true
            }
            "steer_threshold" => {
                self.config.throttle_policy.steer_threshold = value as f32;
                true
            }
            "steer_max" => {
                self.config.throttle_policy.steer_max = value as f32;
                true
            }
            _ => false,
        };
        if !applied {
            warn!(name, "unknown decision parameter, ignoring");
        }
    }

    fn tick(&mut self, dt: Duration) -> OrchestrateResult<()> {
        self.process_inbound();

        if self.mode.is_paused() {
            std::thread::sleep(Duration::from_millis(10));
            return Ok(());
        }

        let tick_deadline = dt.mul_f64(lkas_common::consts::SIMULATOR_TICK_TIMEOUT_MULTIPLIER);
        let sim_started = Instant::now();
        self.vehicle.tick(dt)?;
        let sim_elapsed = sim_started.elapsed();
        if sim_elapsed > tick_deadline {
            return Err(OrchestrateError::SimulatorTickTimeout(sim_elapsed));
        }
        let Some(frame) = self.vehicle.latest_frame() else {
            return Ok(());
        };

        let timestamp = self.next_frame_id as f64 * dt.as_secs_f64();
        let image_frame_id = self.image_writer.write(
            timestamp,
            frame.width,
            frame.height,
            frame.channels,
            &frame.pixels,
        )?;

        if self.config.broadcast.send_frames {
            if let Some(jpeg) = encode_frame_jpeg(&frame, self.config.broadcast.jpeg_quality) {
                self.broadcaster.publish(BroadcastMessage::Frame {
                    frame_id: image_frame_id,
                    timestamp,
                    width: frame.width,
                    height: frame.height,
                    jpeg: Arc::from(jpeg.into_boxed_slice()),
                });
            }
        }

        let read_timeout = dt.mul_f64(lkas_common::consts::DETECTION_READ_TIMEOUT_FRACTION);
        let raw_read = self.detection_reader.read(read_timeout)?;
        if raw_read.is_none() {
            self.stats.timeouts += 1;
        }
        let read = raw_read.map(detection_frame_to_result);

        let (detection, is_miss) = self.tracker.resolve(
            read,
            image_frame_id,
            lkas_common::consts::MAX_DETECTION_STALENESS_FRAMES,
        );

        if self.mode.mode() == Mode::Warmup && image_frame_id >= self.config.loop_.warmup_frames {
            let transition = self.mode.handle_event(ModeEvent::WarmupComplete);
            self.log_transition(transition);
        }
        if is_miss {
            if self.tracker.consecutive_misses() > self.config.loop_.failsafe_consecutive {
                let transition = self.mode.handle_event(ModeEvent::ConsecutiveMissesExceeded);
                self.log_transition(transition);
            }
        } else {
            let transition = self.mode.handle_event(ModeEvent::DetectionValid);
            self.log_transition(transition);
        }

        let cmd = match detection {
            Some(ref result) => {
                let metrics = analyze(result, &self.geometry, &self.config.analyzer)?;
                decide(&metrics, &self.config.controller, &self.config.throttle_policy)
            }
            None => ControlCommand::creep(self.config.throttle_policy.base, ControlMode::Failsafe),
        };
        let cmd = gate_warmup(cmd, image_frame_id, self.config.loop_.warmup_frames, self.config.throttle_policy.base);

        self.vehicle.apply(&cmd);

        let lanes = lane_presence_indicator(detection.as_ref());
        if let Some(result) = detection {
            self.broadcaster.publish(BroadcastMessage::Detection(result));
        }
        self.broadcaster.publish(BroadcastMessage::State {
            steering: cmd.steering,
            throttle: cmd.throttle,
            brake: cmd.brake,
            speed_mps: 0.0,
        });

        self.stats.frames_processed += 1;
        if self.stats.frames_processed % lkas_common::consts::STATUS_LOG_INTERVAL_FRAMES == 0 {
            self.log_status(lanes, &cmd);
        }

        self.next_frame_id = image_frame_id + 1;
        Ok(())
    }

    /// Periodic user-visible status line (`SPEC_FULL.md` §7): FPS over the
    /// interval since the last line, lane presence indicator, the last
    /// applied command, and cumulative timeout count.
    fn log_status(&mut self, lanes: &'static str, cmd: &ControlCommand) {
        let elapsed = self.stats.last_status_at.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 {
            lkas_common::consts::STATUS_LOG_INTERVAL_FRAMES as f64 / elapsed
        } else {
            0.0
        };
        info!(
            fps = format!("{fps:.1}"),
            lanes,
            steering = format!("{:.3}", cmd.steering),
            throttle = format!("{:.3}", cmd.throttle),
            timeouts = self.stats.timeouts,
            failsafe_entries = self.stats.failsafe_entries,
            reattaches = self.stats.reattaches,
            "orchestrator status"
        );
        self.stats.last_status_at = Instant::now();
    }

    /// Log a one-line mode transition (`SPEC_FULL.md` §7) and tally
    /// `failsafe_entries`. A `NoOp` result means the event did not apply in
    /// the current mode and is not logged.
    fn log_transition(&mut self, transition: TransitionResult) {
        if let TransitionResult::Ok(mode) = transition {
            info!(mode = ?mode, "mode transition");
            if mode == Mode::Failsafe {
                self.stats.failsafe_entries += 1;
            }
        }
    }
}

/// `LR`/`L-`/`-R`/`--` lane-presence indicator for the status line
/// (`SPEC_FULL.md` §7).
fn lane_presence_indicator(detection: Option<&DetectionResult>) -> &'static str {
    match detection {
        Some(d) => match (d.left_lane.is_some(), d.right_lane.is_some()) {
            (true, true) => "LR",
            (true, false) => "L-",
            (false, true) => "-R",
            (false, false) => "--",
        },
        None => "--",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lkas_common::model::Lane;

    fn detection(frame_id: u64, empty: bool) -> DetectionResult {
        if empty {
            DetectionResult::empty(frame_id, 0.0, 1.0)
        } else {
            DetectionResult {
                frame_id,
                timestamp: 0.0,
                processing_time_ms: 1.0,
                left_lane: Some(Lane::new(100.0, 480.0, 120.0, 288.0, 0.9)),
                right_lane: Some(Lane::new(400.0, 480.0, 380.0, 288.0, 0.9)),
            }
        }
    }

    #[test]
    fn gate_warmup_forces_creep_below_threshold() {
        let cmd = ControlCommand::new(0.8, 0.9, 0.0, ControlMode::LaneKeeping);
        let gated = gate_warmup(cmd, 3, 50, 0.4);
        assert_eq!(gated.steering, 0.0);
        assert_eq!(gated.throttle, 0.4);
        assert_eq!(gated.mode, ControlMode::Warmup);
    }

    #[test]
    fn gate_warmup_passes_through_once_past_threshold() {
        let cmd = ControlCommand::new(0.8, 0.9, 0.0, ControlMode::LaneKeeping);
        let gated = gate_warmup(cmd, 51, 50, 0.4);
        assert_eq!(gated.steering, 0.8);
    }

    #[test]
    fn tracker_resets_miss_counter_on_a_good_reading() {
        let mut tracker = DetectionTracker::new();
        tracker.resolve(Some(detection(0, true)), 0, 2);
        tracker.resolve(Some(detection(1, true)), 1, 2);
        assert_eq!(tracker.consecutive_misses(), 2);
        let (result, is_miss) = tracker.resolve(Some(detection(2, false)), 2, 2);
        assert!(!is_miss);
        assert!(result.is_some());
        assert_eq!(tracker.consecutive_misses(), 0);
    }

    #[test]
    fn tracker_reuses_recent_detection_within_staleness_bound() {
        let mut tracker = DetectionTracker::new();
        tracker.resolve(Some(detection(0, false)), 0, 2);
        let (reused, is_miss) = tracker.resolve(None, 1, 2);
        assert!(is_miss);
        assert!(reused.is_some());
        assert_eq!(reused.unwrap().frame_id, 0);
    }

    #[test]
    fn tracker_refuses_a_detection_older_than_the_staleness_bound() {
        let mut tracker = DetectionTracker::new();
        tracker.resolve(Some(detection(0, false)), 0, 2);
        let (reused, is_miss) = tracker.resolve(None, 10, 2);
        assert!(is_miss);
        assert!(reused.is_none());
    }

    #[test]
    fn empty_detection_counts_as_a_miss_even_though_it_was_read() {
        let mut tracker = DetectionTracker::new();
        let (result, is_miss) = tracker.resolve(Some(detection(0, true)), 0, 2);
        assert!(is_miss);
        assert!(result.is_some());
    }
}
