//! The vehicle/simulator seam. The real simulator is out of scope for this
//! core (`SPEC_FULL.md` §1 Non-goals); `VehicleActor` is the trait the
//! orchestrator programs against, mirroring the teacher's `HalDriver` seam.
//! `DemoVehicleActor` is the in-process synthetic implementation used for
//! tests and local demos.

use std::time::Duration;

use lkas_common::model::ControlCommand;

use crate::error::{OrchestrateError, OrchestrateResult};

/// One undecoded RGB camera frame, produced by a `VehicleActor` and handed
/// to the orchestrator for publishing on the image ring. Carries no
/// `frame_id` — the ring writer assigns that on `write()`.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: Vec<u8>,
}

/// Seam between the orchestrator's tick loop and whatever drives the
/// vehicle: a real simulator client in production, `DemoVehicleActor` in
/// tests. Construction goes through [`create_vehicle_actor`], mirroring
/// `Detector`'s single-match factory.
pub trait VehicleActor: Send {
    /// Advance the simulator by one tick. Blocking, bounded by
    /// `2 * tick_period` before the orchestrator treats it as fatal.
    fn tick(&mut self, dt: Duration) -> OrchestrateResult<()>;

    /// The most recent camera frame, or `None` if the simulator has not
    /// produced one yet this tick (the orchestrator skips the tick).
    fn latest_frame(&self) -> Option<RawFrame>;

    /// Apply a computed control command to the vehicle.
    fn apply(&mut self, cmd: &ControlCommand);

    /// Teleport to a configured spawn point and reset vehicle-local state.
    fn respawn(&mut self);
}

/// How fast lateral offset responds to a unit of steering input, in
/// meters/second. Tuned only to make the synthetic frame visibly react to
/// applied commands — not a physical vehicle model.
const STEER_RESPONSE_MPS: f64 = 1.5;
const MAX_SPEED_MPS: f64 = 8.0;
const PIXELS_PER_METER: f64 = 60.0;
const LANE_HALF_WIDTH_PX: f64 = 120.0;

/// In-process synthetic lane generator: paints two converging lane lines
/// whose lateral position reacts to the last applied steering command, so
/// a full analyze → decide → apply loop is exercisable without an external
/// simulator process.
pub struct DemoVehicleActor {
    width: u32,
    height: u32,
    lateral_offset_px: f64,
    last_steering: f32,
    speed_mps: f64,
    spawn_points_m: Vec<f64>,
    spawn_index: usize,
}

impl DemoVehicleActor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            lateral_offset_px: 0.0,
            last_steering: 0.0,
            speed_mps: 0.0,
            spawn_points_m: vec![0.0, 1.0, -1.0],
            spawn_index: 0,
        }
    }

    fn render(&self) -> RawFrame {
        let mut pixels = vec![12u8; (self.width * self.height * 3) as usize];
        let top_y = (self.height as f64 * 0.55) as u32;
        let center_x = self.width as f64 / 2.0 + self.lateral_offset_px;

        for y in top_y..self.height {
            let t = (y - top_y) as f64 / (self.height - top_y).max(1) as f64;
            let half_width = LANE_HALF_WIDTH_PX * (1.0 - 0.4 * t);
            for x in [center_x - half_width, center_x + half_width] {
                for dx in -1i64..=1 {
                    let px = x as i64 + dx;
                    if px >= 0 && (px as u32) < self.width {
                        let idx = ((y * self.width + px as u32) * 3) as usize;
                        pixels[idx] = 230;
                        pixels[idx + 1] = 230;
                        pixels[idx + 2] = 230;
                    }
                }
            }
        }

        RawFrame {
            width: self.width,
            height: self.height,
            channels: 3,
            pixels,
        }
    }
}

impl VehicleActor for DemoVehicleActor {
    fn tick(&mut self, dt: Duration) -> OrchestrateResult<()> {
        let lateral_velocity_mps = self.last_steering as f64 * STEER_RESPONSE_MPS;
        self.lateral_offset_px += lateral_velocity_mps * PIXELS_PER_METER * dt.as_secs_f64();
        Ok(())
    }

    fn latest_frame(&self) -> Option<RawFrame> {
        Some(self.render())
    }

    fn apply(&mut self, cmd: &ControlCommand) {
        self.last_steering = cmd.steering;
        self.speed_mps = cmd.throttle as f64 * MAX_SPEED_MPS;
    }

    fn respawn(&mut self) {
        self.spawn_index = (self.spawn_index + 1) % self.spawn_points_m.len();
        self.lateral_offset_px = self.spawn_points_m[self.spawn_index] * PIXELS_PER_METER;
        self.last_steering = 0.0;
        self.speed_mps = 0.0;
    }
}

/// Construct a `VehicleActor` for the configured tag. `"demo"` is the only
/// variant implemented today; a production build would add a real
/// simulator-client tag here without changing the orchestrator's tick loop.
pub fn create_vehicle_actor(
    tag: &str,
    width: u32,
    height: u32,
) -> OrchestrateResult<Box<dyn VehicleActor>> {
    match tag {
        "demo" => Ok(Box::new(DemoVehicleActor::new(width, height))),
        other => Err(OrchestrateError::UnknownVehicleActor(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lkas_common::model::ControlMode;

    #[test]
    fn demo_actor_always_has_a_frame_ready() {
        let actor = DemoVehicleActor::new(320, 240);
        let frame = actor.latest_frame().unwrap();
        assert_eq!(frame.pixels.len(), 320 * 240 * 3);
    }

    #[test]
    fn positive_steering_shifts_the_lane_left_over_time() {
        let mut actor = DemoVehicleActor::new(320, 240);
        actor.apply(&ControlCommand::new(0.5, 0.5, 0.0, ControlMode::LaneKeeping));
        let before = actor.lateral_offset_px;
        actor.tick(Duration::from_millis(50)).unwrap();
        assert!(actor.lateral_offset_px > before);
    }

    #[test]
    fn respawn_resets_steering_and_speed() {
        let mut actor = DemoVehicleActor::new(320, 240);
        actor.apply(&ControlCommand::new(0.8, 0.9, 0.0, ControlMode::LaneKeeping));
        actor.respawn();
        assert_eq!(actor.last_steering, 0.0);
        assert_eq!(actor.speed_mps, 0.0);
    }

    #[test]
    fn respawn_cycles_through_spawn_points() {
        let mut actor = DemoVehicleActor::new(320, 240);
        let first = {
            actor.respawn();
            actor.lateral_offset_px
        };
        let second = {
            actor.respawn();
            actor.lateral_offset_px
        };
        assert_ne!(first, second);
    }

    #[test]
    fn unknown_vehicle_tag_is_rejected() {
        let result = create_vehicle_actor("physical", 320, 240);
        assert!(result.is_err());
    }

    #[test]
    fn demo_tag_constructs_successfully() {
        let result = create_vehicle_actor("demo", 320, 240);
        assert!(result.is_ok());
    }
}
