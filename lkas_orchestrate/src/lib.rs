//! The orchestrator: owns the image ring, drives the vehicle (real or
//! synthetic), applies decisions read back from the detection ring, and
//! fans telemetry out to subscribers.

pub mod broadcast;
pub mod error;
pub mod inbound;
pub mod tick;
pub mod vehicle;

pub use broadcast::{run_broadcast_listener, BroadcastMessage, Broadcaster};
pub use error::{OrchestrateError, OrchestrateResult};
pub use inbound::{inbound_channel, parse_inbound_line, Action, InboundMessage, ParameterUpdate};
pub use tick::{gate_warmup, DetectionTracker, Orchestrator};
pub use vehicle::{create_vehicle_actor, RawFrame, VehicleActor};
