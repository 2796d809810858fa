//! Classical lane-detection pipeline and worker loop: reads camera frames
//! from `lkas_shm::image`, runs the detector, publishes to
//! `lkas_shm::detection`.

pub mod classical;
pub mod detector;
pub mod error;
pub mod inbound;
pub mod pipeline;
pub mod worker;

pub use detector::{create_detector, Detector, LaneDetector};
pub use error::{DetectError, DetectResult};
pub use inbound::{spawn_inbound_listener, DetectorInboundMessage};
