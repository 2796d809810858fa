//! Process-shared memory rings connecting the orchestrator, detector, and
//! viewer: a camera-frame ring flowing orchestrator -> detector, and a
//! detection-result ring flowing detector -> orchestrator.
//!
//! Unlike a lock-free seqlock, both rings serialize access through a
//! [`mutex::ProcessMutex`] embedded in shared memory — a process-shared,
//! robust POSIX mutex that recovers automatically if its holder crashes
//! mid-write. See `mutex` for why.

pub mod detection;
pub mod discovery;
pub mod error;
pub mod image;
pub mod lifecycle;
pub mod mutex;
pub mod platform;
pub mod region;

pub use detection::{DetectionFrame, DetectionRingReader, DetectionRingWriter, LaneRecord};
pub use error::{ShmError, ShmResult};
pub use image::{ImageFrame, ImageRingReader, ImageRingWriter};
