//! Decision controller: pure `analyze()` + `decide()` mapping a detection
//! frame to a `ControlCommand`. No state is carried across calls — see
//! `SPEC_FULL.md` §9 Open Question resolution 4.

pub mod analyze;
pub mod decide;
pub mod error;

pub use analyze::{analyze, ImageGeometry};
pub use decide::decide;
pub use error::{DecideError, DecideResult};
