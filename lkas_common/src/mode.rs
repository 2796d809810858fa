//! Supervisory mode transitions for the orchestrator.
//!
//! Global lifecycle: `Warmup → LaneKeeping ↔ Failsafe`, with `Paused`
//! reachable from and returning to whichever mode was active when the pause
//! was requested.

/// Supervisory mode of the orchestrator's tick loop.
///
/// Exactly one of these holds at any instant (invariant 4, `SPEC_FULL.md`
/// §8). `HardStop` is a named extension point for a future brake-based
/// failsafe (`SPEC_FULL.md` §9 Open Question 3) — not constructed today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Warmup,
    LaneKeeping,
    Failsafe,
    Paused(Resumable),
}

/// The mode `Paused` should return to on `resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumable {
    Warmup,
    LaneKeeping,
    Failsafe,
}

impl From<Resumable> for Mode {
    fn from(r: Resumable) -> Self {
        match r {
            Resumable::Warmup => Mode::Warmup,
            Resumable::LaneKeeping => Mode::LaneKeeping,
            Resumable::Failsafe => Mode::Failsafe,
        }
    }
}

/// Event driving a mode transition. Distinct from `DetectionResult`: the
/// caller reduces per-tick outcomes to one of these before calling
/// `ModeMachine::handle_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// `frame_id` has reached `warmup_frames`.
    WarmupComplete,
    /// A valid (non-stale) detection was applied this tick.
    DetectionValid,
    /// `K` consecutive ticks have now passed without a usable detection.
    ConsecutiveMissesExceeded,
    /// External `pause` action.
    Pause,
    /// External `resume` action.
    Resume,
}

/// Result of a transition attempt, mirroring the teacher's `TransitionResult`
/// shape so invalid events are explicit rather than silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Ok(Mode),
    /// The event does not apply in the current mode; mode is unchanged.
    NoOp(Mode),
}

/// Owns the current [`Mode`] and applies [`ModeEvent`]s to it.
#[derive(Debug, Clone, Copy)]
pub struct ModeMachine {
    mode: Mode,
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeMachine {
    pub const fn new() -> Self {
        Self { mode: Mode::Warmup }
    }

    #[inline]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    pub fn handle_event(&mut self, event: ModeEvent) -> TransitionResult {
        use Mode::*;
        use ModeEvent::*;

        let next = match (self.mode, event) {
            (Warmup, WarmupComplete) => LaneKeeping,

            (LaneKeeping, ConsecutiveMissesExceeded) => Failsafe,
            (Failsafe, DetectionValid) => LaneKeeping,

            // Pause suspends whichever mode is active; resume restores it.
            (Warmup, Pause) => Paused(Resumable::Warmup),
            (LaneKeeping, Pause) => Paused(Resumable::LaneKeeping),
            (Failsafe, Pause) => Paused(Resumable::Failsafe),
            (Paused(resumable), Resume) => resumable.into(),

            _ => return TransitionResult::NoOp(self.mode),
        };

        self.mode = next;
        TransitionResult::Ok(next)
    }

    /// True while ticks should skip `simulator.tick()`/`simulator.apply()`.
    #[inline]
    pub const fn is_paused(&self) -> bool {
        matches!(self.mode, Mode::Paused(_))
    }
}
