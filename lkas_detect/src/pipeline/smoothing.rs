//! Step 8: temporal smoothing. Exponential moving average over a side's
//! four fitted endpoints, reset once the side has been absent for more
//! than `reset_after_frames` consecutive frames.

use super::fit::FittedLine;

#[derive(Debug, Clone, Copy)]
struct SmoothedEndpoints {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

/// Per-side EMA state, carried across frames by the detector.
#[derive(Debug, Clone, Default)]
pub struct SideSmoother {
    prior: Option<SmoothedEndpoints>,
    absent_streak: u32,
}

impl SideSmoother {
    /// Blend `current` into the running EMA, or reset if the side has been
    /// absent too long. `alpha` is the weight on the prior estimate.
    pub fn update(&mut self, current: Option<FittedLine>, alpha: f64, reset_after_frames: u32) -> Option<FittedLine> {
        match current {
            None => {
                self.absent_streak += 1;
                if self.absent_streak > reset_after_frames {
                    self.prior = None;
                }
                None
            }
            Some(line) => {
                self.absent_streak = 0;
                let blended = match self.prior {
                    Some(prior) => SmoothedEndpoints {
                        x1: prior.x1 * alpha + line.x1 * (1.0 - alpha),
                        y1: prior.y1 * alpha + line.y1 * (1.0 - alpha),
                        x2: prior.x2 * alpha + line.x2 * (1.0 - alpha),
                        y2: prior.y2 * alpha + line.y2 * (1.0 - alpha),
                    },
                    None => SmoothedEndpoints {
                        x1: line.x1,
                        y1: line.y1,
                        x2: line.x2,
                        y2: line.y2,
                    },
                };
                self.prior = Some(blended);
                Some(FittedLine {
                    x1: blended.x1,
                    y1: blended.y1,
                    x2: blended.x2,
                    y2: blended.y2,
                    confidence: line.confidence,
                })
            }
        }
    }
}
