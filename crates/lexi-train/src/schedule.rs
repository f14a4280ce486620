//! Learning-rate scheduling: warmup followed by a constant or linearly
//! decaying rate.
//!
//! The schedule produces a dimensionless scale, so the two optimizers
//! can share one schedule while keeping independent base learning rates
//! for the attribute and object networks.

use serde::{Deserialize, Serialize};

/// Shape of the post-warmup learning-rate curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrScheduleKind {
    /// Hold the base rate after warmup.
    Constant,
    /// Decay linearly from the base rate to zero at the final step.
    Linear,
}

/// A warmup + decay schedule over a fixed number of steps.
///
/// # Example
///
/// ```
/// use lexi_train::schedule::{LrSchedule, LrScheduleKind};
///
/// let s = LrSchedule::new(LrScheduleKind::Constant, 4, 100);
/// assert!(s.scale_at(0) < 1.0);
/// assert_eq!(s.scale_at(4), 1.0);
/// assert_eq!(s.scale_at(99), 1.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LrSchedule {
    kind: LrScheduleKind,
    warmup_steps: usize,
    total_steps: usize,
}

impl LrSchedule {
    /// Creates a schedule for `total_steps` optimizer steps.
    pub fn new(kind: LrScheduleKind, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            kind,
            warmup_steps,
            total_steps: total_steps.max(1),
        }
    }

    /// Scale factor for the given global step, in [0, 1].
    pub fn scale_at(&self, step: usize) -> f64 {
        if self.warmup_steps > 0 && step < self.warmup_steps {
            return (step + 1) as f64 / self.warmup_steps as f64;
        }
        match self.kind {
            LrScheduleKind::Constant => 1.0,
            LrScheduleKind::Linear => {
                let span = self.total_steps.saturating_sub(self.warmup_steps).max(1);
                let progressed = step.saturating_sub(self.warmup_steps).min(span);
                1.0 - progressed as f64 / span as f64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_ramps_to_one() {
        let s = LrSchedule::new(LrScheduleKind::Constant, 5, 50);
        assert!((s.scale_at(0) - 0.2).abs() < 1e-12);
        assert!((s.scale_at(4) - 1.0).abs() < 1e-12);
        assert_eq!(s.scale_at(30), 1.0);
    }

    #[test]
    fn linear_decays_to_zero() {
        let s = LrSchedule::new(LrScheduleKind::Linear, 0, 10);
        assert_eq!(s.scale_at(0), 1.0);
        assert!((s.scale_at(5) - 0.5).abs() < 1e-12);
        assert_eq!(s.scale_at(10), 0.0);
        // Past the end, stays clamped
        assert_eq!(s.scale_at(99), 0.0);
    }

    #[test]
    fn no_warmup_starts_at_full_rate() {
        let s = LrSchedule::new(LrScheduleKind::Constant, 0, 10);
        assert_eq!(s.scale_at(0), 1.0);
    }
}
