//! Termination rules for the adsorption loop.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Converged,
    IterationCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Continue,
    Stop(StopReason),
}

pub trait ConvergencePolicy: Send + Sync {
    /// Called after each completed generation. `iteration` is the 0-based
    /// index of the transition that just finished.
    fn decide(&self, iteration: usize, delta: f64, d_max: f64, i_max: usize) -> Decision;
}

/// Stops once the largest per-label change drops below `d_max`, or when
/// `i_max` generations have run. The first transition always moves mass off
/// the seed labels, so its delta is never taken as convergence.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDeltaPolicy;

impl ConvergencePolicy for MaxDeltaPolicy {
    fn decide(&self, iteration: usize, delta: f64, d_max: f64, i_max: usize) -> Decision {
        if iteration >= 1 && delta < d_max {
            Decision::Stop(StopReason::Converged)
        } else if iteration + 1 >= i_max {
            Decision::Stop(StopReason::IterationCap)
        } else {
            Decision::Continue
        }
    }
}
