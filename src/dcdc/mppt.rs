//! Perturb & observe maximum power point tracker.
//!
//! Each tick the duty cycle moves by a fixed step.  If output power fell
//! since the previous tick the direction of travel is reversed.  Near the
//! maximum power point this settles into a small limit cycle around the
//! optimum; the step size trades tracking speed against ripple.

use super::{DutyRange, PowerDirection};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbObserve {
    previous_power: f32,
    /// +1.0 or −1.0, applied to the duty step.
    step_sign: f32,
}

impl PerturbObserve {
    pub const fn new() -> Self {
        Self {
            previous_power: 0.0,
            step_sign: 1.0,
        }
    }

    /// Forget the power history. The next step is never treated as a
    /// power drop, only as a fresh reference.
    pub fn reset(&mut self, power: f32) {
        self.previous_power = power;
    }

    /// Re-seed after a start.  The tracker first moves in the direction
    /// that raises output power for the given conversion direction.
    pub fn restart(&mut self, power: f32, direction: PowerDirection) {
        self.previous_power = power;
        self.step_sign = direction.output_sign();
    }

    /// One perturbation step.  Returns the next duty cycle.
    pub fn step(&mut self, power: f32, duty: f32, step: f32, range: DutyRange) -> f32 {
        if power < self.previous_power {
            self.step_sign = -self.step_sign;
        }
        self.previous_power = power;

        let next = range.clamp(duty + self.step_sign * step);
        if next == duty {
            // Pinned at a duty bound; walk back next time.
            self.step_sign = -self.step_sign;
        }
        next
    }

    pub fn previous_power(&self) -> f32 {
        self.previous_power
    }

    pub fn step_sign(&self) -> f32 {
        self.step_sign
    }
}

impl Default for PerturbObserve {
    fn default() -> Self {
        Self::new()
    }
}
