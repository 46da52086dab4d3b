//! Direction state machine.
//!
//! Decides, from the motion of the solved voltage, whether the operating
//! point is continuing along its branch, has turned around inside the
//! current minor loop, or has escaped past a remembered turning point back
//! to the next-outer loop. Together with the two history stacks this
//! realizes Preisach-style congruency: reversing before a remembered
//! turning point retraces the same branch, exceeding it collapses the
//! innermost loop.

use crate::error::Fault;
use crate::history::HistoryStack;
use crate::scaling::{BranchPoint, ChargeCurve};
use crate::switching::Direction;

/// What the state machine did with a solved voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Motion below the voltage tolerance; nothing changed
    Hold,
    /// Continued along the current branch
    Continue,
    /// Escaped the innermost loop; one level popped from both stacks
    PoppedToOuter { direction: Direction },
    /// Reversal inside the loop; previous point pushed as a turning point
    TurningPoint {
        direction: Direction,
        point: BranchPoint,
    },
}

/// Direction and last-accepted-voltage state for one device.
#[derive(Debug, Clone, Copy)]
pub struct DirectionTracker {
    pub direction: Direction,
    pub previous_voltage: f64,
}

impl DirectionTracker {
    /// Initial state: rising from zero bias.
    pub fn new() -> Self {
        Self {
            direction: Direction::Rising,
            previous_voltage: 0.0,
        }
    }

    /// Apply a newly solved voltage to the hysteresis state.
    ///
    /// Runs only when the voltage moved by more than the tolerance. `curve`
    /// must carry the scaling that was in effect for this evaluation, since
    /// a detected turning point stores the *previous* voltage with its
    /// scaled polarization under that fit.
    pub fn update(
        &mut self,
        new_voltage: f64,
        voltage_tolerance: f64,
        curve: &ChargeCurve<'_>,
        ascending: &mut HistoryStack,
        descending: &mut HistoryStack,
    ) -> (Transition, Option<Fault>) {
        if (new_voltage - self.previous_voltage).abs() <= voltage_tolerance {
            return (Transition::Hold, None);
        }

        let mut fault = None;
        let transition = if new_voltage < ascending.top().voltage {
            // Dropped back past the lower bound of the innermost loop
            if ascending.depth() > 1 && descending.depth() > 1 {
                ascending.pop();
                descending.pop();
            }
            self.direction = Direction::Falling;
            Transition::PoppedToOuter {
                direction: self.direction,
            }
        } else if new_voltage > descending.top().voltage {
            // Climbed past the upper bound of the innermost loop
            if ascending.depth() > 1 && descending.depth() > 1 {
                ascending.pop();
                descending.pop();
            }
            self.direction = Direction::Rising;
            Transition::PoppedToOuter {
                direction: self.direction,
            }
        } else {
            match self.direction {
                Direction::Rising if new_voltage < self.previous_voltage => {
                    let point =
                        BranchPoint::new(self.previous_voltage, curve.polarization(self.previous_voltage));
                    fault = descending.push(point);
                    if fault.is_none() {
                        self.direction = self.direction.reversed();
                        Transition::TurningPoint {
                            direction: self.direction,
                            point,
                        }
                    } else {
                        Transition::Continue
                    }
                }
                Direction::Falling if new_voltage > self.previous_voltage => {
                    let point =
                        BranchPoint::new(self.previous_voltage, curve.polarization(self.previous_voltage));
                    fault = ascending.push(point);
                    if fault.is_none() {
                        self.direction = self.direction.reversed();
                        Transition::TurningPoint {
                            direction: self.direction,
                            point,
                        }
                    } else {
                        Transition::Continue
                    }
                }
                _ => Transition::Continue,
            }
        };

        self.previous_voltage = new_voltage;
        (transition, fault)
    }
}

impl Default for DirectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
