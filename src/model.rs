//! Per-device model driver.
//!
//! [`FerroCap`] owns everything one capacitor instance needs: validated
//! parameters, derived constants, the two turning-point stacks, the
//! direction tracker and the damping generator. Instances never share
//! state. Each call refits the branch scaling, inverts the charge relation
//! for a voltage, feeds the result through the direction state machine and
//! composes the output with the charge-rate relaxation term.
//!
//! State mutates immediately on every accepted voltage change. There is no
//! tentative/committed split: a host that re-evaluates within a timestep or
//! rejects a timestep inherits whatever minor-loop memory those calls
//! built. This mirrors the model's lineage and is deliberate; a
//! commit/rollback boundary belongs in the host integration layer if one is
//! wanted.

use tracing::{debug, info, trace, warn};

use crate::error::{Fault, Result};
use crate::history::HistoryStack;
use crate::params::{DerivedConstants, ModelParams};
use crate::scaling::{BranchPoint, BranchScaling, ChargeCurve};
use crate::solver::{invert_charge, DampingSequence, LcgDamping};
use crate::switching::{switching_polarization, Direction};
use crate::tracker::{DirectionTracker, Transition};
use crate::{FecapError, SIGNAL_CHARGE_SCALE};

/// Doubling cap for the outward saturation search.
const MAX_SATURATION_DOUBLINGS: usize = 64;

/// Starting magnitude of the saturation search, in V.
const SATURATION_SEARCH_START: f64 = 0.1;

/// Result of one model evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Output terminal voltage including the relaxation term, in V
    pub voltage: f64,
    /// Voltage solved from the charge relation alone, in V
    pub solved_voltage: f64,
    /// Newton iterations spent by the solve
    pub iterations: usize,
    /// Soft faults raised during the call, in order of occurrence
    pub faults: Vec<Fault>,
}

/// A ferroelectric capacitor device instance.
pub struct FerroCap {
    params: ModelParams,
    derived: DerivedConstants,
    ascending: HistoryStack,
    descending: HistoryStack,
    tracker: DirectionTracker,
    damping: Box<dyn DampingSequence>,
    scaling: BranchScaling,
    previous_charge: Option<f64>,
    strict_faults: bool,
}

impl FerroCap {
    /// Validate parameters, run the saturation search and build a device.
    pub fn new(params: ModelParams) -> Result<Self> {
        params.validate()?;
        let derived = DerivedConstants::from_params(&params);
        let (ascending_bound, descending_bound) = saturation_search(&params, &derived)?;

        info!(
            coercive_voltage = derived.coercive_voltage,
            lower_bound = ascending_bound.voltage,
            upper_bound = descending_bound.voltage,
            history_capacity = params.history_capacity,
            "ferroelectric capacitor initialized"
        );

        let damping = Box::new(LcgDamping::new(params.seed));
        Ok(Self {
            ascending: HistoryStack::new("ascending", params.history_capacity, ascending_bound),
            descending: HistoryStack::new("descending", params.history_capacity, descending_bound),
            tracker: DirectionTracker::new(),
            damping,
            scaling: BranchScaling::IDENTITY,
            previous_charge: None,
            strict_faults: false,
            params,
            derived,
        })
    }

    /// Turn soft faults into hard errors.
    ///
    /// Off by default for compatibility with the continue-on-fault lineage.
    pub fn with_strict_faults(mut self, strict: bool) -> Self {
        self.strict_faults = strict;
        self
    }

    /// Replace the damping-factor source (tests pin the sequence this way).
    pub fn with_damping(mut self, damping: Box<dyn DampingSequence>) -> Self {
        self.damping = damping;
        self
    }

    /// Evaluate the model for one host call.
    ///
    /// `signal` is the voltage-encoded charge density from the input port;
    /// `dt` the host timestep in seconds (any value <= 0 disables the
    /// relaxation term for this call). Safe to call repeatedly per
    /// timestep, but each call commits its state changes immediately.
    pub fn evaluate(&mut self, signal: f64, dt: f64) -> Result<Evaluation> {
        let mut faults = Vec::new();

        // 1. Refit the scaling to the current stack tops. Must happen every
        //    call: the tops may have moved since the previous evaluation.
        let (scaling, fit_fault) = BranchScaling::fit(
            self.ascending.top(),
            self.descending.top(),
            self.tracker.direction,
            &self.params,
            &self.derived,
        );
        self.scaling = scaling;
        if let Some(fault) = fit_fault {
            warn!(?fault, "branch scaling degenerated; using identity map");
            if self.strict_faults {
                return Err(fault.into());
            }
            faults.push(fault);
        }

        // 2. Input signal to absolute charge per unit area
        let target_charge = signal * SIGNAL_CHARGE_SCALE;

        // 3. Invert the charge relation
        let curve = ChargeCurve {
            scaling: self.scaling,
            direction: self.tracker.direction,
            params: &self.params,
            derived: &self.derived,
        };
        let outcome = invert_charge(
            &curve,
            target_charge,
            self.tracker.previous_voltage,
            self.derived.charge_tolerance,
            self.params.voltage_tolerance,
            self.params.max_iterations,
            self.damping.as_mut(),
        );
        if let Some(fault) = outcome.fault {
            warn!(
                ?fault,
                target_charge, "charge inversion failed; keeping last accepted voltage"
            );
            if self.strict_faults {
                return Err(fault.into());
            }
            faults.push(fault);
        }

        // 4. Direction/history update from the solved voltage
        let (transition, tracker_fault) = self.tracker.update(
            outcome.voltage,
            self.params.voltage_tolerance,
            &curve,
            &mut self.ascending,
            &mut self.descending,
        );
        match transition {
            Transition::PoppedToOuter { direction } => {
                debug!(
                    ?direction,
                    voltage = outcome.voltage,
                    ascending_depth = self.ascending.depth(),
                    descending_depth = self.descending.depth(),
                    "collapsed to outer loop"
                );
            }
            Transition::TurningPoint { direction, point } => {
                debug!(
                    ?direction,
                    turning_voltage = point.voltage,
                    turning_polarization = point.polarization,
                    "direction reversed at turning point"
                );
            }
            Transition::Hold | Transition::Continue => {}
        }
        if let Some(fault) = tracker_fault {
            warn!(?fault, "turning point dropped");
            if self.strict_faults {
                return Err(fault.into());
            }
            faults.push(fault);
        }

        // 5. Relaxation term from the charge rate
        let dq_dt = match self.previous_charge {
            Some(previous) if dt > 0.0 => (target_charge - previous) / dt,
            _ => 0.0,
        };
        self.previous_charge = Some(target_charge);
        let voltage = outcome.voltage
            + self.params.delay_coefficient * self.params.thickness * dq_dt;

        Ok(Evaluation {
            voltage,
            solved_voltage: outcome.voltage,
            iterations: outcome.iterations,
            faults,
        })
    }

    /// Discard all hysteresis memory and return to the initial state.
    ///
    /// Re-runs the saturation search and re-seeds the damping generator.
    pub fn reset(&mut self) -> Result<()> {
        let (ascending_bound, descending_bound) = saturation_search(&self.params, &self.derived)?;
        self.ascending =
            HistoryStack::new("ascending", self.params.history_capacity, ascending_bound);
        self.descending =
            HistoryStack::new("descending", self.params.history_capacity, descending_bound);
        self.tracker = DirectionTracker::new();
        self.damping = Box::new(LcgDamping::new(self.params.seed));
        self.scaling = BranchScaling::IDENTITY;
        self.previous_charge = None;
        Ok(())
    }

    /// Model parameters of this instance.
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Derived constants of this instance.
    pub fn derived(&self) -> &DerivedConstants {
        &self.derived
    }

    /// Current switching direction.
    pub fn direction(&self) -> Direction {
        self.tracker.direction
    }

    /// Last accepted voltage.
    pub fn previous_voltage(&self) -> f64 {
        self.tracker.previous_voltage
    }

    /// Branch scaling fitted by the most recent evaluation.
    pub fn scaling(&self) -> BranchScaling {
        self.scaling
    }

    /// Lower (ascending) turning-point stack.
    pub fn ascending(&self) -> &HistoryStack {
        &self.ascending
    }

    /// Upper (descending) turning-point stack.
    pub fn descending(&self) -> &HistoryStack {
        &self.descending
    }

    /// Emit both history stacks on the trace level.
    pub fn dump_history(&self) {
        for stack in [&self.ascending, &self.descending] {
            for (index, point) in stack.entries().iter().enumerate() {
                trace!(
                    stack = stack.label(),
                    index,
                    voltage = point.voltage,
                    polarization = point.polarization,
                    "history entry"
                );
            }
        }
    }
}

/// Find the outer saturation bounds by doubling outward from a small bias.
///
/// The negative search runs on the rising branch until it reaches negative
/// saturation; the positive search on the falling branch until positive
/// saturation. With a vanishing slope factor the curve never saturates and
/// the search fails hard: no valid initial stack bounds exist.
fn saturation_search(
    params: &ModelParams,
    derived: &DerivedConstants,
) -> Result<(BranchPoint, BranchPoint)> {
    let qs = params.saturation_polarization;

    let mut lower = -SATURATION_SEARCH_START;
    let mut doublings = 0;
    while switching_polarization(
        lower,
        Direction::Rising,
        qs,
        params.slope_factor,
        derived.coercive_voltage,
    ) > -qs
    {
        if doublings >= MAX_SATURATION_DOUBLINGS {
            return Err(FecapError::SaturationSearchFailed {
                doublings,
                voltage: lower,
            });
        }
        lower *= 2.0;
        doublings += 1;
    }

    let mut upper = SATURATION_SEARCH_START;
    let mut doublings = 0;
    while switching_polarization(
        upper,
        Direction::Falling,
        qs,
        params.slope_factor,
        derived.coercive_voltage,
    ) < qs
    {
        if doublings >= MAX_SATURATION_DOUBLINGS {
            return Err(FecapError::SaturationSearchFailed {
                doublings,
                voltage: upper,
            });
        }
        upper *= 2.0;
        doublings += 1;
    }

    Ok((BranchPoint::new(lower, -qs), BranchPoint::new(upper, qs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn device() -> FerroCap {
        FerroCap::new(ModelParams::default()).unwrap()
    }

    /// Drive the model to the voltage whose charge matches `signal`.
    fn drive(device: &mut FerroCap, signal: f64) -> Evaluation {
        let out = device.evaluate(signal, 0.0).unwrap();
        assert!(out.faults.is_empty(), "unexpected faults: {:?}", out.faults);
        out
    }

    #[test]
    fn saturation_bounds_bracket_the_loop() {
        let device = device();
        let lower = device.ascending().top();
        let upper = device.descending().top();
        assert!(lower.voltage < 0.0 && upper.voltage > 0.0);
        assert_eq!(lower.polarization, -0.25);
        assert_eq!(upper.polarization, 0.25);
        assert_eq!(device.direction(), Direction::Rising);
        assert_eq!(device.previous_voltage(), 0.0);
    }

    #[test]
    fn saturation_search_fails_for_flat_curve() {
        let params = ModelParams {
            slope_factor: 0.0,
            ..ModelParams::default()
        };
        assert!(matches!(
            FerroCap::new(params),
            Err(FecapError::SaturationSearchFailed { .. })
        ));
    }

    #[test]
    fn scaled_curve_reproduces_stack_tops_after_evaluation() {
        let mut device = device();
        drive(&mut device, 10.0);

        let curve = ChargeCurve {
            scaling: device.scaling(),
            direction: device.direction(),
            params: device.params(),
            derived: device.derived(),
        };
        let lower = device.ascending().top();
        let upper = device.descending().top();
        assert_abs_diff_eq!(
            curve.polarization(lower.voltage),
            lower.polarization,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            curve.polarization(upper.voltage),
            upper.polarization,
            epsilon = 1e-12
        );
        // Operating point stays inside the innermost loop bounds
        let v = device.previous_voltage();
        assert!(v >= lower.voltage - device.params().voltage_tolerance);
        assert!(v <= upper.voltage + device.params().voltage_tolerance);
    }

    #[test]
    fn congruency_pop_restores_scaling_bit_identical() {
        let mut device = device();

        // Establish an operating point on the outer rising branch
        drive(&mut device, 15.0);
        let outer_scaling = device.scaling();
        assert_eq!(device.ascending().depth(), 1);
        assert_eq!(device.descending().depth(), 1);

        // Reverse inside the loop: upper turning point pushed
        drive(&mut device, 8.0);
        assert_eq!(device.direction(), Direction::Falling);
        assert_eq!(device.descending().depth(), 2);

        // Keep falling, then reverse again: lower turning point pushed
        drive(&mut device, 10.0);
        drive(&mut device, 12.0);
        assert_eq!(device.direction(), Direction::Rising);
        assert_eq!(device.ascending().depth(), 2);

        // Exceed the remembered upper turning point: minor loop wiped
        drive(&mut device, 16.0);
        assert_eq!(device.direction(), Direction::Rising);
        assert_eq!(device.ascending().depth(), 1);
        assert_eq!(device.descending().depth(), 1);

        // The next evaluation refits from the restored tops: bit-identical
        drive(&mut device, 15.0);
        let restored = device.scaling();
        assert_eq!(restored.slope.to_bits(), outer_scaling.slope.to_bits());
        assert_eq!(
            restored.intercept.to_bits(),
            outer_scaling.intercept.to_bits()
        );
    }

    #[test]
    fn strict_mode_turns_capacity_fault_into_error() {
        let params = ModelParams {
            history_capacity: 1,
            ..ModelParams::default()
        };
        let mut device = FerroCap::new(params).unwrap().with_strict_faults(true);

        device.evaluate(15.0, 0.0).unwrap();
        // Reversal wants to push a turning point, but capacity is 1
        let result = device.evaluate(8.0, 0.0);
        assert!(matches!(result, Err(FecapError::HistoryCapacity { .. })));
    }

    #[test]
    fn lenient_mode_reports_capacity_fault_and_continues() {
        let params = ModelParams {
            history_capacity: 1,
            ..ModelParams::default()
        };
        let mut device = FerroCap::new(params).unwrap();

        device.evaluate(15.0, 0.0).unwrap();
        let out = device.evaluate(8.0, 0.0).unwrap();
        assert!(matches!(out.faults.as_slice(), [Fault::Capacity { .. }]));
        assert_eq!(device.descending().depth(), 1);
    }

    #[test]
    fn relaxation_term_follows_charge_rate() {
        let mut device = device();
        let first = device.evaluate(5.0, 1e-9).unwrap();
        // First call has no charge history: no relaxation contribution
        assert_eq!(first.voltage, first.solved_voltage);

        let second = device.evaluate(6.0, 1e-9).unwrap();
        let dq_dt = (6.0 - 5.0) * SIGNAL_CHARGE_SCALE / 1e-9;
        let expected = second.solved_voltage
            + device.params().delay_coefficient * device.params().thickness * dq_dt;
        assert_abs_diff_eq!(second.voltage, expected, epsilon = 1e-12);
    }

    #[test]
    fn damping_source_is_swappable() {
        /// Constant damping; full Newton steps would two-cycle on the
        /// saturated curve, which is what the random factor is for.
        struct Constant(u32);
        impl DampingSequence for Constant {
            fn next_factor(&mut self) -> u32 {
                self.0
            }
        }

        let mut first = device().with_damping(Box::new(Constant(3)));
        let out = drive(&mut first, 15.0);
        assert!(out.iterations >= 1);

        // A pinned sequence makes runs reproducible across instances
        let mut again = device().with_damping(Box::new(Constant(3)));
        let repeat = drive(&mut again, 15.0);
        assert_eq!(out.voltage.to_bits(), repeat.voltage.to_bits());
    }

    #[test]
    fn reset_discards_minor_loop_memory() {
        let mut device = device();
        drive(&mut device, 15.0);
        drive(&mut device, 8.0);
        assert!(device.descending().depth() > 1);

        device.reset().unwrap();
        assert_eq!(device.ascending().depth(), 1);
        assert_eq!(device.descending().depth(), 1);
        assert_eq!(device.direction(), Direction::Rising);
        assert_eq!(device.previous_voltage(), 0.0);
    }
}
