//! Affine branch scaling.
//!
//! The idealized switching curve never passes through an arbitrary pair of
//! remembered turning points on its own. Before every evaluation the curve
//! is refitted with an affine map (slope `m`, intercept `beta`) chosen so
//! that the scaled polarization reproduces both stack tops exactly:
//!
//!   m    = (Pa - Pb) / (Fa - Fb)
//!   beta = (Pb * Fa - Pa * Fb) / (Fa - Fb)
//!
//! where (Va, Pa) and (Vb, Pb) are the ascending and descending stack tops
//! and Fa, Fb the idealized curve values at their voltages. This is what
//! keeps the model continuous at minor-loop boundaries.

use crate::error::Fault;
use crate::params::{DerivedConstants, ModelParams};
use crate::switching::{switching_polarization, switching_slope, Direction};

/// Denominator magnitude below which the two branch points are considered
/// indistinguishable under the switching function.
const DEGENERATE_EPS: f64 = 1e-18;

/// A remembered turning point on the hysteresis loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchPoint {
    /// Terminal voltage at the turning point, in V
    pub voltage: f64,
    /// Scaled polarization at the turning point, in C/m^2
    pub polarization: f64,
}

impl BranchPoint {
    /// Create a turning point.
    pub fn new(voltage: f64, polarization: f64) -> Self {
        Self {
            voltage,
            polarization,
        }
    }
}

/// Affine map fitting the idealized curve to the current stack tops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchScaling {
    /// Multiplicative slope m
    pub slope: f64,
    /// Additive intercept beta
    pub intercept: f64,
}

impl BranchScaling {
    /// The neutral identity map, used when the fit degenerates.
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        intercept: 0.0,
    };

    /// Fit the scaling through the ascending and descending stack tops for
    /// the active direction.
    ///
    /// If the idealized curve cannot tell the two points apart (Fa == Fb),
    /// the fit is degenerate: an [`Fault::Arithmetic`] is reported and the
    /// identity map is returned so the model keeps producing finite values.
    pub fn fit(
        ascending_top: BranchPoint,
        descending_top: BranchPoint,
        direction: Direction,
        params: &ModelParams,
        derived: &DerivedConstants,
    ) -> (Self, Option<Fault>) {
        let fa = switching_polarization(
            ascending_top.voltage,
            direction,
            params.saturation_polarization,
            params.slope_factor,
            derived.coercive_voltage,
        );
        let fb = switching_polarization(
            descending_top.voltage,
            direction,
            params.saturation_polarization,
            params.slope_factor,
            derived.coercive_voltage,
        );

        let denominator = fa - fb;
        if denominator.abs() < DEGENERATE_EPS {
            return (Self::IDENTITY, Some(Fault::Arithmetic { denominator }));
        }

        let pa = ascending_top.polarization;
        let pb = descending_top.polarization;
        let scaling = Self {
            slope: (pa - pb) / denominator,
            intercept: (pb * fa - pa * fb) / denominator,
        };
        (scaling, None)
    }
}

/// The branch-scaled charge relation the solver inverts.
///
/// Bundles the fitted scaling, the active direction, and the device
/// constants so charge and slope can be evaluated at any voltage.
#[derive(Debug, Clone, Copy)]
pub struct ChargeCurve<'a> {
    pub scaling: BranchScaling,
    pub direction: Direction,
    pub params: &'a ModelParams,
    pub derived: &'a DerivedConstants,
}

impl ChargeCurve<'_> {
    /// Scaled polarization P(V) = m * F(V, dir) + beta.
    pub fn polarization(&self, voltage: f64) -> f64 {
        let f = switching_polarization(
            voltage,
            self.direction,
            self.params.saturation_polarization,
            self.params.slope_factor,
            self.derived.coercive_voltage,
        );
        self.scaling.slope * f + self.scaling.intercept
    }

    /// Total charge density Q(V): scaled polarization plus the linear
    /// dielectric term.
    pub fn charge(&self, voltage: f64) -> f64 {
        self.polarization(voltage) + self.derived.dielectric_per_area * voltage
    }

    /// dQ/dV, the Jacobian of the charge relation.
    pub fn charge_slope(&self, voltage: f64) -> f64 {
        let df = switching_slope(
            voltage,
            self.direction,
            self.params.saturation_polarization,
            self.params.slope_factor,
            self.derived.coercive_voltage,
        );
        self.scaling.slope * df + self.derived.dielectric_per_area
    }
}
