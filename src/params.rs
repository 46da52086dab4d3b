//! Model parameters and derived constants.
//!
//! All parameters are validated against their declared ranges before a
//! device instance is constructed; violations are hard errors, never soft
//! faults. [`DerivedConstants`] are computed once per instance and shared
//! by the scaling and solver code.

use crate::error::{FecapError, Result};
use crate::{DEFAULT_HISTORY_CAPACITY, VACUUM_PERMITTIVITY};

/// Parameters for a ferroelectric capacitor instance.
///
/// Immutable for the lifetime of a device.
#[derive(Debug, Clone)]
pub struct ModelParams {
    /// Ferroelectric layer thickness in m, > 0
    pub thickness: f64,
    /// Coercive field in V/m, >= 0
    pub coercive_field: f64,
    /// Relative permittivity of the ferroelectric, > 0
    pub relative_permittivity: f64,
    /// Saturation polarization charge density in C/m^2, >= 0
    pub saturation_polarization: f64,
    /// Slope adjustment of the tanh switching curve in 1/V, >= 0
    pub slope_factor: f64,
    /// Relative charge tolerance for the Newton solver, [1e-6, 1e-1]
    pub charge_error_fraction: f64,
    /// Absolute voltage tolerance in V, [1e-6, 1e-1]
    pub voltage_tolerance: f64,
    /// Newton iteration cap, [1000, 1e6]
    pub max_iterations: usize,
    /// Seed of the damping-factor generator
    pub seed: u64,
    /// Relaxation (delay) term coefficient, >= 0
    pub delay_coefficient: f64,
    /// Capacity of each turning-point history stack, >= 1
    pub history_capacity: usize,
}

impl Default for ModelParams {
    /// Reference 20 nm HfO2-like film.
    fn default() -> Self {
        Self {
            thickness: 20e-9,
            coercive_field: 65e6,
            relative_permittivity: 20.0,
            saturation_polarization: 0.25,
            slope_factor: 1.0,
            charge_error_fraction: 1e-4,
            voltage_tolerance: 1e-4,
            max_iterations: 10_000,
            seed: 0,
            delay_coefficient: 0.09,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl ModelParams {
    /// Validate every parameter against its declared range.
    pub fn validate(&self) -> Result<()> {
        if !(self.thickness > 0.0) {
            return Err(FecapError::invalid_parameter(
                "thickness",
                self.thickness,
                "must be > 0",
            ));
        }
        if !(self.coercive_field >= 0.0) {
            return Err(FecapError::invalid_parameter(
                "coercive_field",
                self.coercive_field,
                "must be >= 0",
            ));
        }
        if !(self.relative_permittivity > 0.0) {
            return Err(FecapError::invalid_parameter(
                "relative_permittivity",
                self.relative_permittivity,
                "must be > 0",
            ));
        }
        if !(self.saturation_polarization >= 0.0) {
            return Err(FecapError::invalid_parameter(
                "saturation_polarization",
                self.saturation_polarization,
                "must be >= 0",
            ));
        }
        if !(self.slope_factor >= 0.0) {
            return Err(FecapError::invalid_parameter(
                "slope_factor",
                self.slope_factor,
                "must be >= 0",
            ));
        }
        if !(1e-6..=1e-1).contains(&self.charge_error_fraction) {
            return Err(FecapError::invalid_parameter(
                "charge_error_fraction",
                self.charge_error_fraction,
                "must be within [1e-6, 1e-1]",
            ));
        }
        if !(1e-6..=1e-1).contains(&self.voltage_tolerance) {
            return Err(FecapError::invalid_parameter(
                "voltage_tolerance",
                self.voltage_tolerance,
                "must be within [1e-6, 1e-1]",
            ));
        }
        if !(1000..=1_000_000).contains(&self.max_iterations) {
            return Err(FecapError::invalid_parameter(
                "max_iterations",
                self.max_iterations as f64,
                "must be within [1000, 1e6]",
            ));
        }
        if !(self.delay_coefficient >= 0.0) {
            return Err(FecapError::invalid_parameter(
                "delay_coefficient",
                self.delay_coefficient,
                "must be >= 0",
            ));
        }
        if self.history_capacity < 1 {
            return Err(FecapError::invalid_parameter(
                "history_capacity",
                self.history_capacity as f64,
                "must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Constants derived from [`ModelParams`], computed once per instance.
#[derive(Debug, Clone, Copy)]
pub struct DerivedConstants {
    /// Coercive voltage Vc = Ec * thickness, in V
    pub coercive_voltage: f64,
    /// Linear dielectric capacitance per unit area, eps_r * eps0 / thickness
    pub dielectric_per_area: f64,
    /// Absolute charge tolerance, Qs * charge_error_fraction
    pub charge_tolerance: f64,
}

impl DerivedConstants {
    /// Compute the derived constants for validated parameters.
    pub fn from_params(params: &ModelParams) -> Self {
        Self {
            coercive_voltage: params.coercive_field * params.thickness,
            dielectric_per_area: params.relative_permittivity * VACUUM_PERMITTIVITY
                / params.thickness,
            charge_tolerance: params.saturation_polarization * params.charge_error_fraction,
        }
    }
}
