//! # Fecap Core
//!
//! A hysteretic charge-to-voltage compact model for two-terminal
//! ferroelectric capacitors.
//!
//! The model is a constitutive relation intended to be called by a host
//! circuit solver once per nonlinear iteration or timestep: given the
//! present input charge and the device's remembered switching history, it
//! returns the terminal voltage (plus a first-order relaxation term).
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`params`] - Validated model parameters and derived constants
//! - [`switching`] - Idealized saturating polarization curve (tanh branch)
//! - [`scaling`] - Affine branch scaling through the remembered turning points
//! - [`history`] - Bounded turning-point stacks (minor-loop memory)
//! - [`tracker`] - Direction state machine driving the stacks
//! - [`solver`] - Damped Newton-Raphson charge-to-voltage inversion
//! - [`model`] - Per-device driver tying the pieces together
//!
//! ## Model Method
//!
//! Polarization follows a single scaled switching-function pair
//! `F(V, dir) = Qs * tanh(a * (V - dir * Vc))`, affinely refitted every call
//! so the curve passes exactly through the innermost remembered turning
//! points. Minor loops are remembered as entries on two bounded stacks
//! (ascending and descending turning points); reversing before a remembered
//! point retraces the same branch, exceeding it pops back to the next-outer
//! loop. For each call:
//!
//! 1. Refit the branch scaling `(m, beta)` from the current stack tops
//! 2. Invert `Q(V) = m * F(V, dir) + beta + eps_r * eps0 * V / thickness`
//!    for V with damped Newton-Raphson
//! 3. Update direction and turning-point history from the solved voltage
//! 4. Add the charge-rate relaxation term to the output voltage
//!
//! ## Usage
//!
//! ```no_run
//! use fecap_core::{FerroCap, ModelParams};
//!
//! let params = ModelParams::default();
//! let mut device = FerroCap::new(params).unwrap();
//! let out = device.evaluate(1.0, 1e-9).unwrap();
//! println!("V = {}", out.voltage);
//! ```

pub mod error;
pub mod history;
pub mod model;
pub mod params;
pub mod scaling;
pub mod solver;
pub mod switching;
pub mod tracker;

// Re-export main types for convenience
pub use error::{Fault, FecapError, Result};
pub use history::HistoryStack;
pub use model::{Evaluation, FerroCap};
pub use params::{DerivedConstants, ModelParams};
pub use scaling::{BranchPoint, BranchScaling};
pub use switching::Direction;

/// Vacuum permittivity in F/m.
pub const VACUUM_PERMITTIVITY: f64 = 8.854e-12;

/// Fixed scale converting the voltage-encoded input signal into a charge
/// density in C/m^2.
pub const SIGNAL_CHARGE_SCALE: f64 = 0.01;

/// Default capacity of each turning-point history stack.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
