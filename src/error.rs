//! Error types for the ferroelectric capacitor model.
//!
//! Hard errors ([`FecapError`]) abort the operation that raised them:
//! parameter validation failures and a failed saturation search at
//! initialization. Soft faults ([`Fault`]) are degraded-but-defined
//! conditions the model recovers from by construction; they are reported in
//! the evaluation record and only become hard errors in strict mode.

use thiserror::Error;

/// Result type alias using [`FecapError`].
pub type Result<T> = std::result::Result<T, FecapError>;

/// Unified error type for all model operations.
#[derive(Error, Debug)]
pub enum FecapError {
    /// Parameter value outside its declared range
    #[error("Invalid parameter '{param}': {message} (got {value:.3e})")]
    InvalidParameter {
        param: &'static str,
        value: f64,
        message: String,
    },

    /// The outward doubling search never reached saturation
    #[error("Saturation search failed after {doublings} doublings (reached {voltage:.3e} V)")]
    SaturationSearchFailed { doublings: usize, voltage: f64 },

    /// Newton-Raphson iteration did not converge (strict mode)
    #[error("Newton-Raphson did not converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// Branch-scaling denominator vanished (strict mode)
    #[error("Branch points indistinguishable under the switching function (|Fa - Fb| = {denominator:.2e})")]
    DegenerateScaling { denominator: f64 },

    /// History stack push beyond capacity (strict mode)
    #[error("{stack} history stack full (capacity {capacity})")]
    HistoryCapacity {
        stack: &'static str,
        capacity: usize,
    },
}

impl FecapError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(param: &'static str, value: f64, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param,
            value,
            message: message.into(),
        }
    }
}

/// A soft fault raised during evaluation.
///
/// All three kinds leave the model in a defined state: the scaling falls
/// back to the identity map, the solver falls back to the last accepted
/// voltage, and an overflowing turning point is dropped. The default policy
/// is to continue and report the fault alongside the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Branch-scaling division by a near-zero denominator
    Arithmetic { denominator: f64 },
    /// Newton solver exhausted its iteration budget
    Convergence { iterations: usize, residual: f64 },
    /// A turning-point push exceeded stack capacity; the point was dropped
    Capacity {
        stack: &'static str,
        capacity: usize,
    },
}

impl From<Fault> for FecapError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Arithmetic { denominator } => Self::DegenerateScaling { denominator },
            Fault::Convergence {
                iterations,
                residual,
            } => Self::ConvergenceFailure {
                iterations,
                residual,
            },
            Fault::Capacity { stack, capacity } => Self::HistoryCapacity { stack, capacity },
        }
    }
}
