//! Idealized switching-loop function.
//!
//! The major hysteresis loop is approximated by a single tanh branch pair:
//!
//!   F(V, dir) = Qs * tanh(a * (V - dir * Vc))
//!
//! shifted by the coercive voltage Vc in the active switching direction.
//! The rising branch (dir = +1) is centered at +Vc, the falling branch
//! (dir = -1) at -Vc. Both the function and its derivative are pure; all
//! history dependence lives in the branch scaling layered on top.

/// Polarization switching direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Voltage increasing, switching centered at +Vc
    #[default]
    Rising,
    /// Voltage decreasing, switching centered at -Vc
    Falling,
}

impl Direction {
    /// Sign of the coercive-voltage shift: +1 rising, -1 falling.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Rising => 1.0,
            Direction::Falling => -1.0,
        }
    }

    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Rising => Direction::Falling,
            Direction::Falling => Direction::Rising,
        }
    }
}

/// Idealized branch polarization F(V, dir) in C/m^2.
pub fn switching_polarization(
    voltage: f64,
    dir: Direction,
    saturation_polarization: f64,
    slope_factor: f64,
    coercive_voltage: f64,
) -> f64 {
    saturation_polarization * (slope_factor * (voltage - dir.sign() * coercive_voltage)).tanh()
}

/// Derivative dF/dV of the idealized branch polarization, in C/(m^2 V).
pub fn switching_slope(
    voltage: f64,
    dir: Direction,
    saturation_polarization: f64,
    slope_factor: f64,
    coercive_voltage: f64,
) -> f64 {
    // sech^2(x) = 1 / cosh^2(x)
    let x = slope_factor * (voltage - dir.sign() * coercive_voltage);
    let sech = 1.0 / x.cosh();
    saturation_polarization * slope_factor * sech * sech
}
