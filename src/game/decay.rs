//! Boost magnitude decay
//!
//! Forward Euler step of `dm/dt = -(A0 m^2 + B0 + C0 / (m + D0))`, clamped at
//! zero. The step uses the measured tick duration, so the decay rate follows
//! tick jitter.

use super::input::{Boost, BOOST_MULTIPLIER_MAX};

/// Quadratic drag term, per ms
pub const A0: f64 = 1.0 / (160.0 * 16.0);
/// Constant drag term, per ms
pub const B0: f64 = 1.0 / (80.0 * 16.0);
/// Numerator of the low-speed term, per ms
pub const C0: f64 = 1.0 / (37.5 * 16.0);
/// Offset of the low-speed term
pub const D0: f64 = 1.0 / (0.5 * 16.0);

/// Rate of magnitude loss at `multiplier`, per ms
pub fn decay_rate(multiplier: f64) -> f64 {
    A0 * multiplier * multiplier + B0 + C0 / (multiplier + D0)
}

/// Advance a boost by `dt_ms` milliseconds. Reaching zero fully resets the
/// boost, history included.
pub fn advance(boost: Boost, dt_ms: f64) -> Boost {
    if !boost.state.is_active() {
        return boost;
    }
    let multiplier = boost.state.multiplier();
    let next = (multiplier - dt_ms * decay_rate(multiplier)).min(BOOST_MULTIPLIER_MAX);
    boost.with_multiplier(next)
}
