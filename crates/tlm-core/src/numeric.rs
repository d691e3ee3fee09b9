use crate::TlmError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Relative comparison used when snapping delay fractions and saturation
/// checks. `epsilon` is relative to the larger magnitude.
pub fn fuzzy_equal(a: Real, b: Real, epsilon: Real) -> bool {
    (a - b).abs() <= epsilon * a.abs().max(b.abs()).max(1.0)
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, TlmError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(TlmError::NonFinite { what, value: v })
    }
}

/// Sign with `sign(0) == 1`, matching how flow directions are chosen.
#[inline]
pub fn sign(x: Real) -> Real {
    if x >= 0.0 { 1.0 } else { -1.0 }
}

/// Clamp `x` into `[min, max]`. Reversed bounds are swapped instead of
/// rejected.
#[inline]
pub fn limit(x: Real, min: Real, max: Real) -> Real {
    let (lo, hi) = if min > max { (max, min) } else { (min, max) };
    if x > hi {
        hi
    } else if x < lo {
        lo
    } else {
        x
    }
}

/// Derivative of [`limit`]: zero when the limiter is active.
#[inline]
pub fn dx_limit(x: Real, min: Real, max: Real) -> Real {
    if x >= max || x <= min { 0.0 } else { 1.0 }
}

/// Derivative of [`limit`] that stays active while moving away from the
/// bound, `sx` being the direction of change.
#[inline]
pub fn dx_limit2(x: Real, sx: Real, min: Real, max: Real) -> Real {
    if (x >= max && sx >= 0.0) || (x <= min && sx <= 0.0) {
        0.0
    } else {
        1.0
    }
}

#[inline]
pub fn low_limit(x: Real, min: Real) -> Real {
    if x < min { min } else { x }
}

#[inline]
pub fn high_limit(x: Real, max: Real) -> Real {
    if x > max { max } else { x }
}

/// Signed square root linearized around zero: behaves like
/// `sign(x) * sqrt(|x|)` for `|x| >> x0` but has a finite slope at `x = 0`.
#[inline]
pub fn signed_square_l(x: Real, x0: Real) -> Real {
    ((x0 + x.abs()).sqrt() - x0.sqrt()) * sign(x)
}

#[inline]
pub fn dx_signed_square_l(x: Real, x0: Real) -> Real {
    1.0 / ((x0 + x.abs()).sqrt() * 2.0)
}

#[inline]
pub fn square_abs_l(x: Real, x0: Real) -> Real {
    (x0 + x.abs()).sqrt() - x0.sqrt()
}

#[inline]
pub fn dx_square_abs_l(x: Real, x0: Real) -> Real {
    sign(x) / ((x0 + x.abs()).sqrt() * 2.0)
}

/// 1 when `x >= 0`, else 0.
#[inline]
pub fn on_positive(x: Real) -> Real {
    if x < 0.0 { 0.0 } else { 1.0 }
}

/// 1 when `x < 0`, else 0.
#[inline]
pub fn on_negative(x: Real) -> Real {
    if x < 0.0 { 1.0 } else { 0.0 }
}

#[inline]
pub fn if_positive(x: Real, y1: Real, y2: Real) -> Real {
    if x >= 0.0 { y1 } else { y2 }
}

#[inline]
pub fn dx_abs(x: Real) -> Real {
    if x < 0.0 { -1.0 } else { 1.0 }
}

#[inline]
pub fn equal_signs(x: Real, y: Real) -> Real {
    if sign(x) == sign(y) { 1.0 } else { 0.0 }
}

/// `atan2` that returns 0 instead of an arbitrary angle at `x == 0`.
#[inline]
pub fn atan2_l(y: Real, x: Real) -> Real {
    if x != 0.0 { y.atan2(x) } else { 0.0 }
}

/// `asin` with its argument kept away from the singular end points.
#[inline]
pub fn arc_sin_l(x: Real) -> Real {
    limit(x, -0.999, 0.999).asin()
}

#[inline]
pub fn bool_to_real(value: bool) -> Real {
    if value { 1.0 } else { 0.0 }
}

#[inline]
pub fn real_to_bool(value: Real) -> bool {
    value > 0.5
}

/// Division that refuses (near-)zero denominators instead of producing inf.
pub fn checked_div(num: Real, den: Real, what: &'static str) -> Result<Real, TlmError> {
    if den.abs() < f64::MIN_POSITIVE {
        return Err(TlmError::InvalidArg { what });
    }
    ensure_finite(num / den, what)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn limit_swaps_reversed_bounds() {
        assert_eq!(limit(5.0, 2.0, -2.0), 2.0);
        assert_eq!(limit(-5.0, 2.0, -2.0), -2.0);
        assert_eq!(limit(0.5, -1.0, 1.0), 0.5);
    }

    #[test]
    fn dx_limit_is_zero_on_bounds() {
        assert_eq!(dx_limit(1.0, 0.0, 1.0), 0.0);
        assert_eq!(dx_limit(0.0, 0.0, 1.0), 0.0);
        assert_eq!(dx_limit(0.5, 0.0, 1.0), 1.0);
        assert_eq!(dx_limit2(1.0, -1.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn signed_square_l_is_odd_and_finite_at_zero() {
        assert_eq!(signed_square_l(0.0, 1e-4), 0.0);
        assert!(dx_signed_square_l(0.0, 1e-4).is_finite());
        let a = signed_square_l(4.0, 1e-6);
        assert!((a - 2.0).abs() < 1e-2, "far from zero it follows sqrt, got {a}");
        assert_eq!(signed_square_l(-4.0, 1e-6), -a);
    }

    #[test]
    fn checked_div_rejects_zero() {
        assert!(checked_div(1.0, 0.0, "impedance sum").is_err());
        assert_eq!(checked_div(1.0, 4.0, "ok").unwrap(), 0.25);
    }

    #[test]
    fn fuzzy_equal_scales_with_magnitude() {
        assert!(fuzzy_equal(1e6, 1e6 + 1e-4, 1e-9));
        assert!(!fuzzy_equal(1.0, 1.001, 1e-9));
    }
}
