//! 40-bit fixed-point arithmetic.
//!
//! `RONE = 1 << 40` is 1.0. Multiplication rounds half up, division rounds
//! half up on the quotient; `rpow` splits the exponent into an integer part
//! (square-and-multiply) and a fractional part (`e^(f·ln b)` via a Taylor
//! series). Intermediates are `u128` with checked arithmetic throughout.

use sundial_core::constants::{PRECISION_BITS, RONE};
use sundial_core::error::MathError;

/// ln(2) as a rational: 0.6931471805599453...
const LN2_NUMERATOR: u128 = 6_931_471_805_599_453_094_172;
const LN2_DENOMINATOR: u128 = 10_000_000_000_000_000_000_000;

/// Taylor terms allowed before `rpow_e` gives up.
const MAX_EXP_ITERATIONS: u32 = 500;

/// `a * b / d` with a 256-bit intermediate, truncating.
///
/// Errors only when `d == 0` or the quotient itself exceeds `u128`.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    if let Some(p) = a.checked_mul(b) {
        return Ok(p / d);
    }
    let (hi, lo) = mul_wide(a, b);
    if hi >= d {
        return Err(MathError::Overflow);
    }
    Ok(div_wide(hi, lo, d))
}

/// Full 256-bit product of two u128s as `(hi, lo)`.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1 << 64) - 1;
    let (a1, a0) = (a >> 64, a & MASK);
    let (b1, b0) = (b >> 64, b & MASK);

    let ll = a0 * b0;
    let lh = a0 * b1;
    let hl = a1 * b0;
    let hh = a1 * b1;

    let (mid, mid_carry) = lh.overflowing_add(hl);
    let (lo, lo_carry) = ll.overflowing_add(mid << 64);
    let hi = hh
        + (mid >> 64)
        + ((mid_carry as u128) << 64)
        + lo_carry as u128;
    (hi, lo)
}

/// Restoring binary division of the 256-bit value `(hi, lo)` by `d`.
/// Requires `hi < d` so the quotient fits in a u128.
fn div_wide(hi: u128, lo: u128, d: u128) -> u128 {
    debug_assert!(hi < d);
    let mut rem = hi;
    let mut quotient = 0u128;
    for i in (0..128).rev() {
        let top = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        // With the shifted-out top bit the value is >= 2^128 > d.
        if top == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1 << i;
        }
    }
    quotient
}

/// Fixed-point multiply: `x * y / RONE`, rounded half up.
pub fn rmul(x: u128, y: u128) -> Result<u128, MathError> {
    let prod = x.checked_mul(y).ok_or(MathError::Overflow)?;
    let adj = prod.checked_add(RONE / 2).ok_or(MathError::Overflow)?;
    Ok(adj >> PRECISION_BITS)
}

/// Fixed-point divide: `x * RONE / y`, rounded half up.
pub fn rdiv(x: u128, y: u128) -> Result<u128, MathError> {
    if y == 0 {
        return Err(MathError::DivisionByZero);
    }
    let scaled = x.checked_mul(RONE).ok_or(MathError::Overflow)?;
    let adj = scaled.checked_add(y / 2).ok_or(MathError::Overflow)?;
    Ok(adj / y)
}

/// Floor of `log2(p / q)` as a plain integer. Requires `p >= q > 0`.
fn log2_int(p: u128, q: u128) -> Result<u32, MathError> {
    if q == 0 {
        return Err(MathError::DivisionByZero);
    }
    if p < q {
        return Err(MathError::LogOutOfRange);
    }
    let mut res = 0u32;
    let mut remain = p / q / 2;
    while remain > 0 {
        res += 1;
        remain /= 2;
    }
    Ok(res)
}

/// `log2(x)` for `x` in `[RONE, 2*RONE)`, by repeated squaring.
fn log2_small(mut x: u128) -> Result<u128, MathError> {
    debug_assert!((RONE..2 * RONE).contains(&x));
    let two = 2 * RONE;
    let mut res = 0u128;
    let mut addition = RONE;
    for _ in 0..PRECISION_BITS {
        x = x.checked_mul(x).ok_or(MathError::Overflow)? / RONE;
        addition /= 2;
        if x >= two {
            x /= 2;
            res += addition;
        }
    }
    Ok(res)
}

/// Fixed-point `log2(p / q)`. Requires `p >= q > 0`.
pub fn rlog2(p: u128, q: u128) -> Result<u128, MathError> {
    let n = log2_int(p, q)?;
    let scaled_q = q.checked_shl(n).ok_or(MathError::Overflow)?;
    let y = p.checked_mul(RONE).ok_or(MathError::Overflow)? / scaled_q;
    let small = log2_small(y)?;
    Ok((n as u128) * RONE + small)
}

/// Fixed-point natural log of `p / q`. Requires `p >= q > 0`.
pub fn rln(p: u128, q: u128) -> Result<u128, MathError> {
    let log2x = rlog2(p, q)?;
    let num = LN2_NUMERATOR.checked_mul(log2x).ok_or(MathError::Overflow)?;
    Ok(num / LN2_DENOMINATOR)
}

/// `base^exp` for a plain-integer exponent, in fixed point.
pub fn rpow_i(mut base: u128, mut exp: u128) -> Result<u128, MathError> {
    let mut res = if exp % 2 != 0 { base } else { RONE };
    exp /= 2;
    while exp != 0 {
        base = rmul(base, base)?;
        if exp % 2 != 0 {
            res = rmul(res, base)?;
        }
        exp /= 2;
    }
    Ok(res)
}

/// `e^exp` in fixed point, Taylor series until the term underflows to zero.
pub fn rpow_e(exp: u128) -> Result<u128, MathError> {
    let mut res: u128 = 0;
    let mut term = RONE;
    let mut n: u32 = 0;
    loop {
        res = res.checked_add(term).ok_or(MathError::Overflow)?;
        let next_div = rdiv(exp, (n as u128 + 1) * RONE)?;
        term = rmul(term, next_div)?;
        if term == 0 {
            break;
        }
        n += 1;
        if n > MAX_EXP_ITERATIONS {
            return Err(MathError::NoConvergence);
        }
    }
    Ok(res)
}

/// `base^exp`, both in fixed point.
///
/// `rpow(_, 0) = RONE` and `rpow(0, e > 0) = 0`. For `base < RONE` the
/// fractional part is computed on the reciprocal so the log stays in range.
pub fn rpow(base: u128, exp: u128) -> Result<u128, MathError> {
    if exp == 0 {
        return Ok(RONE);
    }
    if base == 0 {
        return Ok(0);
    }

    let frac = exp % RONE;
    let whole = exp >> PRECISION_BITS;

    let whole_pow = rpow_i(base, whole)?;
    if frac == 0 {
        return Ok(whole_pow);
    }

    let frac_pow = if base < RONE {
        let inv_ln = rln(rdiv(RONE, base)?, RONE)?;
        rdiv(RONE, rpow_e(rmul(frac, inv_ln)?)?)?
    } else {
        rpow_e(rmul(frac, rln(base, RONE)?)?)?
    };
    rmul(whole_pow, frac_pow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// One part in a million of `RONE`.
    const TOL: u128 = RONE / 1_000_000;

    fn assert_close(actual: u128, expected: u128, tol: u128) {
        let diff = actual.abs_diff(expected);
        assert!(diff <= tol, "actual {actual}, expected {expected}, diff {diff} > tol {tol}");
    }

    // ---- mul_div ----

    #[test]
    fn mul_div_small_values() {
        assert_eq!(mul_div(6, 7, 2).unwrap(), 21);
        assert_eq!(mul_div(1, 1, 3).unwrap(), 0);
        assert_eq!(mul_div(0, u128::MAX, 5).unwrap(), 0);
    }

    #[test]
    fn mul_div_wide_intermediate() {
        // (2^100 * 2^100) / 2^100 = 2^100 even though the product overflows.
        let big = 1u128 << 100;
        assert_eq!(mul_div(big, big, big).unwrap(), big);
        // u128::MAX * 3 / 3
        assert_eq!(mul_div(u128::MAX, 3, 3).unwrap(), u128::MAX);
    }

    #[test]
    fn mul_div_errors() {
        assert_eq!(mul_div(1, 1, 0).unwrap_err(), MathError::DivisionByZero);
        assert_eq!(mul_div(u128::MAX, u128::MAX, 1).unwrap_err(), MathError::Overflow);
    }

    // ---- rmul / rdiv ----

    #[test]
    fn rmul_identity_and_zero() {
        assert_eq!(rmul(123_456, RONE).unwrap(), 123_456);
        assert_eq!(rmul(123_456, 0).unwrap(), 0);
    }

    #[test]
    fn rmul_rounds_half_up() {
        // 3 * (RONE/2) = 1.5 -> 2
        assert_eq!(rmul(3, RONE / 2).unwrap(), 2);
        // 1 * (RONE/4) = 0.25 -> 0
        assert_eq!(rmul(1, RONE / 4).unwrap(), 0);
    }

    #[test]
    fn rdiv_identity_and_reciprocal() {
        assert_eq!(rdiv(7 * RONE, RONE).unwrap(), 7 * RONE);
        assert_eq!(rdiv(RONE, 2 * RONE).unwrap(), RONE / 2);
    }

    #[test]
    fn rdiv_by_zero_is_error() {
        assert_eq!(rdiv(1, 0).unwrap_err(), MathError::DivisionByZero);
    }

    #[test]
    fn rmul_overflow_is_error() {
        assert_eq!(rmul(u128::MAX, 2).unwrap_err(), MathError::Overflow);
    }

    // ---- logs ----

    #[test]
    fn log2_int_of_powers_of_two() {
        assert_eq!(log2_int(8, 1).unwrap(), 3);
        assert_eq!(log2_int(9, 1).unwrap(), 3);
        assert_eq!(log2_int(1, 1).unwrap(), 0);
    }

    #[test]
    fn rlog2_exact_powers() {
        assert_eq!(rlog2(4 * RONE, RONE).unwrap(), 2 * RONE);
        assert_eq!(rlog2(RONE, RONE).unwrap(), 0);
    }

    #[test]
    fn rlog2_of_three_halves() {
        // log2(1.5) = 0.5849625007...
        let expected = (0.584_962_500_7_f64 * RONE as f64) as u128;
        assert_close(rlog2(3 * RONE, 2 * RONE).unwrap(), expected, TOL);
    }

    #[test]
    fn rlog2_below_one_is_error() {
        assert_eq!(rlog2(RONE - 1, RONE).unwrap_err(), MathError::LogOutOfRange);
    }

    #[test]
    fn rln_of_e_is_one() {
        // e = 2.718281828... in fixed point
        let e = (2.718_281_828_459_045_f64 * RONE as f64) as u128;
        assert_close(rln(e, RONE).unwrap(), RONE, TOL);
    }

    #[test]
    fn rln_of_two() {
        let expected = (0.693_147_180_56_f64 * RONE as f64) as u128;
        assert_close(rln(2 * RONE, RONE).unwrap(), expected, TOL);
    }

    // ---- powers ----

    #[test]
    fn rpow_i_small_cases() {
        assert_eq!(rpow_i(2 * RONE, 0).unwrap(), RONE);
        assert_eq!(rpow_i(2 * RONE, 1).unwrap(), 2 * RONE);
        assert_eq!(rpow_i(2 * RONE, 10).unwrap(), 1024 * RONE);
    }

    #[test]
    fn rpow_e_of_zero_and_one() {
        assert_eq!(rpow_e(0).unwrap(), RONE);
        let e = (2.718_281_828_459_045_f64 * RONE as f64) as u128;
        assert_close(rpow_e(RONE).unwrap(), e, TOL * 10);
    }

    #[test]
    fn rpow_edge_cases() {
        assert_eq!(rpow(0, 0).unwrap(), RONE);
        assert_eq!(rpow(5 * RONE, 0).unwrap(), RONE);
        assert_eq!(rpow(0, RONE).unwrap(), 0);
    }

    #[test]
    fn rpow_square_root() {
        // 2^0.5 = 1.41421356...
        let expected = (1.414_213_562_f64 * RONE as f64) as u128;
        assert_close(rpow(2 * RONE, RONE / 2).unwrap(), expected, TOL * 10);
    }

    #[test]
    fn rpow_fractional_base_below_one() {
        // 0.25^0.5 = 0.5
        assert_close(rpow(RONE / 4, RONE / 2).unwrap(), RONE / 2, TOL * 10);
        // 0.5^2 = 0.25
        assert_eq!(rpow(RONE / 2, 2 * RONE).unwrap(), RONE / 4);
    }

    #[test]
    fn rpow_mixed_exponent() {
        // 4^1.5 = 8
        assert_close(rpow(4 * RONE, RONE + RONE / 2).unwrap(), 8 * RONE, TOL * 100);
    }

    // ---- proptest ----

    proptest! {
        #[test]
        fn mul_div_matches_checked_path(
            a in 0u128..(1u128 << 64),
            b in 0u128..(1u128 << 63),
            d in 1u128..(1u128 << 64),
        ) {
            // Both operand paths must agree where the narrow one works.
            prop_assert_eq!(mul_div(a, b, d).unwrap(), a * b / d);
        }

        #[test]
        fn mul_div_scales_linearly(
            a in 1u128..(1u128 << 100),
            shift in 0u32..20,
        ) {
            // (a * 2^s) / 2^s == a, regardless of intermediate width.
            let pow = 1u128 << shift;
            prop_assert_eq!(mul_div(a, pow, pow).unwrap(), a);
        }

        #[test]
        fn rmul_one_is_identity(x in 0u128..(1u128 << 80)) {
            prop_assert_eq!(rmul(x, RONE).unwrap(), x);
        }

        #[test]
        fn rmul_rdiv_inverse(
            x in 1u128..(1u128 << 60),
            y in 1u128..(1u128 << 40),
        ) {
            // (x / y) * y within one step of x at this scale.
            let q = rdiv(x, y).unwrap();
            let back = rmul(q, y).unwrap();
            prop_assert!(back.abs_diff(x) <= y / RONE + 2);
        }

        #[test]
        fn rlog2_monotonic(
            a in RONE..(1u128 << 70),
            b in RONE..(1u128 << 70),
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rlog2(lo, RONE).unwrap() <= rlog2(hi, RONE).unwrap());
        }

        #[test]
        fn rpow_of_ratio_below_one_stays_below_one(
            num in 1u128..1_000_000u128,
            den_extra in 1u128..1_000_000u128,
            exp in 1u128..(4 * RONE),
        ) {
            let ratio = rdiv(num, num + den_extra).unwrap();
            let p = rpow(ratio, exp).unwrap();
            // Rounding can land exactly on RONE for ratios very close to one.
            prop_assert!(p <= RONE);
        }

        #[test]
        fn rpow_monotonic_in_base(
            a in (RONE / 1000)..RONE,
            b in (RONE / 1000)..RONE,
            exp in (RONE / 4)..(2 * RONE),
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let plo = rpow(lo, exp).unwrap();
            let phi = rpow(hi, exp).unwrap();
            // Allow one rounding step of slack.
            prop_assert!(plo <= phi + 2);
        }
    }
}
