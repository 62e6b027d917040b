//! Time-decay weight curve.
//!
//! Pool weights are a pure function of time, never of trade volume. The
//! yield claim's implied price follows `ln(pi * ttm/T + 1) / ln(pi + 1)`
//! (1.0 at issue, 0 at expiry, steepening as expiry nears); each catch-up
//! shifts weight from the yield side to the base side by
//! `theta = w_y * w_b * (1 - r) / (r * w_y + w_b)` where `r` is the ratio
//! of the price now to the price at the previous update.

use sundial_core::constants::{MIN_POOL_WEIGHT, PI_FP, RONE, WEIGHT_TOTAL};
use sundial_core::error::MathError;
use sundial_core::types::Timestamp;

use crate::fixed::{rdiv, rln, rmul};

/// Implied yield-claim price for `time_to_expiry` out of a total `duration`.
///
/// Fixed point: `RONE` at issue (`ttm == duration`), `0` at expiry.
pub fn decay_price(time_to_expiry: u64, duration: u64) -> Result<u128, MathError> {
    if duration == 0 {
        return Err(MathError::DivisionByZero);
    }
    let ttm = (time_to_expiry as u128).min(duration as u128);
    let t_ratio = rdiv(ttm, duration as u128)?;
    let numer = rln(rmul(PI_FP, t_ratio)? + RONE, RONE)?;
    let denom = rln(PI_FP + RONE, RONE)?;
    rdiv(numer, denom)
}

/// Shift weight from the yield side to the base side as the price decays
/// from `price_last` to `price_now`. Preserves `w_yield + w_base` exactly
/// and floors `w_yield` at `MIN_POOL_WEIGHT`.
pub fn shift_weights(
    w_yield: u128,
    w_base: u128,
    price_now: u128,
    price_last: u128,
) -> Result<(u128, u128), MathError> {
    debug_assert_eq!(w_yield + w_base, WEIGHT_TOTAL);
    if price_now >= price_last || w_yield <= MIN_POOL_WEIGHT {
        return Ok((w_yield, w_base));
    }
    let r = rdiv(price_now, price_last)?;
    let numer = rmul(rmul(w_yield, w_base)?, RONE - r)?;
    let denom = rmul(r, w_yield)? + w_base;
    let mut theta = rdiv(numer, denom)?;
    if theta > w_yield - MIN_POOL_WEIGHT {
        theta = w_yield - MIN_POOL_WEIGHT;
    }
    Ok((w_yield - theta, w_base + theta))
}

/// Roll weights forward from `last_update` to `now` for a pool anchored at
/// `anchor` whose yield claim expires at `expiry`.
pub fn weights_at(
    w_yield: u128,
    w_base: u128,
    anchor: Timestamp,
    expiry: Timestamp,
    last_update: Timestamp,
    now: Timestamp,
) -> Result<(u128, u128), MathError> {
    if now <= last_update {
        return Ok((w_yield, w_base));
    }
    let duration = expiry.saturating_sub(anchor);
    let price_last = decay_price(expiry.saturating_sub(last_update), duration)?;
    let price_now = decay_price(expiry.saturating_sub(now), duration)?;
    shift_weights(w_yield, w_base, price_now, price_last)
}
