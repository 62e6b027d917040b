//! Weighted constant-product pricing.
//!
//! Classical two-asset weighted pool formulas with the swap fee taken from
//! the input side. Truncation always lands in the pool's favor: outputs
//! round down, required inputs round up.

use sundial_core::constants::{RONE, WEIGHT_TOTAL};
use sundial_core::error::MathError;
use sundial_core::types::Amount;

use crate::fixed::{rdiv, rmul, rpow};

/// Output amount for an exact-input swap.
///
/// `out = b_out * (1 - (b_in / (b_in + in*(1-fee)))^(w_in/w_out))`
pub fn out_given_in(
    b_in: Amount,
    w_in: u128,
    b_out: Amount,
    w_out: u128,
    amount_in: Amount,
    fee: u128,
) -> Result<Amount, MathError> {
    let weight_ratio = rdiv(w_in, w_out)?;
    let in_net = rmul(amount_in, RONE - fee)?;
    let ratio = rdiv(b_in, b_in.checked_add(in_net).ok_or(MathError::Overflow)?)?;
    let kept = rpow(ratio, weight_ratio)?;
    rmul(b_out, RONE.saturating_sub(kept))
}

/// Input amount required for an exact-output swap.
///
/// `in = b_in * ((b_out / (b_out - out))^(w_out/w_in) - 1) / (1-fee)`
pub fn in_given_out(
    b_in: Amount,
    w_in: u128,
    b_out: Amount,
    w_out: u128,
    amount_out: Amount,
    fee: u128,
) -> Result<Amount, MathError> {
    if amount_out >= b_out {
        return Err(MathError::Overflow);
    }
    let weight_ratio = rdiv(w_out, w_in)?;
    let ratio = rdiv(b_out, b_out - amount_out)?;
    let grown = rpow(ratio, weight_ratio)?;
    let in_gross = rmul(b_in, grown.saturating_sub(RONE))?;
    rdiv(in_gross, RONE - fee)
}

/// Shares minted for a single-sided deposit.
///
/// The fee applies only to the portion of the deposit that is implicitly
/// swapped, i.e. the non-weight fraction of the input.
pub fn shares_given_single_in(
    b_in: Amount,
    w_in: u128,
    total_shares: Amount,
    amount_in: Amount,
    fee: u128,
) -> Result<Amount, MathError> {
    let n_weight = rdiv(w_in, WEIGHT_TOTAL)?;
    let fee_portion = rmul(RONE - n_weight, fee)?;
    let in_after_fee = rmul(amount_in, RONE - fee_portion)?;
    let balance_updated = b_in.checked_add(in_after_fee).ok_or(MathError::Overflow)?;
    let in_ratio = rdiv(balance_updated, b_in)?;
    let share_ratio = rpow(in_ratio, n_weight)?;
    let supply_updated = rmul(share_ratio, total_shares)?;
    Ok(supply_updated.saturating_sub(total_shares))
}

/// Single-asset amount released for burning `shares_in` pool shares.
pub fn single_out_given_shares(
    b_out: Amount,
    w_out: u128,
    total_shares: Amount,
    shares_in: Amount,
    fee: u128,
) -> Result<Amount, MathError> {
    if shares_in >= total_shares {
        return Err(MathError::Overflow);
    }
    let n_weight = rdiv(w_out, WEIGHT_TOTAL)?;
    let supply_updated = total_shares - shares_in;
    let share_ratio = rdiv(supply_updated, total_shares)?;
    let out_ratio = rpow(share_ratio, rdiv(RONE, n_weight)?)?;
    let balance_updated = rmul(b_out, out_ratio)?;
    let before_fee = b_out.saturating_sub(balance_updated);
    let fee_portion = rmul(RONE - n_weight, fee)?;
    rmul(before_fee, RONE - fee_portion)
}
