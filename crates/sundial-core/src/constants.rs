//! Protocol constants.
//!
//! All fractional quantities (weights, indices, rates, fees) are fixed-point
//! with a 40-bit fractional part; `RONE` is 1.0 in that scale.

use crate::types::Amount;

/// Fractional bits of the protocol's fixed-point scale.
pub const PRECISION_BITS: u32 = 40;

/// 1.0 in fixed-point scale.
///
/// ```
/// use sundial_core::constants::{PRECISION_BITS, RONE};
/// assert_eq!(RONE, 1u128 << PRECISION_BITS);
/// ```
pub const RONE: u128 = 1 << PRECISION_BITS;

/// Raw units per whole token (12 decimals).
pub const UNIT: Amount = 1_000_000_000_000;

/// Pi in fixed-point scale; the curvature constant of the weight decay curve.
pub const PI_FP: u128 = RONE * 314 / 100;

/// Pool weights always sum to this.
///
/// ```
/// use sundial_core::constants::{INITIAL_WEIGHT, WEIGHT_TOTAL};
/// assert_eq!(INITIAL_WEIGHT * 2, WEIGHT_TOTAL);
/// ```
pub const WEIGHT_TOTAL: u128 = RONE;

/// Both sides start at half the total weight.
pub const INITIAL_WEIGHT: u128 = RONE / 2;

/// The yield-claim weight never decays below 2%.
pub const MIN_POOL_WEIGHT: u128 = RONE / 50;

/// A single swap may consume at most half of the input-side reserve.
pub const MAX_IN_RATIO: u128 = RONE / 2;

/// A single swap may drain at most a third of the output-side reserve.
pub const MAX_OUT_RATIO: u128 = RONE / 3;

/// Shares minted by `bootstrap`, independent of the seeded amounts.
///
/// A fixed initial supply avoids rounding exploits at zero supply.
pub const INITIAL_POOL_SHARES: Amount = 1_000 * UNIT;

/// Per-expiry reward allocation numerators must sum to this.
pub const ALLOCATION_DENOMINATOR: u64 = 1_000_000_000;

/// Default reward epoch length: one week.
pub const DEFAULT_EPOCH_DURATION: u64 = 7 * 24 * 60 * 60;

/// Default number of equal vesting installments per epoch reward.
pub const DEFAULT_VESTING_EPOCHS: u64 = 5;

/// Delay between proposing and applying a governance change.
pub const GOVERNANCE_TIMELOCK: u64 = 7 * 24 * 60 * 60;

/// Hard cap on any configured fee rate (10%).
pub const MAX_FEE_RATE: u128 = RONE / 10;
