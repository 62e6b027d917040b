//! # sundial-math — fixed-point kernel and AMM formulas.
//!
//! All calculations use integer arithmetic only for determinism:
//! - **40-bit fixed point** (`RONE = 1 << 40`): multiply, divide, log2
//!   ladder, natural log and fractional powers, all checked.
//! - **Weight decay curve**: the time-only function that shifts pool weight
//!   away from the yield claim as expiry approaches.
//! - **Weighted constant-product formulas**: swap in/out pricing and
//!   single-sided liquidity joins/exits, fee on the input side.
//!
//! Pure functions, no state; every fallible operation returns
//! `Result<_, MathError>`.

pub mod curve;
pub mod fixed;
pub mod swap;

pub use curve::{decay_price, shift_weights, weights_at};
pub use fixed::{mul_div, rdiv, rln, rmul, rpow};
