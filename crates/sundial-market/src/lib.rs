//! # sundial-market — the time-decaying AMM.
//!
//! A two-asset weighted constant-product pool trading a yield claim against
//! a base asset. Weights are recomputed from elapsed time on every call
//! (never stored as trade-driven state), shrinking the yield claim's weight
//! toward a floor as expiry approaches. Every mutating call also pulls the
//! pool's accrued forge interest into a per-share income index so liquidity
//! providers capture the yield.

pub mod pool;

pub use pool::{Market, PoolStatus};
