//! # sundial-forge — the Yield Splitting Forge.
//!
//! Splits an interest-bearing deposit into a principal claim and a
//! time-bounded yield claim per `(forge, asset, expiry)` contract, and
//! tracks per-holder accrued interest against the external yield index.
//!
//! Interest follows the token holder: claim transfers are forge entry
//! points that settle interest before the balance moves, never plain
//! ledger writes.

pub mod contract;
pub mod forge;

pub use contract::{UserYieldPosition, YieldContract};
pub use forge::Forge;
