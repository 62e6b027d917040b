//! # sundial-rewards — the epoch reward engine.
//!
//! Stakes pool shares per expiry, accounts each staker's contribution to an
//! epoch as the time-integral of their balance over it, and distributes
//! epoch funding pro rata by those stake-units, weighted by governance-set
//! per-expiry allocations. Computed rewards vest in equal installments over
//! the following epochs.
//!
//! Epochs are implicit: there is no scheduler, every entry point derives
//! the current epoch from the clock and settles whatever it newly observes
//! as closed.

pub mod engine;
pub mod stake;

pub use engine::RewardEngine;
pub use stake::{EpochSchedule, ExpiryPool, UserStake};
