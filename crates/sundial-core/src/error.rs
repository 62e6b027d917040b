//! Error taxonomy.
//!
//! One enum per subsystem so callers can always tell "retry later"
//! (`ContractPaused`) from "never" (`ContractLocked`, `PermanentlyLocked`,
//! `InvalidExpiry`) from "adjust parameters" (`SlippageExceeded`,
//! `TradeTooLarge`). A failed call has no effect; nothing is queued or
//! retried inside the core.

use thiserror::Error;

/// Fixed-point arithmetic failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("exponential series did not converge")]
    NoConvergence,
    #[error("log argument below one")]
    LogOutOfRange,
}

/// Failures surfaced by the fungible-token ledger.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient allowance")]
    InsufficientAllowance,
}

/// Rejections from [`crate::config::ProtocolConfig::validate`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("epoch duration must be nonzero")]
    ZeroEpochDuration,
    #[error("vesting epoch count must be nonzero")]
    ZeroVestingEpochs,
    #[error("fee rate {0} exceeds the maximum")]
    FeeTooHigh(u128),
    #[error("protocol fee share {0} exceeds 1.0")]
    FeeShareTooHigh(u128),
}

/// Governance timelock failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("governance handle is permanently locked")]
    PermanentlyLocked,
    #[error("timelock has not elapsed")]
    TimelockNotElapsed,
    #[error("no pending change")]
    NoPendingChange,
    #[error("a change is already pending")]
    ChangePending,
}

/// Yield Splitting Forge failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeError {
    #[error("expiry is not in the future")]
    InvalidExpiry,
    #[error("yield contract already registered")]
    DuplicateContract,
    #[error("unknown yield contract")]
    UnknownContract,
    #[error("yield contract has expired")]
    ContractExpired,
    #[error("yield contract has not expired yet")]
    NotYetExpired,
    #[error("contract is paused")]
    ContractPaused,
    #[error("contract is locked")]
    ContractLocked,
    #[error("amount must be nonzero")]
    ZeroAmount,
    #[error("scope is not locked by the pausing authority")]
    NotLocked,
    #[error("no emergency recipient designated")]
    NoEmergencyRecipient,
    #[error("emergency reserve already withdrawn")]
    EmergencySpent,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Time-decaying AMM market failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketError {
    #[error("pool has not been bootstrapped")]
    NotBootstrapped,
    #[error("pool is already bootstrapped")]
    AlreadyBootstrapped,
    #[error("underlying yield claim has expired")]
    ContractExpired,
    #[error("market is paused")]
    ContractPaused,
    #[error("market is locked")]
    ContractLocked,
    #[error("computed amount violates the caller's bound")]
    SlippageExceeded,
    #[error("trade exceeds the per-call reserve ratio cap")]
    TradeTooLarge,
    #[error("amount must be nonzero")]
    ZeroAmount,
    #[error("token is not one of the pool's pair")]
    UnknownToken,
    #[error("operation would drain the pool")]
    InsufficientLiquidity,
    #[error("scope is not locked by the pausing authority")]
    NotLocked,
    #[error("no emergency recipient designated")]
    NoEmergencyRecipient,
    #[error("emergency reserve already withdrawn")]
    EmergencySpent,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Forge(#[from] ForgeError),
}

/// Epoch reward engine failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardError {
    #[error("epoch id does not start in the future")]
    InvalidEpochId,
    #[error("reward funding must be nonzero")]
    ZeroFund,
    #[error("epoch id and amount arrays differ in length")]
    MismatchArrayLength,
    #[error("allocation numerators do not sum to the denominator")]
    BadAllocation,
    #[error("no staking pool registered for this contract")]
    UnknownPool,
    #[error("staking pool already registered")]
    DuplicatePool,
    #[error("staking pool is paused")]
    ContractPaused,
    #[error("staking pool is locked")]
    ContractLocked,
    #[error("amount must be nonzero")]
    ZeroAmount,
    #[error("scope is not locked by the pausing authority")]
    NotLocked,
    #[error("no emergency recipient designated")]
    NoEmergencyRecipient,
    #[error("emergency reserve already withdrawn")]
    EmergencySpent,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

/// Umbrella error for callers driving more than one engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SundialError {
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Governance(#[from] GovernanceError),
    #[error(transparent)]
    Forge(#[from] ForgeError),
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Reward(#[from] RewardError),
}
