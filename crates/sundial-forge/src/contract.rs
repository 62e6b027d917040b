//! Per-contract and per-holder forge state.

use serde::{Deserialize, Serialize};

use sundial_core::types::{AccountId, Amount, AssetId, Timestamp};

/// One `(forge, asset, expiry)` lifecycle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct YieldContract {
    pub asset: AssetId,
    pub expiry: Timestamp,
    /// Yield index snapshot at registration.
    pub index_at_issuance: u128,
    /// Highest index observed so far; frozen at the lock-in rate once the
    /// contract is seen at or past expiry.
    pub last_global_index: u128,
    /// Set by the first interaction at/after expiry.
    pub locked_in: bool,
    /// Outstanding yield-bearing deposits custodied for this contract.
    pub reserve: Amount,
    pub emergency: Option<EmergencyState>,
}

/// One-shot escape hatch for a locked contract.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmergencyState {
    pub recipient: AccountId,
    pub withdrawn: bool,
}

impl YieldContract {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expiry
    }
}

/// Per-holder claim balances and interest accrual.
///
/// The claim balances mirror the ledger; the forge is the only writer for
/// claim tokens so the mirror cannot drift.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserYieldPosition {
    pub principal_balance: Amount,
    pub yield_claim_balance: Amount,
    /// Zero until the first settlement touches the position.
    pub index_at_last_settlement: u128,
    pub unclaimed_interest: Amount,
}

impl UserYieldPosition {
    pub fn is_empty(&self) -> bool {
        self.principal_balance == 0
            && self.yield_claim_balance == 0
            && self.unclaimed_interest == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_boundary_is_inclusive() {
        let c = YieldContract {
            asset: AssetId(1),
            expiry: 100,
            index_at_issuance: 1,
            last_global_index: 1,
            locked_in: false,
            reserve: 0,
            emergency: None,
        };
        assert!(!c.is_expired(99));
        assert!(c.is_expired(100));
        assert!(c.is_expired(101));
    }

    #[test]
    fn fresh_position_is_empty() {
        assert!(UserYieldPosition::default().is_empty());
        let pos = UserYieldPosition { unclaimed_interest: 1, ..Default::default() };
        assert!(!pos.is_empty());
    }
}
