//! Epoch arithmetic and per-pool / per-staker state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sundial_core::types::{AccountId, Amount, MarketId, Timestamp, TokenId};

/// The fixed epoch grid.
///
/// Epochs are 1-based; any time before `start` is "epoch 0", during which
/// staking is allowed but no stake-units accrue.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochSchedule {
    start: Timestamp,
    duration: u64,
}

impl EpochSchedule {
    /// `duration` must be nonzero; validated configurations guarantee this.
    pub fn new(start: Timestamp, duration: u64) -> Self {
        debug_assert_ne!(duration, 0);
        Self { start, duration }
    }

    pub fn epoch_of(&self, t: Timestamp) -> u64 {
        if t < self.start {
            0
        } else {
            (t - self.start) / self.duration + 1
        }
    }

    /// First instant of epoch `e` (`e >= 1`).
    pub fn start_of(&self, e: u64) -> Timestamp {
        self.start.saturating_add((e - 1).saturating_mul(self.duration))
    }

    /// First instant after epoch `e`.
    pub fn end_of(&self, e: u64) -> Timestamp {
        self.start.saturating_add(e.saturating_mul(self.duration))
    }

    /// Accrue `balance * seconds` into the per-epoch unit buckets for the
    /// interval `[from, to)`, splitting at epoch boundaries. The pre-start
    /// portion of the interval earns nothing.
    pub fn accrue(
        &self,
        units: &mut BTreeMap<u64, u128>,
        balance: Amount,
        from: Timestamp,
        to: Timestamp,
    ) {
        let from = from.max(self.start);
        if balance == 0 || to <= from {
            return;
        }
        let mut cursor = from;
        while cursor < to {
            let e = self.epoch_of(cursor);
            let slice_end = self.end_of(e).min(to);
            *units.entry(e).or_default() += balance * u128::from(slice_end - cursor);
            cursor = slice_end;
        }
    }
}

/// One-shot escape hatch for a locked staking pool.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmergencyState {
    pub recipient: AccountId,
    pub withdrawn: bool,
}

/// Staking pool for one expiry's pool-share token.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ExpiryPool {
    /// The market whose shares stake here; also the pause scope.
    pub market: MarketId,
    pub share_token: TokenId,
    pub total_staked: Amount,
    pub last_updated: Timestamp,
    /// Aggregate stake-units per epoch, final once the epoch ends.
    pub total_units_by_epoch: BTreeMap<u64, u128>,
    pub emergency: Option<EmergencyState>,
}

impl ExpiryPool {
    pub fn new(market: MarketId, now: Timestamp) -> Self {
        Self {
            market,
            share_token: TokenId::PoolShare(market),
            total_staked: 0,
            last_updated: now,
            total_units_by_epoch: BTreeMap::new(),
            emergency: None,
        }
    }
}

/// One staker's balance and unit history in one pool.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UserStake {
    pub balance: Amount,
    pub last_updated: Timestamp,
    /// Entries are consumed when their epoch settles into vesting.
    pub units_by_epoch: BTreeMap<u64, u128>,
}
