//! The reward engine.
//!
//! Single-writer like the other engines: every mutating entry point checks
//! the pausing authority and accrues stake-units up to now before applying
//! the caller's effect. Epoch settlement is lazy and per-user: a staker's
//! finished epochs are converted into vesting installments the next time
//! they redeem, so no call ever iterates over other stakers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use sundial_core::config::ProtocolConfig;
use sundial_core::constants::{ALLOCATION_DENOMINATOR, GOVERNANCE_TIMELOCK};
use sundial_core::error::{LedgerError, RewardError};
use sundial_core::governance::Timelocked;
use sundial_core::traits::{Clock, PausingAuthority, TokenLedger};
use sundial_core::types::{AccountId, Amount, ContractKey, MarketId, PauseScope, Timestamp, TokenId};
use sundial_math::fixed::mul_div;

use crate::stake::{EmergencyState, EpochSchedule, ExpiryPool, UserStake};

pub struct RewardEngine {
    /// Custody account for staked shares and reward-token funding.
    vault: AccountId,
    config: ProtocolConfig,
    schedule: EpochSchedule,
    ledger: Arc<dyn TokenLedger>,
    authority: Arc<dyn PausingAuthority>,
    clock: Arc<dyn Clock>,
    pools: BTreeMap<ContractKey, ExpiryPool>,
    stakes: HashMap<(ContractKey, AccountId), UserStake>,
    /// Total reward funding per epoch, across all expiries.
    funding: BTreeMap<u64, Amount>,
    /// Per-expiry reward split, numerators over [`ALLOCATION_DENOMINATOR`].
    allocations: Timelocked<BTreeMap<ContractKey, u64>>,
    /// Allocation table pinned per funded epoch at its first settlement, so
    /// every staker of that epoch is paid from the same split.
    epoch_allocations: BTreeMap<u64, BTreeMap<ContractKey, u64>>,
    /// Per-account vesting queue: release epoch to unclaimed amount.
    vesting: HashMap<AccountId, BTreeMap<u64, Amount>>,
}

impl RewardEngine {
    pub fn new(
        vault: AccountId,
        config: ProtocolConfig,
        ledger: Arc<dyn TokenLedger>,
        authority: Arc<dyn PausingAuthority>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let schedule = EpochSchedule::new(config.start_time, config.epoch_duration);
        Self {
            vault,
            config,
            schedule,
            ledger,
            authority,
            clock,
            pools: BTreeMap::new(),
            stakes: HashMap::new(),
            funding: BTreeMap::new(),
            allocations: Timelocked::new(BTreeMap::new(), GOVERNANCE_TIMELOCK),
            epoch_allocations: BTreeMap::new(),
            vesting: HashMap::new(),
        }
    }

    pub fn vault(&self) -> AccountId {
        self.vault
    }

    pub fn schedule(&self) -> EpochSchedule {
        self.schedule
    }

    pub fn pool(&self, key: ContractKey) -> Option<&ExpiryPool> {
        self.pools.get(&key)
    }

    pub fn staked_balance(&self, key: ContractKey, account: AccountId) -> Amount {
        self.stakes
            .get(&(key, account))
            .map(|s| s.balance)
            .unwrap_or(0)
    }

    pub fn funding_for(&self, epoch: u64) -> Amount {
        self.funding.get(&epoch).copied().unwrap_or(0)
    }

    pub fn allocations(&self) -> &BTreeMap<ContractKey, u64> {
        self.allocations.current()
    }

    /// The account's stake-units in `epoch`, including accrual since their
    /// last checkpoint. Read-only.
    pub fn user_stake_units(&self, key: ContractKey, account: AccountId, epoch: u64) -> u128 {
        let Some(user) = self.stakes.get(&(key, account)) else {
            return 0;
        };
        let mut units = user.units_by_epoch.clone();
        self.schedule
            .accrue(&mut units, user.balance, user.last_updated, self.clock.now());
        units.get(&epoch).copied().unwrap_or(0)
    }

    /// Aggregate stake-units in `epoch`, including pending accrual.
    pub fn total_stake_units(&self, key: ContractKey, epoch: u64) -> u128 {
        let Some(pool) = self.pools.get(&key) else {
            return 0;
        };
        let mut units = pool.total_units_by_epoch.clone();
        self.schedule
            .accrue(&mut units, pool.total_staked, pool.last_updated, self.clock.now());
        units.get(&epoch).copied().unwrap_or(0)
    }

    /// Vested installments the account could redeem right now.
    pub fn claimable_vested(&self, account: AccountId) -> Amount {
        let current = self.schedule.epoch_of(self.clock.now());
        self.vesting
            .get(&account)
            .map(|q| q.range(..=current).map(|(_, v)| *v).sum())
            .unwrap_or(0)
    }

    // ---- registration ----

    /// Register a staking pool for one expiry's share token.
    pub fn register_pool(&mut self, key: ContractKey, market: MarketId) -> Result<(), RewardError> {
        if self.pools.contains_key(&key) {
            return Err(RewardError::DuplicatePool);
        }
        self.pools.insert(key, ExpiryPool::new(market, self.clock.now()));
        debug!(%key, %market, "staking pool registered");
        Ok(())
    }

    // ---- staking ----

    /// Stake pool shares. Allowed before the epoch schedule starts; units
    /// only accrue once it does.
    pub fn stake(
        &mut self,
        key: ContractKey,
        caller: AccountId,
        amount: Amount,
    ) -> Result<(), RewardError> {
        self.guard(key)?;
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let now = self.clock.now();
        self.accrue(key, caller, now)?;

        let pool = self.pools.get_mut(&key).ok_or(RewardError::UnknownPool)?;
        self.ledger.transfer(pool.share_token, caller, self.vault, amount)?;
        pool.total_staked += amount;
        if let Some(user) = self.stakes.get_mut(&(key, caller)) {
            user.balance += amount;
        }
        debug!(%key, %caller, amount, "staked");
        Ok(())
    }

    /// Withdraw staked shares after accruing units for the time they were
    /// held.
    pub fn withdraw(
        &mut self,
        key: ContractKey,
        caller: AccountId,
        amount: Amount,
    ) -> Result<(), RewardError> {
        self.guard(key)?;
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let now = self.clock.now();
        self.accrue(key, caller, now)?;

        let user = self
            .stakes
            .get_mut(&(key, caller))
            .filter(|u| u.balance >= amount)
            .ok_or(RewardError::Ledger(LedgerError::InsufficientBalance))?;
        user.balance -= amount;
        let pool = self.pools.get_mut(&key).ok_or(RewardError::UnknownPool)?;
        pool.total_staked -= amount;
        self.ledger.transfer(pool.share_token, self.vault, caller, amount)?;
        debug!(%key, %caller, amount, "withdrew stake");
        Ok(())
    }

    // ---- rewards ----

    /// Settle the caller's finished epochs into vesting installments, then
    /// pay every installment whose release epoch has arrived.
    pub fn redeem_rewards(
        &mut self,
        key: ContractKey,
        caller: AccountId,
    ) -> Result<Amount, RewardError> {
        self.guard(key)?;
        let now = self.clock.now();
        let current = self.schedule.epoch_of(now);
        self.accrue(key, caller, now)?;

        let vesting_epochs = self.config.vesting_epochs;
        let finished: Vec<u64> = self
            .stakes
            .get(&(key, caller))
            .map(|u| u.units_by_epoch.range(..current).map(|(e, _)| *e).collect())
            .unwrap_or_default();

        // A finished epoch is priced with the split that was current when
        // the epoch was first settled; later governance changes never
        // reprice it for stakers who redeem afterwards.
        for &e in &finished {
            if self.funding.get(&e).copied().unwrap_or(0) == 0 {
                continue;
            }
            if !self.epoch_allocations.contains_key(&e) {
                let table = self.allocations.current().clone();
                self.epoch_allocations.insert(e, table);
            }
        }

        let pool = self.pools.get(&key).ok_or(RewardError::UnknownPool)?;
        if let Some(user) = self.stakes.get_mut(&(key, caller)) {
            for e in finished {
                let user_units = user.units_by_epoch.remove(&e).unwrap_or(0);
                let total_units = pool.total_units_by_epoch.get(&e).copied().unwrap_or(0);
                let fund = self.funding.get(&e).copied().unwrap_or(0);
                let alloc = u128::from(
                    self.epoch_allocations
                        .get(&e)
                        .and_then(|t| t.get(&key))
                        .copied()
                        .unwrap_or(0),
                );
                if user_units == 0 || total_units == 0 || fund == 0 || alloc == 0 {
                    continue;
                }
                let pool_reward = mul_div(fund, alloc, u128::from(ALLOCATION_DENOMINATOR))?;
                let reward = mul_div(pool_reward, user_units, total_units)?;
                if reward == 0 {
                    continue;
                }
                // Equal installments; division dust rides on the first one.
                let per = reward / u128::from(vesting_epochs);
                let rem = reward % u128::from(vesting_epochs);
                let queue = self.vesting.entry(caller).or_default();
                for i in 1..=vesting_epochs {
                    let installment = if i == 1 { per + rem } else { per };
                    if installment > 0 {
                        *queue.entry(e + i).or_default() += installment;
                    }
                }
                debug!(%key, %caller, epoch = e, reward, "epoch reward vested");
            }
        }

        let mut payable: Amount = 0;
        if let Some(queue) = self.vesting.get_mut(&caller) {
            let due: Vec<u64> = queue.range(..=current).map(|(e, _)| *e).collect();
            for e in due {
                payable += queue.remove(&e).unwrap_or(0);
            }
        }
        if payable > 0 {
            self.ledger.transfer(TokenId::Reward, self.vault, caller, payable)?;
            debug!(%key, %caller, payable, "vested rewards paid");
        }
        Ok(payable)
    }

    /// Fund strictly-future epochs with reward tokens pulled from `funder`.
    pub fn top_up_rewards(
        &mut self,
        funder: AccountId,
        epoch_ids: &[u64],
        amounts: &[Amount],
    ) -> Result<(), RewardError> {
        if epoch_ids.len() != amounts.len() {
            return Err(RewardError::MismatchArrayLength);
        }
        let total: Amount = amounts.iter().sum();
        if total == 0 {
            return Err(RewardError::ZeroFund);
        }
        let now = self.clock.now();
        for &e in epoch_ids {
            if e == 0 || self.schedule.start_of(e) <= now {
                return Err(RewardError::InvalidEpochId);
            }
        }
        self.ledger.transfer(TokenId::Reward, funder, self.vault, total)?;
        for (&e, &a) in epoch_ids.iter().zip(amounts) {
            *self.funding.entry(e).or_default() += a;
        }
        debug!(%funder, total, "epoch funding topped up");
        Ok(())
    }

    // ---- allocation governance ----

    /// Propose a new per-expiry split. Numerators must cover only registered
    /// pools and sum to [`ALLOCATION_DENOMINATOR`]; the change applies after
    /// the governance timelock.
    pub fn propose_allocations(
        &mut self,
        alloc: BTreeMap<ContractKey, u64>,
    ) -> Result<(), RewardError> {
        let sum: u64 = alloc.values().sum();
        if sum != ALLOCATION_DENOMINATOR || !alloc.keys().all(|k| self.pools.contains_key(k)) {
            return Err(RewardError::BadAllocation);
        }
        let now = self.clock.now();
        self.allocations.propose(alloc, now)?;
        Ok(())
    }

    pub fn apply_allocations(&mut self) -> Result<(), RewardError> {
        let now = self.clock.now();
        self.allocations.apply(now)?;
        Ok(())
    }

    pub fn cancel_allocations(&mut self) -> Result<(), RewardError> {
        self.allocations.cancel()?;
        Ok(())
    }

    /// One-way: the current split can never change again.
    pub fn lock_allocations_permanently(&mut self) {
        self.allocations.lock_permanently();
    }

    // ---- emergency ----

    /// Arm the one-shot emergency withdrawal for a locked pool.
    pub fn set_emergency_mode(&mut self, key: ContractKey) -> Result<(), RewardError> {
        let pool = self.pools.get_mut(&key).ok_or(RewardError::UnknownPool)?;
        let scope = PauseScope::Rewards(pool.market);
        if !self.authority.is_locked(scope) {
            return Err(RewardError::NotLocked);
        }
        let recipient = self
            .authority
            .emergency_recipient(scope)
            .ok_or(RewardError::NoEmergencyRecipient)?;
        pool.emergency = Some(EmergencyState { recipient, withdrawn: false });
        warn!(%key, %recipient, "reward pool emergency mode armed");
        Ok(())
    }

    /// Sweep the pool's staked shares and the vault's reward balance to the
    /// designated recipient, once, bypassing stake accounting.
    pub fn withdraw_emergency(&mut self, key: ContractKey) -> Result<(Amount, Amount), RewardError> {
        let rewards = self.ledger.balance_of(TokenId::Reward, self.vault);
        let pool = self.pools.get_mut(&key).ok_or(RewardError::UnknownPool)?;
        let em = pool.emergency.as_mut().ok_or(RewardError::NoEmergencyRecipient)?;
        if em.withdrawn {
            return Err(RewardError::EmergencySpent);
        }
        em.withdrawn = true;
        let recipient = em.recipient;
        let shares = pool.total_staked;
        pool.total_staked = 0;
        if shares > 0 {
            self.ledger.transfer(pool.share_token, self.vault, recipient, shares)?;
        }
        if rewards > 0 {
            self.ledger.transfer(TokenId::Reward, self.vault, recipient, rewards)?;
        }
        warn!(%key, %recipient, shares, rewards, "reward pool emergency withdrawal");
        Ok((shares, rewards))
    }

    // ---- internals ----

    fn guard(&self, key: ContractKey) -> Result<(), RewardError> {
        let pool = self.pools.get(&key).ok_or(RewardError::UnknownPool)?;
        let scope = PauseScope::Rewards(pool.market);
        if self.authority.is_locked(scope) || pool.emergency.is_some() {
            return Err(RewardError::ContractLocked);
        }
        if self.authority.is_paused(scope) {
            return Err(RewardError::ContractPaused);
        }
        Ok(())
    }

    /// Bring the pool's and the account's unit buckets up to `now`.
    fn accrue(
        &mut self,
        key: ContractKey,
        account: AccountId,
        now: Timestamp,
    ) -> Result<(), RewardError> {
        let schedule = self.schedule;
        let pool = self.pools.get_mut(&key).ok_or(RewardError::UnknownPool)?;
        schedule.accrue(
            &mut pool.total_units_by_epoch,
            pool.total_staked,
            pool.last_updated,
            now,
        );
        pool.last_updated = now;
        let user = self.stakes.entry((key, account)).or_default();
        schedule.accrue(&mut user.units_by_epoch, user.balance, user.last_updated, now);
        user.last_updated = now;
        Ok(())
    }
}
