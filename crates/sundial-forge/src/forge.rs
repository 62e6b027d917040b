//! The forge engine.
//!
//! Single-writer: every mutating entry point checks the pausing authority,
//! catches the yield index up to now (locking in the rate at expiry), and
//! settles the affected positions before applying the caller's effect. A
//! failed call leaves no partial state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use sundial_core::config::ProtocolConfig;
use sundial_core::error::ForgeError;
use sundial_core::traits::{Clock, PausingAuthority, TokenLedger, YieldSourceAdapter};
use sundial_core::types::{
    AccountId, Amount, AssetId, ContractKey, ForgeId, PauseScope, Timestamp, TokenId,
};
use sundial_math::fixed::{mul_div, rmul};

use crate::contract::{EmergencyState, UserYieldPosition, YieldContract};

pub struct Forge {
    id: ForgeId,
    /// Custody account for yield-bearing deposits.
    vault: AccountId,
    config: ProtocolConfig,
    ledger: Arc<dyn TokenLedger>,
    adapter: Arc<dyn YieldSourceAdapter>,
    authority: Arc<dyn PausingAuthority>,
    clock: Arc<dyn Clock>,
    contracts: BTreeMap<ContractKey, YieldContract>,
    positions: HashMap<(ContractKey, AccountId), UserYieldPosition>,
}

impl Forge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ForgeId,
        vault: AccountId,
        config: ProtocolConfig,
        ledger: Arc<dyn TokenLedger>,
        adapter: Arc<dyn YieldSourceAdapter>,
        authority: Arc<dyn PausingAuthority>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id,
            vault,
            config,
            ledger,
            adapter,
            authority,
            clock,
            contracts: BTreeMap::new(),
            positions: HashMap::new(),
        }
    }

    pub fn id(&self) -> ForgeId {
        self.id
    }

    pub fn vault(&self) -> AccountId {
        self.vault
    }

    pub fn contract(&self, key: ContractKey) -> Option<&YieldContract> {
        self.contracts.get(&key)
    }

    pub fn position(&self, key: ContractKey, account: AccountId) -> Option<&UserYieldPosition> {
        self.positions.get(&(key, account))
    }

    /// Interest the account could claim right now, including unsettled
    /// accrual since its last settlement. Read-only.
    pub fn due_interest(&self, key: ContractKey, account: AccountId) -> Amount {
        let Some(contract) = self.contracts.get(&key) else {
            return 0;
        };
        let Some(pos) = self.positions.get(&(key, account)) else {
            return 0;
        };
        let index = if contract.locked_in {
            contract.last_global_index
        } else {
            contract
                .last_global_index
                .max(self.adapter.current_index(contract.asset))
        };
        let mut due = pos.unclaimed_interest;
        if pos.index_at_last_settlement != 0 && index > pos.index_at_last_settlement {
            due += mul_div(
                pos.yield_claim_balance,
                index - pos.index_at_last_settlement,
                pos.index_at_last_settlement,
            )
            .unwrap_or(0);
        }
        due
    }

    // ---- registration ----

    /// Register a new `(asset, expiry)` contract under this forge.
    pub fn new_yield_contract(
        &mut self,
        asset: AssetId,
        expiry: Timestamp,
    ) -> Result<ContractKey, ForgeError> {
        let now = self.clock.now();
        if expiry <= now {
            return Err(ForgeError::InvalidExpiry);
        }
        let key = ContractKey { forge: self.id, asset, expiry };
        if self.contracts.contains_key(&key) {
            return Err(ForgeError::DuplicateContract);
        }
        let index = self.adapter.current_index(asset);
        self.contracts.insert(
            key,
            YieldContract {
                asset,
                expiry,
                index_at_issuance: index,
                last_global_index: index,
                locked_in: false,
                reserve: 0,
                emergency: None,
            },
        );
        debug!(%key, index, "registered yield contract");
        Ok(key)
    }

    // ---- deposit / redemption ----

    /// Split `amount` of the yield-bearing deposit into equal principal and
    /// yield claims for `recipient`.
    pub fn tokenize(
        &mut self,
        key: ContractKey,
        amount: Amount,
        from: AccountId,
        recipient: AccountId,
    ) -> Result<(Amount, Amount), ForgeError> {
        self.guard(key)?;
        self.require_unexpired(key)?;
        if amount == 0 {
            return Err(ForgeError::ZeroAmount);
        }
        let index = self.refresh_index(key)?;
        // New and old principal must never share a stale index.
        self.settle_at(key, recipient, index)?;

        let yb = self.yield_bearing_token(key);
        self.ledger.transfer(yb, from, self.vault, amount)?;
        self.ledger.mint(TokenId::Principal(key), recipient, amount)?;
        self.ledger.mint(TokenId::YieldClaim(key), recipient, amount)?;

        let pos = self.positions.entry((key, recipient)).or_default();
        pos.principal_balance += amount;
        pos.yield_claim_balance += amount;
        if let Some(c) = self.contracts.get_mut(&key) {
            c.reserve += amount;
        }
        debug!(%key, %recipient, amount, "tokenized");
        Ok((amount, amount))
    }

    /// Burn equal claims and return the deposit plus the interest settled
    /// against the current index, net of the forge fee, in one payout.
    pub fn redeem_underlying(
        &mut self,
        key: ContractKey,
        amount: Amount,
        caller: AccountId,
        recipient: AccountId,
    ) -> Result<Amount, ForgeError> {
        self.guard(key)?;
        self.require_unexpired(key)?;
        if amount == 0 {
            return Err(ForgeError::ZeroAmount);
        }
        let index = self.refresh_index(key)?;
        self.settle_at(key, caller, index)?;

        let pos = self.positions.entry((key, caller)).or_default();
        if pos.principal_balance < amount || pos.yield_claim_balance < amount {
            return Err(ForgeError::Ledger(
                sundial_core::error::LedgerError::InsufficientBalance,
            ));
        }
        pos.principal_balance -= amount;
        pos.yield_claim_balance -= amount;
        let interest = pos.unclaimed_interest;
        pos.unclaimed_interest = 0;

        self.ledger.burn(TokenId::Principal(key), caller, amount)?;
        self.ledger.burn(TokenId::YieldClaim(key), caller, amount)?;
        if let Some(c) = self.contracts.get_mut(&key) {
            c.reserve = c.reserve.saturating_sub(amount);
        }
        let fee = rmul(interest, self.config.forge_fee_rate)?;
        let payout = amount + interest - fee;
        let yb = self.yield_bearing_token(key);
        if fee > 0 {
            self.ledger.transfer(yb, self.vault, self.config.treasury, fee)?;
        }
        self.ledger.transfer(yb, self.vault, recipient, payout)?;
        debug!(%key, %caller, amount, interest, "redeemed underlying");
        Ok(payout)
    }

    /// Settle and pay out the account's accrued interest, net of the forge
    /// fee. Claim balances are untouched.
    pub fn redeem_due_interest(
        &mut self,
        key: ContractKey,
        account: AccountId,
    ) -> Result<Amount, ForgeError> {
        self.guard(key)?;
        self.require_unexpired(key)?;
        let index = self.refresh_index(key)?;
        self.settle_at(key, account, index)?;
        self.pay_interest(key, account)
    }

    /// Post-expiry exit: burn remaining claims and pay principal at the
    /// lock-in rate plus interest accrued up to lock-in.
    pub fn redeem_after_expiry(
        &mut self,
        key: ContractKey,
        caller: AccountId,
        recipient: AccountId,
    ) -> Result<Amount, ForgeError> {
        self.guard(key)?;
        let now = self.clock.now();
        let contract = self.contracts.get(&key).ok_or(ForgeError::UnknownContract)?;
        if !contract.is_expired(now) {
            return Err(ForgeError::NotYetExpired);
        }
        let index = self.refresh_index(key)?;
        self.settle_at(key, caller, index)?;

        let pos = self.positions.remove(&(key, caller)).unwrap_or_default();
        if pos.is_empty() {
            return Ok(0);
        }
        if pos.principal_balance > 0 {
            self.ledger.burn(TokenId::Principal(key), caller, pos.principal_balance)?;
        }
        if pos.yield_claim_balance > 0 {
            self.ledger.burn(TokenId::YieldClaim(key), caller, pos.yield_claim_balance)?;
        }

        let fee = rmul(pos.unclaimed_interest, self.config.forge_fee_rate)?;
        let payout = pos.principal_balance + pos.unclaimed_interest - fee;
        if let Some(c) = self.contracts.get_mut(&key) {
            c.reserve = c.reserve.saturating_sub(pos.principal_balance);
        }
        let yb = self.yield_bearing_token(key);
        if fee > 0 {
            self.ledger.transfer(yb, self.vault, self.config.treasury, fee)?;
        }
        if payout > 0 {
            self.ledger.transfer(yb, self.vault, recipient, payout)?;
        }
        debug!(%key, %caller, payout, "redeemed after expiry");
        Ok(payout)
    }

    // ---- claim transfers (settlement hooks) ----

    /// Move principal claims. Settles the sender first; the receiver's
    /// position is created with a fresh settlement index if absent.
    pub fn transfer_principal(
        &mut self,
        key: ContractKey,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), ForgeError> {
        self.transfer_claim(key, from, to, amount, false)
    }

    /// Move yield claims. Interest follows the holder, so both sides are
    /// settled before the balance changes hands.
    pub fn transfer_yield(
        &mut self,
        key: ContractKey,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), ForgeError> {
        self.transfer_claim(key, from, to, amount, true)
    }

    fn transfer_claim(
        &mut self,
        key: ContractKey,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        yield_claim: bool,
    ) -> Result<(), ForgeError> {
        self.guard(key)?;
        self.require_unexpired(key)?;
        if amount == 0 {
            return Err(ForgeError::ZeroAmount);
        }
        let index = self.refresh_index(key)?;
        self.settle_at(key, from, index)?;
        self.settle_at(key, to, index)?;

        let token = if yield_claim {
            TokenId::YieldClaim(key)
        } else {
            TokenId::Principal(key)
        };
        {
            let pos = self.positions.entry((key, from)).or_default();
            let balance = if yield_claim {
                &mut pos.yield_claim_balance
            } else {
                &mut pos.principal_balance
            };
            if *balance < amount {
                return Err(ForgeError::Ledger(
                    sundial_core::error::LedgerError::InsufficientBalance,
                ));
            }
            *balance -= amount;
        }
        self.ledger.transfer(token, from, to, amount)?;
        let pos = self.positions.entry((key, to)).or_default();
        if yield_claim {
            pos.yield_claim_balance += amount;
        } else {
            pos.principal_balance += amount;
        }
        Ok(())
    }

    // ---- emergency ----

    /// Arm the one-shot emergency withdrawal. Only valid once the pausing
    /// authority has locked the scope and designated a recipient.
    pub fn set_emergency_mode(&mut self, key: ContractKey) -> Result<(), ForgeError> {
        let scope = PauseScope::Forge(key);
        if !self.authority.is_locked(scope) {
            return Err(ForgeError::NotLocked);
        }
        let recipient = self
            .authority
            .emergency_recipient(scope)
            .ok_or(ForgeError::NoEmergencyRecipient)?;
        let contract = self.contracts.get_mut(&key).ok_or(ForgeError::UnknownContract)?;
        contract.emergency = Some(EmergencyState { recipient, withdrawn: false });
        warn!(%key, %recipient, "forge emergency mode armed");
        Ok(())
    }

    /// Sweep the contract's reserve to the designated recipient, once.
    pub fn withdraw_emergency(&mut self, key: ContractKey) -> Result<Amount, ForgeError> {
        let yb = self.yield_bearing_token(key);
        let vault = self.vault;
        let available = self.ledger.balance_of(yb, vault);
        let contract = self.contracts.get_mut(&key).ok_or(ForgeError::UnknownContract)?;
        let em = contract.emergency.as_mut().ok_or(ForgeError::NoEmergencyRecipient)?;
        if em.withdrawn {
            return Err(ForgeError::EmergencySpent);
        }
        em.withdrawn = true;
        let amount = contract.reserve.min(available);
        contract.reserve = 0;
        let recipient = em.recipient;
        self.ledger.transfer(yb, vault, recipient, amount)?;
        warn!(%key, %recipient, amount, "forge emergency withdrawal");
        Ok(amount)
    }

    // ---- internals ----

    fn yield_bearing_token(&self, key: ContractKey) -> TokenId {
        self.adapter.yield_bearing_token_of(key.asset)
    }

    fn guard(&self, key: ContractKey) -> Result<(), ForgeError> {
        let scope = PauseScope::Forge(key);
        if self.authority.is_locked(scope) {
            return Err(ForgeError::ContractLocked);
        }
        if self.authority.is_paused(scope) {
            return Err(ForgeError::ContractPaused);
        }
        if let Some(c) = self.contracts.get(&key) {
            if c.emergency.is_some() {
                return Err(ForgeError::ContractLocked);
            }
        }
        Ok(())
    }

    fn require_unexpired(&self, key: ContractKey) -> Result<(), ForgeError> {
        let contract = self.contracts.get(&key).ok_or(ForgeError::UnknownContract)?;
        if contract.is_expired(self.clock.now()) {
            return Err(ForgeError::ContractExpired);
        }
        Ok(())
    }

    /// Catch the contract's global index up to now. The index only moves
    /// up: a regressing adapter read is clamped and logged. The first call
    /// at/after expiry freezes the lock-in rate.
    fn refresh_index(&mut self, key: ContractKey) -> Result<u128, ForgeError> {
        let now = self.clock.now();
        let contract = self.contracts.get_mut(&key).ok_or(ForgeError::UnknownContract)?;
        if contract.locked_in {
            return Ok(contract.last_global_index);
        }
        let observed = self.adapter.current_index(contract.asset);
        if observed < contract.last_global_index {
            warn!(
                %key,
                observed,
                stored = contract.last_global_index,
                "yield index regressed; clamping"
            );
        } else {
            contract.last_global_index = observed;
        }
        if contract.is_expired(now) {
            contract.locked_in = true;
            debug!(%key, index = contract.last_global_index, "lock-in rate frozen");
        }
        Ok(contract.last_global_index)
    }

    /// Accrue interest on the position's yield-claim balance up to `index`.
    fn settle_at(
        &mut self,
        key: ContractKey,
        account: AccountId,
        index: u128,
    ) -> Result<(), ForgeError> {
        let pos = self.positions.entry((key, account)).or_default();
        if pos.index_at_last_settlement == 0 {
            pos.index_at_last_settlement = index;
            return Ok(());
        }
        if index > pos.index_at_last_settlement {
            let accrued = mul_div(
                pos.yield_claim_balance,
                index - pos.index_at_last_settlement,
                pos.index_at_last_settlement,
            )?;
            pos.unclaimed_interest += accrued;
            pos.index_at_last_settlement = index;
        }
        Ok(())
    }

    /// Pay out settled interest, net of the forge fee.
    fn pay_interest(&mut self, key: ContractKey, account: AccountId) -> Result<Amount, ForgeError> {
        let Some(pos) = self.positions.get_mut(&(key, account)) else {
            return Ok(0);
        };
        let interest = pos.unclaimed_interest;
        if interest == 0 {
            return Ok(0);
        }
        pos.unclaimed_interest = 0;
        let fee = rmul(interest, self.config.forge_fee_rate)?;
        let yb = self.yield_bearing_token(key);
        if fee > 0 {
            self.ledger.transfer(yb, self.vault, self.config.treasury, fee)?;
        }
        let paid = interest - fee;
        self.ledger.transfer(yb, self.vault, account, paid)?;
        debug!(%key, %account, paid, fee, "interest paid");
        Ok(paid)
    }
}
