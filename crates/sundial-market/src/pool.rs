//! The pool engine.
//!
//! One `Market` owns one pool pairing a yield claim against a base token.
//! Weights are rolled forward from elapsed time at the top of every
//! mutating call, then the classical weighted constant-product formulas
//! price the request. The same prologue pulls the pool's accrued forge
//! interest into an income index so it lands with share holders, not with
//! whoever trades next.
//!
//! Market operations that move yield claims take the owning [`Forge`] by
//! `&mut` so claim transfers go through its settlement hooks. The host
//! serializes mutating calls, so the explicit borrow is the whole locking
//! story.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sundial_core::config::ProtocolConfig;
use sundial_core::constants::{
    INITIAL_POOL_SHARES, INITIAL_WEIGHT, MAX_IN_RATIO, MAX_OUT_RATIO, RONE,
};
use sundial_core::error::MarketError;
use sundial_core::traits::{Clock, PausingAuthority, TokenLedger};
use sundial_core::types::{
    AccountId, Amount, ContractKey, MarketId, PauseScope, Timestamp, TokenId,
};
use sundial_forge::Forge;
use sundial_math::curve::weights_at;
use sundial_math::fixed::{mul_div, rdiv, rmul};
use sundial_math::swap::{
    in_given_out, out_given_in, shares_given_single_in, single_out_given_shares,
};

/// Lifecycle of a pool as seen by callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolStatus {
    Unbootstrapped,
    Active,
    Expired,
    Locked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Yield,
    Base,
}

/// Reserves and weights; absent until `bootstrap`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
struct PoolState {
    yield_balance: Amount,
    base_balance: Amount,
    w_yield: u128,
    w_base: u128,
    /// Pool birth; fixes the decay curve's total duration together with the
    /// contract expiry.
    anchor: Timestamp,
    last_weight_update: Timestamp,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
struct EmergencyState {
    recipient: AccountId,
    withdrawn: bool,
}

pub struct Market {
    id: MarketId,
    /// The yield contract whose claim trades here.
    key: ContractKey,
    base_token: TokenId,
    /// Custody account for both reserves.
    vault: AccountId,
    config: ProtocolConfig,
    ledger: Arc<dyn TokenLedger>,
    authority: Arc<dyn PausingAuthority>,
    clock: Arc<dyn Clock>,
    state: Option<PoolState>,
    /// Cumulative interest per pool share, fixed-point.
    income_index: u128,
    /// Per-holder snapshot of `income_index` at last settlement.
    marks: HashMap<AccountId, u128>,
    /// Settled, not-yet-paid interest per holder.
    claimable: HashMap<AccountId, Amount>,
    emergency: Option<EmergencyState>,
}

impl Market {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MarketId,
        key: ContractKey,
        base_token: TokenId,
        vault: AccountId,
        config: ProtocolConfig,
        ledger: Arc<dyn TokenLedger>,
        authority: Arc<dyn PausingAuthority>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id,
            key,
            base_token,
            vault,
            config,
            ledger,
            authority,
            clock,
            state: None,
            income_index: 0,
            marks: HashMap::new(),
            claimable: HashMap::new(),
            emergency: None,
        }
    }

    pub fn id(&self) -> MarketId {
        self.id
    }

    pub fn key(&self) -> ContractKey {
        self.key
    }

    pub fn share_token(&self) -> TokenId {
        TokenId::PoolShare(self.id)
    }

    pub fn yield_token(&self) -> TokenId {
        TokenId::YieldClaim(self.key)
    }

    pub fn base_token(&self) -> TokenId {
        self.base_token
    }

    pub fn total_shares(&self) -> Amount {
        self.ledger.total_supply(self.share_token())
    }

    /// `(yield, base)` reserves; zero before bootstrap.
    pub fn reserves(&self) -> (Amount, Amount) {
        self.state
            .map(|s| (s.yield_balance, s.base_balance))
            .unwrap_or((0, 0))
    }

    /// `(yield, base)` weights as of the last update.
    pub fn weights(&self) -> (u128, u128) {
        self.state
            .map(|s| (s.w_yield, s.w_base))
            .unwrap_or((INITIAL_WEIGHT, INITIAL_WEIGHT))
    }

    pub fn status(&self) -> PoolStatus {
        if self.authority.is_locked(PauseScope::Market(self.id)) || self.emergency.is_some() {
            PoolStatus::Locked
        } else if self.state.is_none() {
            PoolStatus::Unbootstrapped
        } else if self.clock.now() >= self.key.expiry {
            PoolStatus::Expired
        } else {
            PoolStatus::Active
        }
    }

    /// Interest the holder could claim right now, including the unsettled
    /// portion since their last mark. Read-only.
    pub fn lp_interest_of(&self, account: AccountId) -> Amount {
        let settled = self.claimable.get(&account).copied().unwrap_or(0);
        let mark = self.marks.get(&account).copied().unwrap_or(0);
        if self.income_index <= mark {
            return settled;
        }
        let balance = self.ledger.balance_of(self.share_token(), account);
        settled + mul_div(balance, self.income_index - mark, RONE).unwrap_or(0)
    }

    // ---- bootstrap ----

    /// Seed both reserves and mint the fixed initial share supply.
    ///
    /// The supply is a constant rather than a function of the seed amounts,
    /// so rounding at zero supply cannot be gamed.
    pub fn bootstrap(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
        amount_yield: Amount,
        amount_base: Amount,
    ) -> Result<Amount, MarketError> {
        self.guard()?;
        if self.state.is_some() {
            return Err(MarketError::AlreadyBootstrapped);
        }
        let now = self.clock.now();
        if now >= self.key.expiry {
            return Err(MarketError::ContractExpired);
        }
        if amount_yield == 0 || amount_base == 0 {
            return Err(MarketError::ZeroAmount);
        }

        forge.transfer_yield(self.key, caller, self.vault, amount_yield)?;
        self.ledger.transfer(self.base_token, caller, self.vault, amount_base)?;
        self.ledger.mint(self.share_token(), caller, INITIAL_POOL_SHARES)?;

        self.state = Some(PoolState {
            yield_balance: amount_yield,
            base_balance: amount_base,
            w_yield: INITIAL_WEIGHT,
            w_base: INITIAL_WEIGHT,
            anchor: now,
            last_weight_update: now,
        });
        debug!(market = %self.id, %caller, amount_yield, amount_base, "pool bootstrapped");
        Ok(INITIAL_POOL_SHARES)
    }

    // ---- swaps ----

    /// Swap an exact input for the invariant-priced output.
    pub fn swap_exact_in(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
        token_in: TokenId,
        amount_in: Amount,
        min_out: Amount,
    ) -> Result<Amount, MarketError> {
        self.prologue(forge)?;
        if amount_in == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let side_in = self.side_of(token_in)?;
        let (b_in, w_in, b_out, w_out) = self.oriented(side_in)?;
        if amount_in > rmul(b_in, MAX_IN_RATIO)? {
            return Err(MarketError::TradeTooLarge);
        }
        let out = out_given_in(b_in, w_in, b_out, w_out, amount_in, self.config.fee_rate)?;
        if out < min_out {
            return Err(MarketError::SlippageExceeded);
        }
        if out == 0 {
            return Err(MarketError::ZeroAmount);
        }

        let cut = self.protocol_cut(amount_in)?;
        self.pull(forge, side_in, caller, amount_in)?;
        if cut > 0 {
            self.pay(forge, side_in, self.config.treasury, cut)?;
        }
        self.apply_swap(side_in, amount_in - cut, out)?;
        self.pay(forge, side_in.other(), caller, out)?;
        debug!(market = %self.id, %caller, %token_in, amount_in, out, "swap exact-in");
        Ok(out)
    }

    /// Swap the minimal invariant-priced input for an exact output.
    pub fn swap_exact_out(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
        token_out: TokenId,
        amount_out: Amount,
        max_in: Amount,
    ) -> Result<Amount, MarketError> {
        self.prologue(forge)?;
        if amount_out == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let side_out = self.side_of(token_out)?;
        let side_in = side_out.other();
        let (b_in, w_in, b_out, w_out) = self.oriented(side_in)?;
        if amount_out > rmul(b_out, MAX_OUT_RATIO)? {
            return Err(MarketError::TradeTooLarge);
        }
        let amount_in =
            in_given_out(b_in, w_in, b_out, w_out, amount_out, self.config.fee_rate)?;
        if amount_in > max_in {
            return Err(MarketError::SlippageExceeded);
        }
        if amount_in == 0 {
            return Err(MarketError::ZeroAmount);
        }

        let cut = self.protocol_cut(amount_in)?;
        self.pull(forge, side_in, caller, amount_in)?;
        if cut > 0 {
            self.pay(forge, side_in, self.config.treasury, cut)?;
        }
        self.apply_swap(side_in, amount_in - cut, amount_out)?;
        self.pay(forge, side_out, caller, amount_out)?;
        debug!(market = %self.id, %caller, %token_out, amount_in, amount_out, "swap exact-out");
        Ok(amount_in)
    }

    // ---- liquidity ----

    /// Proportional two-sided add. Returns `(shares, yield_used, base_used)`;
    /// the excess of whichever desired amount overshoots the pool ratio is
    /// left with the caller, never donated.
    pub fn add_liquidity_dual(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
        desired_yield: Amount,
        desired_base: Amount,
    ) -> Result<(Amount, Amount, Amount), MarketError> {
        self.prologue(forge)?;
        if desired_yield == 0 || desired_base == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let total = self.total_shares();
        let (b_y, b_b) = self.reserves();
        let by_yield = mul_div(desired_yield, total, b_y)?;
        let by_base = mul_div(desired_base, total, b_b)?;
        let shares = by_yield.min(by_base);
        if shares == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let ratio = rdiv(shares, total)?;
        let used_yield = rmul(ratio, b_y)?.min(desired_yield);
        let used_base = rmul(ratio, b_b)?.min(desired_base);

        self.settle_lp(caller)?;
        self.pull(forge, Side::Yield, caller, used_yield)?;
        self.pull(forge, Side::Base, caller, used_base)?;
        self.ledger.mint(self.share_token(), caller, shares)?;
        if let Some(s) = self.state.as_mut() {
            s.yield_balance += used_yield;
            s.base_balance += used_base;
        }
        debug!(market = %self.id, %caller, shares, used_yield, used_base, "dual add");
        Ok((shares, used_yield, used_base))
    }

    /// Proportional two-sided remove. Returns `(yield_out, base_out)`.
    pub fn remove_liquidity_dual(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
        shares: Amount,
        min_yield: Amount,
        min_base: Amount,
    ) -> Result<(Amount, Amount), MarketError> {
        self.prologue(forge)?;
        if shares == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let total = self.total_shares();
        if shares > total {
            return Err(MarketError::InsufficientLiquidity);
        }
        let (b_y, b_b) = self.reserves();
        let out_yield = mul_div(shares, b_y, total)?;
        let out_base = mul_div(shares, b_b, total)?;
        if out_yield < min_yield || out_base < min_base {
            return Err(MarketError::SlippageExceeded);
        }

        self.settle_lp(caller)?;
        self.ledger.burn(self.share_token(), caller, shares)?;
        if let Some(s) = self.state.as_mut() {
            s.yield_balance -= out_yield;
            s.base_balance -= out_base;
        }
        self.pay(forge, Side::Yield, caller, out_yield)?;
        self.pay(forge, Side::Base, caller, out_base)?;
        debug!(market = %self.id, %caller, shares, out_yield, out_base, "dual remove");
        Ok((out_yield, out_base))
    }

    /// One-sided add: an implicit swap-then-add priced in closed form, with
    /// the swap fee charged only on the implicitly swapped fraction.
    pub fn add_liquidity_single(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
        token_in: TokenId,
        amount_in: Amount,
        min_shares: Amount,
    ) -> Result<Amount, MarketError> {
        self.prologue(forge)?;
        if amount_in == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let side_in = self.side_of(token_in)?;
        let (b_in, w_in, _, _) = self.oriented(side_in)?;
        if amount_in > rmul(b_in, MAX_IN_RATIO)? {
            return Err(MarketError::TradeTooLarge);
        }
        let shares = shares_given_single_in(
            b_in,
            w_in,
            self.total_shares(),
            amount_in,
            self.config.fee_rate,
        )?;
        if shares < min_shares {
            return Err(MarketError::SlippageExceeded);
        }
        if shares == 0 {
            return Err(MarketError::ZeroAmount);
        }

        self.settle_lp(caller)?;
        self.pull(forge, side_in, caller, amount_in)?;
        self.ledger.mint(self.share_token(), caller, shares)?;
        self.credit(side_in, amount_in)?;
        debug!(market = %self.id, %caller, %token_in, amount_in, shares, "single add");
        Ok(shares)
    }

    /// One-sided remove: burn shares for one asset, fee on the implicitly
    /// swapped fraction.
    pub fn remove_liquidity_single(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
        token_out: TokenId,
        shares: Amount,
        min_out: Amount,
    ) -> Result<Amount, MarketError> {
        self.prologue(forge)?;
        if shares == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let side_out = self.side_of(token_out)?;
        let (b_out, w_out, _, _) = self.oriented(side_out)?;
        let out = single_out_given_shares(
            b_out,
            w_out,
            self.total_shares(),
            shares,
            self.config.fee_rate,
        )?;
        if out > rmul(b_out, MAX_OUT_RATIO)? {
            return Err(MarketError::TradeTooLarge);
        }
        if out < min_out {
            return Err(MarketError::SlippageExceeded);
        }

        self.settle_lp(caller)?;
        self.ledger.burn(self.share_token(), caller, shares)?;
        self.debit(side_out, out)?;
        self.pay(forge, side_out, caller, out)?;
        debug!(market = %self.id, %caller, %token_out, shares, out, "single remove");
        Ok(out)
    }

    // ---- LP interest ----

    /// Pay out the caller's settled share of checkpointed forge interest.
    pub fn redeem_lp_interest(
        &mut self,
        forge: &mut Forge,
        caller: AccountId,
    ) -> Result<Amount, MarketError> {
        self.prologue(forge)?;
        self.settle_lp(caller)?;
        let owed = self.claimable.remove(&caller).unwrap_or(0);
        if owed == 0 {
            return Ok(0);
        }
        self.ledger
            .transfer(self.yield_bearing_token(), self.vault, caller, owed)?;
        debug!(market = %self.id, %caller, owed, "lp interest paid");
        Ok(owed)
    }

    /// Move pool shares between holders. Shares carry a pro-rata right to
    /// checkpointed interest, so both marks are settled before the balance
    /// moves.
    pub fn transfer_shares(
        &mut self,
        forge: &mut Forge,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), MarketError> {
        self.prologue(forge)?;
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        self.settle_lp(from)?;
        self.settle_lp(to)?;
        self.ledger.transfer(self.share_token(), from, to, amount)?;
        Ok(())
    }

    // ---- emergency ----

    /// Arm the one-shot emergency withdrawal. Only valid once the pausing
    /// authority has locked the market and designated a recipient.
    pub fn set_emergency_mode(&mut self) -> Result<(), MarketError> {
        let scope = PauseScope::Market(self.id);
        if !self.authority.is_locked(scope) {
            return Err(MarketError::NotLocked);
        }
        let recipient = self
            .authority
            .emergency_recipient(scope)
            .ok_or(MarketError::NoEmergencyRecipient)?;
        self.emergency = Some(EmergencyState { recipient, withdrawn: false });
        warn!(market = %self.id, %recipient, "market emergency mode armed");
        Ok(())
    }

    /// Sweep both reserves to the designated recipient, once. Raw ledger
    /// moves: the escape hatch deliberately bypasses forge settlement.
    pub fn withdraw_emergency(&mut self) -> Result<(Amount, Amount), MarketError> {
        let em = self.emergency.as_mut().ok_or(MarketError::NoEmergencyRecipient)?;
        if em.withdrawn {
            return Err(MarketError::EmergencySpent);
        }
        em.withdrawn = true;
        let recipient = em.recipient;
        let (b_y, b_b) = self.reserves();
        if let Some(s) = self.state.as_mut() {
            s.yield_balance = 0;
            s.base_balance = 0;
        }
        if b_y > 0 {
            self.ledger.transfer(self.yield_token(), self.vault, recipient, b_y)?;
        }
        if b_b > 0 {
            self.ledger.transfer(self.base_token, self.vault, recipient, b_b)?;
        }
        warn!(market = %self.id, %recipient, b_y, b_b, "market emergency withdrawal");
        Ok((b_y, b_b))
    }

    // ---- internals ----

    /// Common entry for every post-bootstrap mutation: authority check,
    /// weight catch-up, interest checkpoint.
    fn prologue(&mut self, forge: &mut Forge) -> Result<(), MarketError> {
        self.guard()?;
        let now = self.clock.now();
        let expiry = self.key.expiry;
        {
            let state = self.state.as_mut().ok_or(MarketError::NotBootstrapped)?;
            if now >= expiry {
                return Err(MarketError::ContractExpired);
            }
            let (w_y, w_b) = weights_at(
                state.w_yield,
                state.w_base,
                state.anchor,
                expiry,
                state.last_weight_update,
                now,
            )?;
            state.w_yield = w_y;
            state.w_base = w_b;
            state.last_weight_update = now;
        }
        self.checkpoint_interest(forge)
    }

    fn guard(&self) -> Result<(), MarketError> {
        let scope = PauseScope::Market(self.id);
        if self.authority.is_locked(scope) || self.emergency.is_some() {
            return Err(MarketError::ContractLocked);
        }
        if self.authority.is_paused(scope) {
            return Err(MarketError::ContractPaused);
        }
        Ok(())
    }

    /// Pull the pool's accrued interest out of the forge and spread it over
    /// the current share supply.
    fn checkpoint_interest(&mut self, forge: &mut Forge) -> Result<(), MarketError> {
        let paid = forge.redeem_due_interest(self.key, self.vault)?;
        if paid > 0 {
            let total = self.total_shares();
            if total > 0 {
                self.income_index += mul_div(paid, RONE, total)?;
            }
        }
        Ok(())
    }

    /// Settle the holder's claimable interest up to the current index.
    /// Must run before any change to their share balance.
    fn settle_lp(&mut self, account: AccountId) -> Result<(), MarketError> {
        let mark = self.marks.get(&account).copied().unwrap_or(0);
        if self.income_index > mark {
            let balance = self.ledger.balance_of(self.share_token(), account);
            if balance > 0 {
                let owed = mul_div(balance, self.income_index - mark, RONE)?;
                *self.claimable.entry(account).or_default() += owed;
            }
        }
        self.marks.insert(account, self.income_index);
        Ok(())
    }

    fn side_of(&self, token: TokenId) -> Result<Side, MarketError> {
        if token == self.yield_token() {
            Ok(Side::Yield)
        } else if token == self.base_token {
            Ok(Side::Base)
        } else {
            Err(MarketError::UnknownToken)
        }
    }

    /// `(b_in, w_in, b_out, w_out)` with `side` as the input side.
    fn oriented(&self, side: Side) -> Result<(Amount, u128, Amount, u128), MarketError> {
        let s = self.state.as_ref().ok_or(MarketError::NotBootstrapped)?;
        Ok(match side {
            Side::Yield => (s.yield_balance, s.w_yield, s.base_balance, s.w_base),
            Side::Base => (s.base_balance, s.w_base, s.yield_balance, s.w_yield),
        })
    }

    fn apply_swap(
        &mut self,
        side_in: Side,
        credit_in: Amount,
        debit_out: Amount,
    ) -> Result<(), MarketError> {
        self.credit(side_in, credit_in)?;
        self.debit(side_in.other(), debit_out)
    }

    fn credit(&mut self, side: Side, amount: Amount) -> Result<(), MarketError> {
        let s = self.state.as_mut().ok_or(MarketError::NotBootstrapped)?;
        match side {
            Side::Yield => s.yield_balance += amount,
            Side::Base => s.base_balance += amount,
        }
        Ok(())
    }

    fn debit(&mut self, side: Side, amount: Amount) -> Result<(), MarketError> {
        let s = self.state.as_mut().ok_or(MarketError::NotBootstrapped)?;
        let balance = match side {
            Side::Yield => &mut s.yield_balance,
            Side::Base => &mut s.base_balance,
        };
        if *balance < amount {
            return Err(MarketError::InsufficientLiquidity);
        }
        *balance -= amount;
        Ok(())
    }

    /// Treasury slice of the swap fee, charged on the input amount.
    fn protocol_cut(&self, amount_in: Amount) -> Result<Amount, MarketError> {
        let fee = rmul(amount_in, self.config.fee_rate)?;
        Ok(rmul(fee, self.config.protocol_fee_share)?)
    }

    /// Move tokens into the vault; yield claims go through the forge so
    /// interest settles before the balance changes.
    fn pull(
        &self,
        forge: &mut Forge,
        side: Side,
        from: AccountId,
        amount: Amount,
    ) -> Result<(), MarketError> {
        match side {
            Side::Yield => forge.transfer_yield(self.key, from, self.vault, amount)?,
            Side::Base => self.ledger.transfer(self.base_token, from, self.vault, amount)?,
        }
        Ok(())
    }

    fn pay(
        &self,
        forge: &mut Forge,
        side: Side,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), MarketError> {
        match side {
            Side::Yield => forge.transfer_yield(self.key, self.vault, to, amount)?,
            Side::Base => self.ledger.transfer(self.base_token, self.vault, to, amount)?,
        }
        Ok(())
    }

    fn yield_bearing_token(&self) -> TokenId {
        TokenId::YieldBearing(self.key.asset)
    }
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::Yield => Side::Base,
            Side::Base => Side::Yield,
        }
    }
}
