//! Trait seams to the protocol's external collaborators.
//!
//! The engines never talk to a host ledger, yield source, pausing service
//! or wall clock directly; they hold `Arc<dyn ...>` handles to these traits.
//! All four traits are dyn-compatible and `Send + Sync`.

use crate::error::LedgerError;
use crate::types::{AccountId, Amount, AssetId, PauseScope, Timestamp, TokenId};

/// Fungible-token ledger with atomic debit/credit semantics.
///
/// Implementations use interior mutability; the engines only ever hold
/// shared references. Claim-token transfers do NOT go through this trait
/// directly — they are forge entry points, because interest must be settled
/// before the balance moves.
pub trait TokenLedger: Send + Sync {
    fn balance_of(&self, token: TokenId, account: AccountId) -> Amount;

    fn total_supply(&self, token: TokenId) -> Amount;

    fn transfer(
        &self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    fn mint(&self, token: TokenId, to: AccountId, amount: Amount) -> Result<(), LedgerError>;

    fn burn(&self, token: TokenId, from: AccountId, amount: Amount) -> Result<(), LedgerError>;

    fn approve(&self, token: TokenId, owner: AccountId, spender: AccountId, amount: Amount);

    fn allowance(&self, token: TokenId, owner: AccountId, spender: AccountId) -> Amount;

    /// Spend `amount` of `from`'s balance on behalf of `spender`.
    fn transfer_from(
        &self,
        token: TokenId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if spender != from {
            let allowed = self.allowance(token, from, spender);
            if allowed < amount {
                return Err(LedgerError::InsufficientAllowance);
            }
            self.approve(token, from, spender, allowed - amount);
        }
        self.transfer(token, from, to, amount)
    }
}

/// Reader for an external yield source's exchange rate.
///
/// `current_index` is fixed-point (`RONE` = 1.0), starts at `RONE` for a
/// fresh source and is expected to be monotonic non-decreasing per asset.
/// The forge clamps regressions rather than trusting this blindly.
pub trait YieldSourceAdapter: Send + Sync {
    fn current_index(&self, asset: AssetId) -> u128;

    /// The interest-bearing wrapper token the forge custodies for `asset`.
    fn yield_bearing_token_of(&self, asset: AssetId) -> TokenId {
        TokenId::YieldBearing(asset)
    }
}

/// Cross-cutting pause/lock switchboard, consulted before every mutation.
pub trait PausingAuthority: Send + Sync {
    /// Mutations in a paused scope fail but may be retried once unpaused.
    fn is_paused(&self, scope: PauseScope) -> bool;

    /// A locked scope only admits the emergency-withdrawal path.
    fn is_locked(&self, scope: PauseScope) -> bool;

    /// Where a locked scope's reserves may be swept, if designated.
    fn emergency_recipient(&self, scope: PauseScope) -> Option<AccountId>;
}

/// An authority that never pauses or locks anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuthority;

impl PausingAuthority for NoopAuthority {
    fn is_paused(&self, _scope: PauseScope) -> bool {
        false
    }

    fn is_locked(&self, _scope: PauseScope) -> bool {
        false
    }

    fn emergency_recipient(&self, _scope: PauseScope) -> Option<AccountId> {
        None
    }
}

/// Monotonic time source. Engines read it once at the top of each call.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}
