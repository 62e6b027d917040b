//! Reference in-memory fungible-token ledger.
//!
//! Implements [`TokenLedger`] over plain hash maps behind a
//! `parking_lot::RwLock`. Used by the test fixtures and by integrators who
//! do not bring a host ledger of their own.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::LedgerError;
use crate::traits::TokenLedger;
use crate::types::{AccountId, Amount, TokenId};

#[derive(Debug, Default)]
struct LedgerInner {
    balances: HashMap<(TokenId, AccountId), Amount>,
    supplies: HashMap<TokenId, Amount>,
    allowances: HashMap<(TokenId, AccountId, AccountId), Amount>,
}

/// Cloning yields another handle to the same ledger state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all balances of `token`; equals `total_supply` unless a caller
    /// bypassed mint/burn, so it only exists as a test aid.
    pub fn checked_supply(&self, token: TokenId) -> Amount {
        self.inner
            .read()
            .balances
            .iter()
            .filter(|((t, _), _)| *t == token)
            .map(|(_, v)| v)
            .sum()
    }
}

impl TokenLedger for MemoryLedger {
    fn balance_of(&self, token: TokenId, account: AccountId) -> Amount {
        *self.inner.read().balances.get(&(token, account)).unwrap_or(&0)
    }

    fn total_supply(&self, token: TokenId) -> Amount {
        *self.inner.read().supplies.get(&token).unwrap_or(&0)
    }

    fn transfer(
        &self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        let src = inner.balances.entry((token, from)).or_default();
        if *src < amount {
            return Err(LedgerError::InsufficientBalance);
        }
        *src -= amount;
        *inner.balances.entry((token, to)).or_default() += amount;
        Ok(())
    }

    fn mint(&self, token: TokenId, to: AccountId, amount: Amount) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        *inner.balances.entry((token, to)).or_default() += amount;
        *inner.supplies.entry(token).or_default() += amount;
        Ok(())
    }

    fn burn(&self, token: TokenId, from: AccountId, amount: Amount) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        let src = inner.balances.entry((token, from)).or_default();
        if *src < amount {
            return Err(LedgerError::InsufficientBalance);
        }
        *src -= amount;
        *inner.supplies.entry(token).or_default() -= amount;
        Ok(())
    }

    fn approve(&self, token: TokenId, owner: AccountId, spender: AccountId, amount: Amount) {
        self.inner
            .write()
            .allowances
            .insert((token, owner, spender), amount);
    }

    fn allowance(&self, token: TokenId, owner: AccountId, spender: AccountId) -> Amount {
        *self
            .inner
            .read()
            .allowances
            .get(&(token, owner, spender))
            .unwrap_or(&0)
    }
}
