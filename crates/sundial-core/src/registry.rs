//! Keyed registry tables.
//!
//! Forges, market factories and markets are tracked as plain maps; callers
//! turn misses into their own error kinds. No dynamic dispatch lives here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AssetId, ContractKey, FactoryId, ForgeId, MarketId, Timestamp};

/// What a market trades: one yield claim against one base asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketRecord {
    pub yield_claim: ContractKey,
    pub base_asset: AssetId,
    pub factory: FactoryId,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Registry {
    contracts: BTreeMap<ContractKey, Timestamp>,
    factories: BTreeMap<(ForgeId, FactoryId), bool>,
    markets: BTreeMap<MarketId, MarketRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a yield contract. Returns false if the key already exists.
    pub fn insert_contract(&mut self, key: ContractKey, registered_at: Timestamp) -> bool {
        if self.contracts.contains_key(&key) {
            return false;
        }
        self.contracts.insert(key, registered_at);
        true
    }

    pub fn contains_contract(&self, key: &ContractKey) -> bool {
        self.contracts.contains_key(key)
    }

    pub fn set_factory_validity(&mut self, forge: ForgeId, factory: FactoryId, valid: bool) {
        self.factories.insert((forge, factory), valid);
    }

    pub fn is_valid_factory(&self, forge: ForgeId, factory: FactoryId) -> bool {
        *self.factories.get(&(forge, factory)).unwrap_or(&false)
    }

    /// Record a market. Returns false if the id is taken.
    pub fn insert_market(&mut self, id: MarketId, record: MarketRecord) -> bool {
        if self.markets.contains_key(&id) {
            return false;
        }
        self.markets.insert(id, record);
        true
    }

    pub fn market(&self, id: MarketId) -> Option<&MarketRecord> {
        self.markets.get(&id)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &ContractKey> {
        self.contracts.keys()
    }
}
