//! Shared fixtures: a manual clock, a rebasing yield source, a scriptable
//! pausing authority, and a fully wired protocol instance.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use sundial_core::config::ProtocolConfig;
use sundial_core::constants::{ALLOCATION_DENOMINATOR, GOVERNANCE_TIMELOCK, RONE, UNIT};
use sundial_core::ledger::MemoryLedger;
use sundial_core::registry::{MarketRecord, Registry};
use sundial_core::traits::{Clock, PausingAuthority, TokenLedger, YieldSourceAdapter};
use sundial_core::types::{
    AccountId, Amount, AssetId, ContractKey, FactoryId, ForgeId, MarketId, PauseScope,
    Timestamp, TokenId,
};
use sundial_forge::Forge;
use sundial_market::Market;
use sundial_rewards::RewardEngine;

pub const ALICE: AccountId = AccountId(1);
pub const BOB: AccountId = AccountId(2);
pub const CAROL: AccountId = AccountId(3);
pub const TREASURY: AccountId = AccountId(9);
pub const FORGE_VAULT: AccountId = AccountId(10);
pub const MARKET_VAULT: AccountId = AccountId(11);
pub const REWARD_VAULT: AccountId = AccountId(12);
pub const FUNDER: AccountId = AccountId(13);

pub const ASSET: AssetId = AssetId(1);
pub const BASE_ASSET: AssetId = AssetId(2);
pub const MARKET: MarketId = MarketId(1);
pub const FACTORY: FactoryId = FactoryId(1);

/// Epoch schedule anchor; the fixture clock starts here.
pub const ANCHOR: Timestamp = 1_700_000_000;
pub const EPOCH: u64 = 7 * 24 * 3600;
/// Half a year of weekly epochs.
pub const EXPIRY: Timestamp = ANCHOR + 26 * EPOCH;

/// A clock the test sets by hand.
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn starting_at(t: Timestamp) -> Self {
        Self(AtomicU64::new(t))
    }

    pub fn set(&self, t: Timestamp) {
        self.0.store(t, Ordering::Relaxed);
    }

    pub fn advance(&self, dt: u64) {
        self.0.fetch_add(dt, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::Relaxed)
    }
}

/// A yield source whose index the test moves, minting the matching rebase
/// growth into the forge vault the way a rebasing wrapper token would.
pub struct RebasingSource {
    asset: AssetId,
    vault: AccountId,
    ledger: MemoryLedger,
    index: RwLock<u128>,
}

impl RebasingSource {
    pub fn new(asset: AssetId, vault: AccountId, ledger: MemoryLedger) -> Self {
        Self { asset, vault, ledger, index: RwLock::new(RONE) }
    }

    /// Raise the index; the vault's holdings grow proportionally.
    pub fn grow_to(&self, new_index: u128) {
        let old = *self.index.read();
        assert!(new_index >= old, "the test source never regresses by accident");
        let token = TokenId::YieldBearing(self.asset);
        let held = self.ledger.balance_of(token, self.vault);
        let growth = held * (new_index - old) / old;
        if growth > 0 {
            self.ledger.mint(token, self.vault, growth).unwrap();
        }
        *self.index.write() = new_index;
    }

    /// Force a raw index value without minting, to simulate a misbehaving
    /// source.
    pub fn force_index(&self, value: u128) {
        *self.index.write() = value;
    }
}

impl YieldSourceAdapter for RebasingSource {
    fn current_index(&self, _asset: AssetId) -> u128 {
        *self.index.read()
    }
}

/// Per-scope pause/lock switchboard the test flips directly.
#[derive(Default)]
pub struct SwitchAuthority {
    paused: RwLock<HashSet<PauseScope>>,
    locked: RwLock<HashSet<PauseScope>>,
    recipients: RwLock<HashMap<PauseScope, AccountId>>,
}

impl SwitchAuthority {
    pub fn pause(&self, scope: PauseScope) {
        self.paused.write().insert(scope);
    }

    pub fn unpause(&self, scope: PauseScope) {
        self.paused.write().remove(&scope);
    }

    pub fn lock(&self, scope: PauseScope, recipient: AccountId) {
        self.locked.write().insert(scope);
        self.recipients.write().insert(scope, recipient);
    }
}

impl PausingAuthority for SwitchAuthority {
    fn is_paused(&self, scope: PauseScope) -> bool {
        self.paused.read().contains(&scope)
    }

    fn is_locked(&self, scope: PauseScope) -> bool {
        self.locked.read().contains(&scope)
    }

    fn emergency_recipient(&self, scope: PauseScope) -> Option<AccountId> {
        self.recipients.read().get(&scope).copied()
    }
}

/// The whole protocol over one ledger: forge, market, reward engine and
/// registry, with Alice, Bob and Carol funded in both assets.
pub struct Protocol {
    pub ledger: MemoryLedger,
    pub clock: Arc<ManualClock>,
    pub source: Arc<RebasingSource>,
    pub authority: Arc<SwitchAuthority>,
    pub forge: Forge,
    pub market: Market,
    pub rewards: RewardEngine,
    pub registry: Registry,
    pub key: ContractKey,
}

impl Protocol {
    /// Wire everything up. The clock ends at `ANCHOR` with the full reward
    /// allocation already applied to the one registered expiry.
    pub fn new() -> Self {
        let ledger = MemoryLedger::new();
        let clock = Arc::new(ManualClock::starting_at(ANCHOR - 2 * GOVERNANCE_TIMELOCK));
        let source = Arc::new(RebasingSource::new(ASSET, FORGE_VAULT, ledger.clone()));
        let authority = Arc::new(SwitchAuthority::default());
        let config = ProtocolConfig {
            start_time: ANCHOR,
            epoch_duration: EPOCH,
            vesting_epochs: 5,
            forge_fee_rate: 0,
            treasury: TREASURY,
            ..Default::default()
        };

        let mut forge = Forge::new(
            ForgeId(1),
            FORGE_VAULT,
            config.clone(),
            Arc::new(ledger.clone()),
            source.clone(),
            authority.clone(),
            clock.clone(),
        );
        let key = forge.new_yield_contract(ASSET, EXPIRY).unwrap();

        let market = Market::new(
            MARKET,
            key,
            TokenId::Underlying(BASE_ASSET),
            MARKET_VAULT,
            config.clone(),
            Arc::new(ledger.clone()),
            authority.clone(),
            clock.clone(),
        );

        let mut rewards = RewardEngine::new(
            REWARD_VAULT,
            config,
            Arc::new(ledger.clone()),
            authority.clone(),
            clock.clone(),
        );
        rewards.register_pool(key, MARKET).unwrap();
        rewards
            .propose_allocations(BTreeMap::from([(key, ALLOCATION_DENOMINATOR)]))
            .unwrap();
        clock.advance(GOVERNANCE_TIMELOCK);
        rewards.apply_allocations().unwrap();

        let mut registry = Registry::new();
        assert!(registry.insert_contract(key, clock.now()));
        registry.set_factory_validity(ForgeId(1), FACTORY, true);
        assert!(registry.insert_market(
            MARKET,
            MarketRecord { yield_claim: key, base_asset: BASE_ASSET, factory: FACTORY },
        ));

        for who in [ALICE, BOB, CAROL] {
            ledger.mint(TokenId::YieldBearing(ASSET), who, 10_000 * UNIT).unwrap();
            ledger.mint(TokenId::Underlying(BASE_ASSET), who, 10_000 * UNIT).unwrap();
        }
        ledger.mint(TokenId::Reward, FUNDER, 10_000 * UNIT).unwrap();

        clock.set(ANCHOR);
        Self { ledger, clock, source, authority, forge, market, rewards, registry, key }
    }

    pub fn base_token(&self) -> TokenId {
        TokenId::Underlying(BASE_ASSET)
    }

    pub fn xyt(&self) -> TokenId {
        TokenId::YieldClaim(self.key)
    }

    pub fn yb(&self) -> TokenId {
        TokenId::YieldBearing(ASSET)
    }

    pub fn balance(&self, token: TokenId, who: AccountId) -> Amount {
        self.ledger.balance_of(token, who)
    }

    /// Tokenize for `who`, then bootstrap the pool from their claims.
    pub fn bootstrap_pool(&mut self, who: AccountId, yield_in: Amount, base_in: Amount) {
        self.forge.tokenize(self.key, yield_in, who, who).unwrap();
        self.market
            .bootstrap(&mut self.forge, who, yield_in, base_in)
            .unwrap();
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}
