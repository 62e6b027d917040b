//! Core protocol types: identifiers, token identity, pause scopes.
//!
//! All token quantities are raw `u128` units (`UNIT` = 10^12 per whole
//! token). All timestamps are `u64` seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Raw token units.
pub type Amount = u128;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            Default,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

id_newtype!(
    /// An account on the host ledger.
    AccountId,
    "acct-"
);
id_newtype!(
    /// An underlying deposit asset.
    AssetId,
    "asset-"
);
id_newtype!(
    /// A forge kind (one per yield-source family: Aave-like, Compound-like, ...).
    ForgeId,
    "forge-"
);
id_newtype!(
    /// A market factory.
    FactoryId,
    "factory-"
);
id_newtype!(
    /// One AMM pool.
    MarketId,
    "market-"
);

/// The `(forge, asset, expiry)` triple anchoring one deposit/claim lifecycle.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct ContractKey {
    pub forge: ForgeId,
    pub asset: AssetId,
    pub expiry: Timestamp,
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/@{}", self.forge, self.asset, self.expiry)
    }
}

/// Typed token identity.
///
/// Claim and share tokens are derived from the state that issues them, so a
/// token id never needs a separate registry lookup to interpret.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum TokenId {
    /// The raw deposit asset (e.g. a stablecoin).
    Underlying(AssetId),
    /// The interest-bearing wrapper accepted by the forge.
    YieldBearing(AssetId),
    /// Principal claim for one yield contract, redeemable at/after expiry.
    Principal(ContractKey),
    /// Yield claim for one yield contract, tradable in the market.
    YieldClaim(ContractKey),
    /// Fungible share of one pool's reserves.
    PoolShare(MarketId),
    /// The protocol reward token distributed by the epoch engine.
    Reward,
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenId::Underlying(a) => write!(f, "und:{a}"),
            TokenId::YieldBearing(a) => write!(f, "yb:{a}"),
            TokenId::Principal(k) => write!(f, "pc:{k}"),
            TokenId::YieldClaim(k) => write!(f, "yc:{k}"),
            TokenId::PoolShare(m) => write!(f, "lp:{m}"),
            TokenId::Reward => write!(f, "reward"),
        }
    }
}

/// A pausable/lockable subsystem scope, consulted before every mutation.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum PauseScope {
    Forge(ContractKey),
    Market(MarketId),
    Rewards(MarketId),
}
