//! # sundial-core
//! Foundation types and trait seams for the Sundial protocol.

pub mod config;
pub mod constants;
pub mod error;
pub mod governance;
pub mod ledger;
pub mod registry;
pub mod traits;
pub mod types;

pub use config::ProtocolConfig;
pub use error::SundialError;
pub use governance::Timelocked;
pub use ledger::MemoryLedger;
pub use registry::Registry;
pub use traits::{Clock, PausingAuthority, TokenLedger, YieldSourceAdapter};
pub use types::{
    AccountId, Amount, AssetId, ContractKey, FactoryId, ForgeId, MarketId, PauseScope, Timestamp,
    TokenId,
};
