//! Protocol configuration surface.
//!
//! Consumed at setup time; the engines read these values but never mutate
//! them outside the governance timelock.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_EPOCH_DURATION, DEFAULT_VESTING_EPOCHS, MAX_FEE_RATE, RONE,
};
use crate::error::ConfigError;
use crate::types::{AccountId, Timestamp};

/// All recognized protocol options.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Anchor of the reward epoch schedule.
    pub start_time: Timestamp,
    /// Seconds per reward epoch.
    pub epoch_duration: u64,
    /// Number of equal installments an epoch reward vests over.
    pub vesting_epochs: u64,
    /// Fraction of every swap input withheld as fee (fixed-point, RONE = 1).
    pub fee_rate: u128,
    /// Fraction of `fee_rate` routed to the treasury instead of the pool.
    pub protocol_fee_share: u128,
    /// Fraction of paid-out forge interest routed to the treasury.
    pub forge_fee_rate: u128,
    /// Recipient of protocol fee flow.
    pub treasury: AccountId,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            start_time: 0,
            epoch_duration: DEFAULT_EPOCH_DURATION,
            vesting_epochs: DEFAULT_VESTING_EPOCHS,
            // 0.35% swap fee, of which a fifth goes to the treasury.
            fee_rate: RONE * 35 / 10_000,
            protocol_fee_share: RONE / 5,
            // 1% of paid interest.
            forge_fee_rate: RONE / 100,
            treasury: AccountId(0),
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_duration == 0 {
            return Err(ConfigError::ZeroEpochDuration);
        }
        if self.vesting_epochs == 0 {
            return Err(ConfigError::ZeroVestingEpochs);
        }
        if self.fee_rate > MAX_FEE_RATE {
            return Err(ConfigError::FeeTooHigh(self.fee_rate));
        }
        if self.forge_fee_rate > MAX_FEE_RATE {
            return Err(ConfigError::FeeTooHigh(self.forge_fee_rate));
        }
        if self.protocol_fee_share > RONE {
            return Err(ConfigError::FeeShareTooHigh(self.protocol_fee_share));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ProtocolConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_epoch_duration() {
        let cfg = ProtocolConfig { epoch_duration: 0, ..Default::default() };
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::ZeroEpochDuration);
    }

    #[test]
    fn rejects_zero_vesting() {
        let cfg = ProtocolConfig { vesting_epochs: 0, ..Default::default() };
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::ZeroVestingEpochs);
    }

    #[test]
    fn rejects_excessive_fees() {
        let cfg = ProtocolConfig { fee_rate: MAX_FEE_RATE + 1, ..Default::default() };
        assert!(matches!(cfg.validate().unwrap_err(), ConfigError::FeeTooHigh(_)));

        let cfg = ProtocolConfig { protocol_fee_share: RONE + 1, ..Default::default() };
        assert!(matches!(cfg.validate().unwrap_err(), ConfigError::FeeShareTooHigh(_)));
    }

    #[test]
    fn roundtrips_through_json() {
        let cfg = ProtocolConfig { start_time: 1_700_000_000, ..Default::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ProtocolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
