//! Deployment configuration for fees and bid suggestions.

use crate::error::MarketError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upper bound on `currency_decimals`.
pub const MAX_CURRENCY_DECIMALS: u32 = 6;

/// Recognized marketplace options.
///
/// Every field has a default, so a deployment may override any subset.
/// Decimal fields are read as strings (`"0.05"`), matching how the rest of
/// the crate serializes money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Share of the gross amount retained by the platform, in `[0, 1)`.
    pub platform_fee_rate: Decimal,
    /// Added to the highest bid to suggest the next one.
    pub bid_increment_step: Decimal,
    /// Added to the base price to suggest an opening bid.
    pub initial_bid_premium: Decimal,
    /// Decimal places of the smallest currency unit (2 = paise).
    pub currency_decimals: u32,
    /// Only traders with an approved verification may bid.
    pub require_verified_bidders: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            platform_fee_rate: Decimal::new(3, 2),
            bid_increment_step: Decimal::from(50),
            initial_bid_premium: Decimal::from(100),
            currency_decimals: 2,
            require_verified_bidders: false,
        }
    }
}

impl MarketConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self, MarketError> {
        let config: MarketConfig = serde_json::from_str(json)
            .map_err(|e| MarketError::Config(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MarketError> {
        validate_fee_rate(self.platform_fee_rate)?;
        if self.bid_increment_step <= Decimal::ZERO {
            return Err(MarketError::Config(format!(
                "bid_increment_step must be positive, got {}",
                self.bid_increment_step
            )));
        }
        if self.initial_bid_premium <= Decimal::ZERO {
            return Err(MarketError::Config(format!(
                "initial_bid_premium must be positive, got {}",
                self.initial_bid_premium
            )));
        }
        if self.currency_decimals > MAX_CURRENCY_DECIMALS {
            return Err(MarketError::Config(format!(
                "currency_decimals must be at most {}, got {}",
                MAX_CURRENCY_DECIMALS, self.currency_decimals
            )));
        }
        Ok(())
    }

    pub fn increments(&self) -> BidIncrements {
        BidIncrements {
            step: self.bid_increment_step,
            initial_premium: self.initial_bid_premium,
        }
    }
}

/// The two constants the next-bid suggestion depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidIncrements {
    pub step: Decimal,
    pub initial_premium: Decimal,
}

impl Default for BidIncrements {
    fn default() -> Self {
        MarketConfig::default().increments()
    }
}

pub(crate) fn validate_fee_rate(rate: Decimal) -> Result<(), MarketError> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(MarketError::Config(format!(
            "platform_fee_rate must be in [0, 1), got {}",
            rate
        )));
    }
    Ok(())
}
