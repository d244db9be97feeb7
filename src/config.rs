use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use argon2::Params;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

/// Fees charged by the engine.
///
/// Transfers pay a flat fee once the amount exceeds a threshold; withdrawals pay a
/// percentage of the amount, which goes to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Transfers strictly above this amount pay `transfer_fee`.
    pub transfer_fee_threshold: Decimal,
    pub transfer_fee: Decimal,
    pub withdraw_rate: Decimal,
    /// Decimal places fees are rounded to (half away from zero). `None` keeps them exact.
    pub round_dp: Option<u32>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            transfer_fee_threshold: Decimal::from(100),
            transfer_fee: Decimal::from(5),
            withdraw_rate: Decimal::new(15, 3),
            round_dp: None,
        }
    }
}

impl FeeSchedule {
    pub fn transfer_fee(&self, amount: Decimal) -> Decimal {
        if amount > self.transfer_fee_threshold {
            self.round(self.transfer_fee)
        } else {
            Decimal::ZERO
        }
    }

    /// `None` when the fee does not fit in a [`Decimal`].
    pub fn withdraw_fee(&self, amount: Decimal) -> Option<Decimal> {
        amount
            .checked_mul(self.withdraw_rate)
            .map(|fee| self.round(fee))
    }

    fn round(&self, fee: Decimal) -> Decimal {
        match self.round_dp {
            Some(dp) => fee.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
            None => fee.normalize(),
        }
    }
}

/// Argon2id cost parameters for PIN hashes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PinConfig {
    pub fn params(&self) -> Result<Params, argon2::Error> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub fees: FeeSchedule,
    pub pin: PinConfig,
}

impl FromStr for LedgerConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: LedgerConfig = toml::from_str(s).context("Invalid ledger configuration")?;
        config
            .pin
            .params()
            .map_err(|err| anyhow!("Invalid pin hashing parameters: {err}"))?;
        Ok(config)
    }
}

impl LedgerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config `{}`", path.display()))?;
        raw.parse()
    }
}
