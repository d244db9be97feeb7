use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::Deserialize;
use thiserror::Error;

use crate::account::{AccountId, MobileNumber, RequestId};

/// Operation names accepted by the CSV operation script.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Send,
    Withdraw,
    CashIn,
    Approve,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveAction {
    Approve,
    Deny,
}

impl FromStr for ResolveAction {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(ResolveAction::Approve),
            "deny" | "denied" => Ok(ResolveAction::Deny),
            _ => Err(CommandError::UnknownAction {
                action: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount `{raw}` is not a number")]
    NotANumber { raw: String },
    #[error("Amount must be finite")]
    NotFinite,
    #[error("Amount must be positive, got {amount}")]
    NotPositive { amount: Decimal },
    #[error("Amount must not be negative, got {amount}")]
    Negative { amount: Decimal },
    #[error("Amount {amount} is too large, fees would overflow")]
    TooLarge { amount: Decimal },
    #[error("Unknown request action `{action}`")]
    UnknownAction { action: String },
}

/// Strictly positive monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(amount: Decimal) -> Result<Self, CommandError> {
        if amount > Decimal::ZERO {
            Ok(Amount(amount))
        } else {
            Err(CommandError::NotPositive { amount })
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let amount = Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| CommandError::NotANumber {
                raw: s.to_string(),
            })?;
        Amount::new(amount)
    }
}

impl TryFrom<f64> for Amount {
    type Error = CommandError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(CommandError::NotFinite);
        }
        let amount = Decimal::from_f64(value).ok_or(CommandError::NotFinite)?;
        Amount::new(amount)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub sender: AccountId,
    pub receiver_mobile: MobileNumber,
    pub amount: Amount,
    pub pin: String,
}

#[derive(Debug, Clone)]
pub struct WithdrawCommand {
    pub user: AccountId,
    pub agent_mobile: MobileNumber,
    pub amount: Amount,
    pub pin: String,
}

#[derive(Debug, Clone)]
pub struct CashInRequestCommand {
    pub user: AccountId,
    pub agent_mobile: MobileNumber,
    pub amount: Amount,
}

#[derive(Debug, Clone)]
pub struct ResolveRequestCommand {
    pub agent: AccountId,
    pub request_id: RequestId,
    pub requester_mobile: MobileNumber,
    pub amount: Amount,
    pub action: ResolveAction,
}
