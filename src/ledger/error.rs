use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::{
    account::{RequestId, RequestStatus},
    command::CommandError,
    store::StoreError,
};

/// Which participant of an operation could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Sender,
    Receiver,
    User,
    Agent,
    Requester,
    Request,
    Account,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Party::Sender => "Sender",
            Party::Receiver => "Receiver",
            Party::User => "User",
            Party::Agent => "Agent",
            Party::Requester => "Requester",
            Party::Request => "Request",
            Party::Account => "Account",
        };
        f.write_str(name)
    }
}

/// What happened to the already committed half of a paired mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Compensation {
    /// Nothing had been committed.
    NotNeeded,
    /// The committed half was reversed; balances are back to where they were.
    Applied,
    /// The reversal failed too; balances are inconsistent until an operator reconciles them.
    Failed,
}

impl Compensation {
    pub fn reconciliation_required(&self) -> bool {
        matches!(self, Compensation::Failed)
    }
}

/// Flat error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    AuthenticationFailed,
    InsufficientBalance,
    AlreadyResolved,
    InvalidCounterparty,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidAmount
            | ErrorKind::AuthenticationFailed
            | ErrorKind::InsufficientBalance
            | ErrorKind::AlreadyResolved
            | ErrorKind::InvalidCounterparty => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{which} not found")]
    NotFound { which: Party },
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] CommandError),
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
    #[error("Request {id} is already {status:?}")]
    AlreadyResolved { id: RequestId, status: RequestStatus },
    #[error("Sender and receiver must be different accounts")]
    InvalidCounterparty,
    #[error("Account with {field} `{value}` already exists")]
    Conflict { field: &'static str, value: String },
    #[error("Internal error: {detail} (compensation: {compensation:?})")]
    Internal {
        detail: String,
        compensation: Compensation,
    },
}

impl LedgerError {
    pub fn not_found(which: Party) -> Self {
        LedgerError::NotFound { which }
    }

    pub fn internal(detail: impl fmt::Display, compensation: Compensation) -> Self {
        LedgerError::Internal {
            detail: detail.to_string(),
            compensation,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            LedgerError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::AlreadyResolved { .. } => ErrorKind::AlreadyResolved,
            LedgerError::InvalidCounterparty => ErrorKind::InvalidCounterparty,
            LedgerError::Conflict { .. } => ErrorKind::Conflict,
            LedgerError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// What became of committed work, for failures that got as far as committing any.
    pub fn compensation(&self) -> Option<Compensation> {
        match self {
            LedgerError::Internal { compensation, .. } => Some(*compensation),
            _ => None,
        }
    }

    pub fn reconciliation_required(&self) -> bool {
        self.compensation()
            .is_some_and(|compensation| compensation.reconciliation_required())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field, value } => LedgerError::Conflict { field, value },
            err => LedgerError::internal(err, Compensation::NotNeeded),
        }
    }
}
