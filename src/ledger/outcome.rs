use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::{AccountId, PendingRequest, Transaction};

use super::error::{Compensation, ErrorKind, LedgerError};

/// Everything a successful operation wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub transactions: Vec<Transaction>,
    /// Balance of every touched account right after its mutation.
    pub new_balances: BTreeMap<AccountId, Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<PendingRequest>,
}

impl Outcome {
    pub fn balance(&self, account: &str) -> Option<Decimal> {
        self.new_balances.get(account).copied()
    }
}

/// Wire envelope: `{ok: true, transactions, newBalances}` or
/// `{ok: false, error, detail, compensation?, reconciliationRequired}`.
///
/// `compensation` is only present on internal failures: `notNeeded` when nothing was
/// committed, `applied` when committed work was reversed, `failed` otherwise.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub ok: bool,
    #[serde(flatten)]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation: Option<Compensation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation_required: Option<bool>,
}

impl OutcomeReport {
    pub fn http_status(&self) -> u16 {
        self.error.map_or(200, |kind| kind.http_status())
    }
}

impl From<Result<Outcome, LedgerError>> for OutcomeReport {
    fn from(result: Result<Outcome, LedgerError>) -> Self {
        match result {
            Ok(outcome) => OutcomeReport {
                ok: true,
                outcome: Some(outcome),
                error: None,
                detail: None,
                compensation: None,
                reconciliation_required: None,
            },
            Err(err) => OutcomeReport {
                ok: false,
                outcome: None,
                error: Some(err.kind()),
                detail: Some(err.to_string()),
                compensation: err.compensation(),
                reconciliation_required: Some(err.reconciliation_required()),
            },
        }
    }
}
