use rust_decimal::Decimal;
use thiserror::Error;

use crate::account::{Account, PendingRequest, RequestId, RequestStatus, Transaction};

pub mod in_memory;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store is closed")]
    Closed,
    #[error("Store is unavailable: {0}")]
    Unavailable(String),
    #[error("Account with {field} `{value}` already exists")]
    Duplicate { field: &'static str, value: String },
    #[error("Account `{0}` does not exist")]
    UnknownAccount(String),
    #[error("Injected fault on `{account}`")]
    Fault { account: String },
}

/// Result of a conditional balance update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Applied { balance: Decimal },
    /// The update would have left the balance negative, nothing was written.
    Rejected { balance: Decimal },
}

/// Result of an attempt to take a request off an agent's pending list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the resolution; the request is no longer pending.
    Claimed(PendingRequest),
    /// Someone already resolved it.
    Resolved(RequestStatus),
    Missing,
}

/// Document store holding wallet accounts.
///
/// Every method is atomic on a single account document. Cross-account atomicity is
/// the engine's job.
pub trait AccountStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email or mobile number is taken.
    fn insert(&self, account: Account) -> Result<(), StoreError>;

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    fn find_by_mobile(&self, mobile: &str) -> Result<Option<Account>, StoreError>;

    fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Adds `delta` to the balance and appends `entry`, only if the resulting
    /// balance is not negative.
    fn adjust_balance(
        &self,
        email: &str,
        delta: Decimal,
        entry: Transaction,
    ) -> Result<Adjustment, StoreError>;

    fn push_request(&self, agent: &str, request: PendingRequest) -> Result<(), StoreError>;

    /// Removes the pending request `id` from `agent` and records it as `resolution`.
    /// Of several concurrent claims on the same request exactly one sees
    /// [`Claim::Claimed`].
    fn claim_request(
        &self,
        agent: &str,
        id: RequestId,
        resolution: RequestStatus,
    ) -> Result<Claim, StoreError>;

    /// Puts a claimed request back on the pending list.
    fn release_request(&self, agent: &str, request: PendingRequest) -> Result<(), StoreError>;

    /// Terminal status of a request that is no longer pending.
    fn resolution(&self, agent: &str, id: RequestId) -> Result<Option<RequestStatus>, StoreError>;

    fn health_check(&self) -> Result<(), StoreError>;

    /// Every call after this fails with [`StoreError::Closed`].
    fn close(&self);
}
