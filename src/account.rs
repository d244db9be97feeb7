use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login identity of an account (its email).
pub type AccountId = String;

/// Transfer/agent identity of an account.
pub type MobileNumber = String;

pub type RequestId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Pending,
    Blocked,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Debit,
    Credit,
    Withdraw,
    Deposit,
    CashInAgent,
    CashInUser,
    /// Compensating entry written when the other half of a paired mutation failed.
    Reversal,
}

/// One balance-affecting event in an account history. Never mutated once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Shared by both halves of a paired mutation.
    pub reference: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub counterparty: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

impl Transaction {
    /// Signed balance change this entry records for its owner.
    pub fn balance_delta(&self) -> Decimal {
        match self.kind {
            TransactionKind::Debit | TransactionKind::Withdraw | TransactionKind::CashInAgent => {
                -self.total
            }
            TransactionKind::Credit
            | TransactionKind::Deposit
            | TransactionKind::CashInUser
            | TransactionKind::Reversal => self.total,
        }
    }

    /// Entry undoing `self` on the same account.
    pub fn reversal(&self, timestamp: DateTime<Utc>) -> Transaction {
        Transaction {
            reference: self.reference,
            timestamp,
            kind: TransactionKind::Reversal,
            counterparty: self.counterparty.clone(),
            amount: self.amount,
            fee: self.fee,
            total: -self.balance_delta(),
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Cash-in request waiting on an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: RequestId,
    pub status: RequestStatus,
    pub requester: MobileNumber,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Persisted wallet document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "identifier")]
    pub email: AccountId,
    pub mobile_number: MobileNumber,
    pub secret_hash: String,
    pub role: Role,
    pub status: Status,
    pub balance: Decimal,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub requests: Vec<PendingRequest>,
}

impl Account {
    pub fn new(
        email: impl Into<AccountId>,
        mobile_number: impl Into<MobileNumber>,
        secret_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Account {
            email: email.into(),
            mobile_number: mobile_number.into(),
            secret_hash: secret_hash.into(),
            role,
            status: Status::Active,
            balance: Decimal::ZERO,
            transactions: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn is_agent(&self) -> bool {
        self.role == Role::Agent
    }

    /// Balance the account would have after `delta`, if it stays non-negative.
    pub fn balance_after(&self, delta: Decimal) -> Option<Decimal> {
        let balance = self.balance.checked_add(delta)?;
        (balance >= Decimal::ZERO).then_some(balance)
    }

    /// Applies `delta` and appends `entry`. Refuses (leaving the account untouched)
    /// when the balance would go negative.
    pub fn apply(&mut self, delta: Decimal, entry: Option<Transaction>) -> bool {
        let Some(balance) = self.balance_after(delta) else {
            return false;
        };
        self.balance = balance;
        if let Some(entry) = entry {
            self.transactions.push(entry);
        }
        true
    }

    pub fn pending_request(&self, id: RequestId) -> Option<&PendingRequest> {
        self.requests
            .iter()
            .find(|req| req.id == id && req.status == RequestStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn entry(kind: TransactionKind, total: &str) -> Transaction {
        Transaction {
            reference: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            counterparty: "01700000000".to_string(),
            amount: dec(total),
            fee: Decimal::ZERO,
            total: dec(total),
            sender: None,
            receiver: None,
        }
    }

    #[test]
    fn apply_entries() {
        let mut acc = Account::new("a@wallet.test", "01711111111", "hash", Role::User);
        let credit = entry(TransactionKind::Credit, "10");
        assert!(acc.apply(credit.balance_delta(), Some(credit)));
        assert_eq!(acc.balance, dec("10"));

        let debit = entry(TransactionKind::Debit, "3");
        assert!(acc.apply(debit.balance_delta(), Some(debit)));
        assert_eq!(acc.balance, dec("7"));
        assert_eq!(acc.transactions.len(), 2);

        // would go negative, nothing changes
        let debit = entry(TransactionKind::Debit, "7.01");
        assert!(!acc.apply(debit.balance_delta(), Some(debit)));
        assert_eq!(acc.balance, dec("7"));
        assert_eq!(acc.transactions.len(), 2);
    }

    #[test]
    fn reversal_undoes_entry() {
        let mut acc = Account::new("a@wallet.test", "01711111111", "hash", Role::User);
        acc.balance = dec("100");
        let debit = entry(TransactionKind::Withdraw, "20.3");
        assert!(acc.apply(debit.balance_delta(), Some(debit.clone())));
        let reversal = debit.reversal(Utc::now());
        assert_eq!(reversal.reference, debit.reference);
        assert!(acc.apply(reversal.balance_delta(), Some(reversal)));
        assert_eq!(acc.balance, dec("100"));
        assert_eq!(acc.transactions.last().unwrap().kind, TransactionKind::Reversal);
    }

    #[test]
    fn persisted_shape() {
        let acc = Account::new("a@wallet.test", "01711111111", "hash", Role::Agent);
        let json = serde_json::to_value(&acc).unwrap();
        assert_eq!(json["identifier"], "a@wallet.test");
        assert_eq!(json["mobileNumber"], "01711111111");
        assert_eq!(json["secretHash"], "hash");
        assert_eq!(json["role"], "agent");
        assert_eq!(json["status"], "active");

        let cash_in = entry(TransactionKind::CashInAgent, "1");
        let json = serde_json::to_value(&cash_in).unwrap();
        assert_eq!(json["type"], "cash-in-agent");
        assert!(json.get("sender").is_none());
    }

    #[test]
    fn only_pending_requests_are_found() {
        let mut acc = Account::new("agent@wallet.test", "01799999999", "hash", Role::Agent);
        let id = Uuid::new_v4();
        acc.requests.push(PendingRequest {
            id,
            status: RequestStatus::Approved,
            requester: "01711111111".to_string(),
            amount: dec("5"),
            created_at: Utc::now(),
        });
        assert!(acc.pending_request(id).is_none());
        acc.requests[0].status = RequestStatus::Pending;
        assert!(acc.pending_request(id).is_some());
        assert!(RequestStatus::Denied.is_terminal());
    }
}
