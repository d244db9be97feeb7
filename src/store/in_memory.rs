use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::debug;

use crate::account::{
    Account, AccountId, MobileNumber, PendingRequest, RequestId, RequestStatus, Transaction,
};

use super::{AccountStore, Adjustment, Claim, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Adjust,
    PushRequest,
    Claim,
    Release,
}

/// Makes matching store calls fail, for exercising partial-failure paths.
///
/// The first `skip` matching calls pass, the next `times` fail with
/// [`StoreError::Fault`].
#[derive(Debug, Clone)]
pub struct Fault {
    pub account: AccountId,
    pub op: FaultOp,
    pub skip: usize,
    pub times: usize,
}

impl Fault {
    pub fn new(account: impl Into<AccountId>, op: FaultOp) -> Self {
        Self {
            account: account.into(),
            op,
            skip: 0,
            times: 1,
        }
    }

    pub fn after(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }
}

#[derive(Default)]
struct Documents {
    accounts: HashMap<AccountId, Account>,
    by_mobile: HashMap<MobileNumber, AccountId>,
    /// Terminal status of every resolved request, kept for the life of the store
    /// so late duplicates are answered with `AlreadyResolved`. Like the account
    /// histories it is never pruned.
    resolved: HashMap<RequestId, (AccountId, RequestStatus)>,
}

impl Documents {
    fn account_mut(&mut self, email: &str) -> Result<&mut Account, StoreError> {
        self.accounts
            .get_mut(email)
            .ok_or_else(|| StoreError::UnknownAccount(email.to_string()))
    }
}

/// Process-local store. Each call takes the document lock once, which makes it
/// atomic per account the way a single-document update is in a real database.
#[derive(Default)]
pub struct InMemoryAccountStore {
    documents: RwLock<Documents>,
    faults: Mutex<Vec<Fault>>,
    closed: AtomicBool,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self, StoreError> {
        let store = Self::new();
        for account in accounts {
            store.insert(account)?;
        }
        Ok(store)
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    /// Sum of every balance, used to check conservation.
    pub fn total_balance(&self) -> Decimal {
        self.documents
            .read()
            .accounts
            .values()
            .map(|acc| acc.balance)
            .sum()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn trip_fault(&self, account: &str, op: FaultOp) -> Result<(), StoreError> {
        let mut faults = self.faults.lock();
        let Some(pos) = faults
            .iter()
            .position(|f| f.account == account && f.op == op)
        else {
            return Ok(());
        };
        let fault = &mut faults[pos];
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        if fault.times > 1 {
            fault.times -= 1;
        } else {
            faults.remove(pos);
        }
        debug!(account, ?op, "injected store fault");
        Err(StoreError::Fault {
            account: account.to_string(),
        })
    }
}

impl AccountStore for InMemoryAccountStore {
    fn insert(&self, account: Account) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut docs = self.documents.write();
        if docs.accounts.contains_key(&account.email) {
            return Err(StoreError::Duplicate {
                field: "email",
                value: account.email,
            });
        }
        if docs.by_mobile.contains_key(&account.mobile_number) {
            return Err(StoreError::Duplicate {
                field: "mobile number",
                value: account.mobile_number,
            });
        }
        docs.by_mobile
            .insert(account.mobile_number.clone(), account.email.clone());
        docs.accounts.insert(account.email.clone(), account);
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.ensure_open()?;
        Ok(self.documents.read().accounts.get(email).cloned())
    }

    fn find_by_mobile(&self, mobile: &str) -> Result<Option<Account>, StoreError> {
        self.ensure_open()?;
        let docs = self.documents.read();
        Ok(docs
            .by_mobile
            .get(mobile)
            .and_then(|email| docs.accounts.get(email))
            .cloned())
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.ensure_open()?;
        let mut accounts: Vec<_> = self.documents.read().accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    fn adjust_balance(
        &self,
        email: &str,
        delta: Decimal,
        entry: Transaction,
    ) -> Result<Adjustment, StoreError> {
        self.ensure_open()?;
        self.trip_fault(email, FaultOp::Adjust)?;
        let mut docs = self.documents.write();
        let account = docs.account_mut(email)?;
        if account.apply(delta, Some(entry)) {
            Ok(Adjustment::Applied {
                balance: account.balance,
            })
        } else {
            Ok(Adjustment::Rejected {
                balance: account.balance,
            })
        }
    }

    fn push_request(&self, agent: &str, request: PendingRequest) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.trip_fault(agent, FaultOp::PushRequest)?;
        let mut docs = self.documents.write();
        docs.account_mut(agent)?.requests.push(request);
        Ok(())
    }

    fn claim_request(
        &self,
        agent: &str,
        id: RequestId,
        resolution: RequestStatus,
    ) -> Result<Claim, StoreError> {
        self.ensure_open()?;
        self.trip_fault(agent, FaultOp::Claim)?;
        let mut docs = self.documents.write();
        let account = docs.account_mut(agent)?;
        let pos = account
            .requests
            .iter()
            .position(|req| req.id == id && req.status == RequestStatus::Pending);
        if let Some(pos) = pos {
            let mut request = account.requests.remove(pos);
            request.status = resolution;
            docs.resolved.insert(id, (agent.to_string(), resolution));
            return Ok(Claim::Claimed(request));
        }
        match docs.resolved.get(&id) {
            Some((owner, status)) if owner == agent => Ok(Claim::Resolved(*status)),
            _ => Ok(Claim::Missing),
        }
    }

    fn release_request(&self, agent: &str, mut request: PendingRequest) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.trip_fault(agent, FaultOp::Release)?;
        let mut docs = self.documents.write();
        docs.resolved.remove(&request.id);
        let account = docs.account_mut(agent)?;
        request.status = RequestStatus::Pending;
        let pos = account
            .requests
            .partition_point(|req| req.created_at < request.created_at);
        account.requests.insert(pos, request);
        Ok(())
    }

    fn resolution(&self, agent: &str, id: RequestId) -> Result<Option<RequestStatus>, StoreError> {
        self.ensure_open()?;
        Ok(match self.documents.read().resolved.get(&id) {
            Some((owner, status)) if owner == agent => Some(*status),
            _ => None,
        })
    }

    fn health_check(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
