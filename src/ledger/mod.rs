use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    account::{Account, AccountId, MobileNumber, Role, Status, Transaction, TransactionKind},
    command::{CommandError, TransferCommand, WithdrawCommand},
    config::{FeeSchedule, LedgerConfig},
    pin::{Argon2PinHasher, PinHasher},
    store::{AccountStore, Adjustment},
};

pub mod error;
pub mod outcome;
pub mod workflow;

pub use error::{Compensation, ErrorKind, LedgerError, Party};
pub use outcome::{Outcome, OutcomeReport};

/// Data needed to open a wallet.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: AccountId,
    pub mobile_number: MobileNumber,
    pub pin: String,
    pub role: Role,
    pub status: Status,
    pub balance: Decimal,
}

/// One side of a paired balance mutation.
struct Leg {
    account: AccountId,
    entry: Transaction,
}

impl Leg {
    fn delta(&self) -> Decimal {
        self.entry.balance_delta()
    }
}

/// Validates operations, computes fees and applies the resulting paired
/// mutations to the store.
///
/// The engine holds no per-account state. Every balance change goes through
/// [`AccountStore::adjust_balance`], which refuses updates that would take a
/// balance below zero, and every two-account operation is applied as
/// "first leg, second leg, reverse the first leg if the second did not land".
pub struct LedgerEngine<S> {
    store: Arc<S>,
    pins: Arc<dyn PinHasher>,
    fees: FeeSchedule,
}

impl<S> LedgerEngine<S>
where
    S: AccountStore,
{
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        let params = config.pin.params().unwrap_or_else(|err| {
            warn!(%err, "invalid pin hashing parameters, using defaults");
            Default::default()
        });
        Self {
            store,
            pins: Arc::new(Argon2PinHasher::new(params)),
            fees: config.fees.clone(),
        }
    }

    pub fn with_pin_hasher(mut self, pins: Arc<dyn PinHasher>) -> Self {
        self.pins = pins;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn health_check(&self) -> Result<(), LedgerError> {
        Ok(self.store.health_check()?)
    }

    pub fn shutdown(&self) {
        info!("closing account store");
        self.store.close();
    }

    pub fn register(&self, new: NewAccount) -> Result<Account, LedgerError> {
        if new.balance < Decimal::ZERO {
            return Err(CommandError::Negative {
                amount: new.balance,
            }
            .into());
        }
        let secret_hash = self
            .pins
            .hash(&new.pin)
            .map_err(|err| LedgerError::internal(err, Compensation::NotNeeded))?;
        let mut account = Account::new(new.email, new.mobile_number, secret_hash, new.role);
        account.status = new.status;
        account.balance = new.balance;
        self.store.insert(account.clone())?;
        info!(email = %account.email, role = ?account.role, "account registered");
        Ok(account)
    }

    /// Checks credentials of an active account and returns its identity.
    pub fn authenticate(&self, email: &str, pin: &str) -> Result<AccountId, LedgerError> {
        let account = self.active_caller(email, Party::Account)?;
        self.verify_pin(&account, pin)?;
        Ok(account.email)
    }

    pub fn account(&self, email: &str) -> Result<Account, LedgerError> {
        self.store
            .find_by_email(email)?
            .ok_or(LedgerError::not_found(Party::Account))
    }

    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.accounts()?)
    }

    pub fn transfer(&self, cmd: TransferCommand) -> Result<Outcome, LedgerError> {
        let amount = cmd.amount.value();
        let sender = self.active_caller(&cmd.sender, Party::Sender)?;
        let receiver = self
            .store
            .find_by_mobile(&cmd.receiver_mobile)?
            .ok_or(LedgerError::not_found(Party::Receiver))?;
        if sender.email == receiver.email {
            return Err(LedgerError::InvalidCounterparty);
        }
        self.verify_pin(&sender, &cmd.pin)?;

        let fee = self.fees.transfer_fee(amount);
        let total = amount
            .checked_add(fee)
            .ok_or(CommandError::TooLarge { amount })?;
        debug!(
            sender = %sender.email,
            receiver = %receiver.email,
            %amount,
            %fee,
            "transfer accepted"
        );

        let reference = Uuid::new_v4();
        let timestamp = Utc::now();
        let debit = Leg {
            account: sender.email.clone(),
            entry: Transaction {
                reference,
                timestamp,
                kind: TransactionKind::Debit,
                counterparty: receiver.mobile_number.clone(),
                amount,
                fee,
                total,
                sender: Some(sender.mobile_number.clone()),
                receiver: Some(receiver.mobile_number.clone()),
            },
        };
        let credit = Leg {
            account: receiver.email.clone(),
            entry: Transaction {
                reference,
                timestamp,
                kind: TransactionKind::Credit,
                counterparty: sender.mobile_number.clone(),
                amount,
                fee: Decimal::ZERO,
                total: amount,
                sender: Some(sender.mobile_number),
                receiver: Some(receiver.mobile_number),
            },
        };
        let outcome = self.apply_pair(debit, credit)?;
        info!(%reference, %amount, %fee, "transfer committed");
        Ok(outcome)
    }

    pub fn withdraw(&self, cmd: WithdrawCommand) -> Result<Outcome, LedgerError> {
        let amount = cmd.amount.value();
        let user = self.active_caller(&cmd.user, Party::User)?;
        let agent = self.agent_by_mobile(&cmd.agent_mobile)?;
        if user.email == agent.email {
            return Err(LedgerError::InvalidCounterparty);
        }
        self.verify_pin(&user, &cmd.pin)?;

        let (fee, total) = self
            .fees
            .withdraw_fee(amount)
            .and_then(|fee| amount.checked_add(fee).map(|total| (fee, total)))
            .ok_or(CommandError::TooLarge { amount })?;
        debug!(user = %user.email, agent = %agent.email, %amount, %fee, "withdrawal accepted");

        let reference = Uuid::new_v4();
        let timestamp = Utc::now();
        let withdraw = Leg {
            account: user.email.clone(),
            entry: Transaction {
                reference,
                timestamp,
                kind: TransactionKind::Withdraw,
                counterparty: agent.mobile_number.clone(),
                amount,
                fee,
                total,
                sender: None,
                receiver: None,
            },
        };
        // the fee goes to the agent
        let deposit = Leg {
            account: agent.email,
            entry: Transaction {
                reference,
                timestamp,
                kind: TransactionKind::Deposit,
                counterparty: user.mobile_number,
                amount,
                fee,
                total,
                sender: None,
                receiver: None,
            },
        };
        let outcome = self.apply_pair(withdraw, deposit)?;
        info!(%reference, %amount, %fee, "withdrawal committed");
        Ok(outcome)
    }

    fn active_caller(&self, email: &str, party: Party) -> Result<Account, LedgerError> {
        let account = self
            .store
            .find_by_email(email)?
            .ok_or(LedgerError::not_found(party))?;
        if !account.is_active() {
            warn!(email, status = ?account.status, "inactive account rejected");
            return Err(LedgerError::AuthenticationFailed);
        }
        Ok(account)
    }

    fn agent_by_mobile(&self, mobile: &str) -> Result<Account, LedgerError> {
        self.store
            .find_by_mobile(mobile)?
            .filter(Account::is_agent)
            .ok_or(LedgerError::not_found(Party::Agent))
    }

    fn verify_pin(&self, account: &Account, pin: &str) -> Result<(), LedgerError> {
        if self.pins.verify(pin, &account.secret_hash) {
            Ok(())
        } else {
            warn!(email = %account.email, "pin mismatch");
            Err(LedgerError::AuthenticationFailed)
        }
    }

    /// Applies `first` then `second`. When `first` is refused nothing happened and the
    /// refusal is reported as [`LedgerError::InsufficientBalance`]. When `second` does
    /// not land, `first` is reversed before the error is returned.
    fn apply_pair(&self, first: Leg, second: Leg) -> Result<Outcome, LedgerError> {
        let first_balance =
            match self
                .store
                .adjust_balance(&first.account, first.delta(), first.entry.clone())
            {
                Ok(Adjustment::Applied { balance }) => balance,
                Ok(Adjustment::Rejected { balance }) => {
                    let required = -first.delta();
                    warn!(account = %first.account, %required, %balance, "insufficient balance");
                    return Err(LedgerError::InsufficientBalance {
                        required,
                        available: balance,
                    });
                }
                Err(err) => return Err(LedgerError::internal(err, Compensation::NotNeeded)),
            };

        let failure = match self.store.adjust_balance(
            &second.account,
            second.delta(),
            second.entry.clone(),
        ) {
            Ok(Adjustment::Applied { balance: second_balance }) => {
                let mut outcome = Outcome {
                    transactions: vec![first.entry, second.entry],
                    ..Default::default()
                };
                outcome.new_balances.insert(first.account, first_balance);
                outcome.new_balances.insert(second.account, second_balance);
                return Ok(outcome);
            }
            Ok(Adjustment::Rejected { balance }) => format!(
                "{} refused a change of {} at balance {balance}",
                second.account,
                second.delta()
            ),
            Err(err) => err.to_string(),
        };

        warn!(account = %second.account, %failure, "second leg failed, reversing first leg");
        let compensation = self.reverse(&first);
        Err(LedgerError::internal(failure, compensation))
    }

    /// Undoes a committed leg with a reversal entry.
    fn reverse(&self, leg: &Leg) -> Compensation {
        let reversal = leg.entry.reversal(Utc::now());
        match self
            .store
            .adjust_balance(&leg.account, -leg.delta(), reversal)
        {
            Ok(Adjustment::Applied { .. }) => {
                info!(account = %leg.account, reference = %leg.entry.reference, "leg reversed");
                Compensation::Applied
            }
            Ok(Adjustment::Rejected { balance }) => {
                error!(
                    account = %leg.account,
                    reference = %leg.entry.reference,
                    %balance,
                    "reversal refused, reconciliation required"
                );
                Compensation::Failed
            }
            Err(err) => {
                error!(
                    account = %leg.account,
                    reference = %leg.entry.reference,
                    %err,
                    "reversal failed, reconciliation required"
                );
                Compensation::Failed
            }
        }
    }
}
