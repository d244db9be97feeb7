//! Bootstraps [`crate::ledger::LedgerEngine`] for the binary: seeds an in-memory
//! store from an account file, replays an operation script and prints balances.
//! Integration tests drive it the same way.

use std::{
    collections::HashMap,
    io::{Read, Write},
    sync::Arc,
};

use crate::{
    account::RequestId,
    command::{
        Amount, CashInRequestCommand, OperationKind, ResolveAction, ResolveRequestCommand,
        TransferCommand, WithdrawCommand,
    },
    config::LedgerConfig,
    ledger::{LedgerEngine, LedgerError, Outcome, Party},
    store::in_memory::InMemoryAccountStore,
};
use anyhow::{Context, Result};
use csv_parser::{AccountRecord, CsvRecordParser, OperationRecord};
use csv_printer::{AccountRow, print_accounts};
use tracing::debug;
use uuid::Uuid;
pub mod csv_parser;
pub mod csv_printer;

pub struct Service<'w, A, O, W: 'w> {
    pub accounts: A,
    pub operations: O,
    pub output: &'w mut W,
    pub config: LedgerConfig,
    pub error_printer: Box<dyn FnMut(u64, LedgerError)>,
}

impl<'w, A, O, W> Service<'w, A, O, W>
where
    A: Read,
    O: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let store = Arc::new(InMemoryAccountStore::new());
        let engine = LedgerEngine::new(store, &self.config);

        for (line, record) in CsvRecordParser::<_, AccountRecord>::new(self.accounts) {
            let record = record.with_context(|| format!("Malformed account at line {line}"))?;
            engine
                .register(record.into())
                .with_context(|| format!("Cannot open account at line {line}"))?;
        }

        let mut script = Script {
            engine: &engine,
            labels: HashMap::new(),
        };
        for (line, record) in CsvRecordParser::<_, OperationRecord>::new(self.operations) {
            let record = record.with_context(|| format!("Malformed operation at line {line}"))?;
            match script.execute(record) {
                Ok(outcome) => debug!(line, transactions = outcome.transactions.len(), "applied"),
                Err(err) => (self.error_printer)(line, err),
            }
        }

        let accounts = engine.accounts().context("Failed to read accounts")?;
        print_accounts(self.output, accounts.into_iter().map(AccountRow::from))?;
        engine.shutdown();
        Ok(())
    }
}

struct Script<'e> {
    engine: &'e LedgerEngine<InMemoryAccountStore>,
    labels: HashMap<String, RequestId>,
}

impl Script<'_> {
    fn execute(&mut self, record: OperationRecord) -> Result<Outcome, LedgerError> {
        let amount: Amount = record.amount.parse()?;
        let pin = record.pin.unwrap_or_default();
        match record.op {
            OperationKind::Send => self.engine.transfer(TransferCommand {
                sender: record.caller,
                receiver_mobile: record.counterparty,
                amount,
                pin,
            }),
            OperationKind::Withdraw => self.engine.withdraw(WithdrawCommand {
                user: record.caller,
                agent_mobile: record.counterparty,
                amount,
                pin,
            }),
            OperationKind::CashIn => {
                let outcome = self.engine.request_cash_in(CashInRequestCommand {
                    user: record.caller,
                    agent_mobile: record.counterparty,
                    amount,
                })?;
                if let (Some(label), Some(request)) = (record.request, &outcome.request) {
                    self.labels.insert(label, request.id);
                }
                Ok(outcome)
            }
            OperationKind::Approve | OperationKind::Deny => {
                let request_id = record
                    .request
                    .as_deref()
                    .and_then(|label| {
                        self.labels
                            .get(label)
                            .copied()
                            .or_else(|| Uuid::parse_str(label).ok())
                    })
                    .ok_or(LedgerError::not_found(Party::Request))?;
                let action = if record.op == OperationKind::Approve {
                    ResolveAction::Approve
                } else {
                    ResolveAction::Deny
                };
                self.engine.resolve_request(ResolveRequestCommand {
                    agent: record.caller,
                    request_id,
                    requester_mobile: record.counterparty,
                    amount,
                    action,
                })
            }
        }
    }
}
