//! Cash-in requests: a user asks an agent for money, the agent approves (funding it
//! from their own balance) or denies. A request is resolved exactly once.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    account::{PendingRequest, RequestStatus, Transaction, TransactionKind},
    command::{CashInRequestCommand, ResolveAction, ResolveRequestCommand},
    store::{AccountStore, Claim},
};

use super::{Compensation, LedgerEngine, LedgerError, Leg, Outcome, Party};

impl ResolveAction {
    fn resolution(&self) -> RequestStatus {
        match self {
            ResolveAction::Approve => RequestStatus::Approved,
            ResolveAction::Deny => RequestStatus::Denied,
        }
    }
}

impl<S> LedgerEngine<S>
where
    S: AccountStore,
{
    /// Files a pending request on the agent's list. No money moves yet.
    pub fn request_cash_in(&self, cmd: CashInRequestCommand) -> Result<Outcome, LedgerError> {
        let user = self.active_caller(&cmd.user, Party::User)?;
        let agent = self.agent_by_mobile(&cmd.agent_mobile)?;
        if user.email == agent.email {
            return Err(LedgerError::InvalidCounterparty);
        }
        let request = PendingRequest {
            id: Uuid::new_v4(),
            status: RequestStatus::Pending,
            requester: user.mobile_number,
            amount: cmd.amount.value(),
            created_at: Utc::now(),
        };
        self.store.push_request(&agent.email, request.clone())?;
        info!(
            id = %request.id,
            agent = %agent.email,
            amount = %request.amount,
            "cash-in requested"
        );
        Ok(Outcome {
            request: Some(request),
            ..Default::default()
        })
    }

    /// Requests still waiting on `agent`, oldest first.
    pub fn pending_requests(&self, agent: &str) -> Result<Vec<PendingRequest>, LedgerError> {
        let agent = self
            .store
            .find_by_email(agent)?
            .filter(|acc| acc.is_agent())
            .ok_or(LedgerError::not_found(Party::Agent))?;
        Ok(agent
            .requests
            .into_iter()
            .filter(|req| req.status == RequestStatus::Pending)
            .collect())
    }

    pub fn resolve_request(&self, cmd: ResolveRequestCommand) -> Result<Outcome, LedgerError> {
        let agent = self.active_caller(&cmd.agent, Party::Agent)?;
        if !agent.is_agent() {
            return Err(LedgerError::not_found(Party::Agent));
        }
        let requester = self
            .store
            .find_by_mobile(&cmd.requester_mobile)?
            .ok_or(LedgerError::not_found(Party::Requester))?;

        let Some(snapshot) = agent.pending_request(cmd.request_id) else {
            return Err(match self.store.resolution(&agent.email, cmd.request_id)? {
                Some(status) => LedgerError::AlreadyResolved {
                    id: cmd.request_id,
                    status,
                },
                None => LedgerError::not_found(Party::Request),
            });
        };
        if snapshot.requester != requester.mobile_number || snapshot.amount != cmd.amount.value()
        {
            return Err(LedgerError::not_found(Party::Request));
        }
        if cmd.action == ResolveAction::Approve && agent.balance < snapshot.amount {
            return Err(LedgerError::InsufficientBalance {
                required: snapshot.amount,
                available: agent.balance,
            });
        }

        let request = match self.store.claim_request(
            &agent.email,
            cmd.request_id,
            cmd.action.resolution(),
        )? {
            Claim::Claimed(request) => request,
            Claim::Resolved(status) => {
                return Err(LedgerError::AlreadyResolved {
                    id: cmd.request_id,
                    status,
                });
            }
            Claim::Missing => return Err(LedgerError::not_found(Party::Request)),
        };

        if cmd.action == ResolveAction::Deny {
            info!(id = %request.id, agent = %agent.email, "cash-in denied");
            return Ok(Outcome {
                request: Some(request),
                ..Default::default()
            });
        }

        let amount = request.amount;
        let reference = Uuid::new_v4();
        let timestamp = Utc::now();
        let funding = Leg {
            account: agent.email.clone(),
            entry: Transaction {
                reference,
                timestamp,
                kind: TransactionKind::CashInAgent,
                counterparty: requester.mobile_number.clone(),
                amount,
                fee: Decimal::ZERO,
                total: amount,
                sender: Some(agent.mobile_number.clone()),
                receiver: Some(requester.mobile_number.clone()),
            },
        };
        let cash_in = Leg {
            account: requester.email,
            entry: Transaction {
                reference,
                timestamp,
                kind: TransactionKind::CashInUser,
                counterparty: agent.mobile_number.clone(),
                amount,
                fee: Decimal::ZERO,
                total: amount,
                sender: Some(agent.mobile_number),
                receiver: Some(requester.mobile_number),
            },
        };

        match self.apply_pair(funding, cash_in) {
            Ok(mut outcome) => {
                info!(id = %request.id, %reference, %amount, "cash-in approved");
                outcome.request = Some(request);
                Ok(outcome)
            }
            Err(err) if err.reconciliation_required() => {
                // the agent's debit is still committed; the request stays claimed
                error!(id = %request.id, %err, "approval left funds in flight, request kept");
                Err(err)
            }
            Err(err) => {
                let id = request.id;
                // money did not move, so the request goes back to pending
                match self.store.release_request(&agent.email, request) {
                    Ok(()) => {
                        warn!(%id, %err, "approval failed, request is pending again");
                        Err(err)
                    }
                    Err(release_err) => {
                        error!(
                            %id,
                            %err,
                            %release_err,
                            "request not restored, reconciliation required"
                        );
                        Err(LedgerError::internal(
                            format!("{err}; request {id} not restored: {release_err}"),
                            Compensation::Failed,
                        ))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use crate::{
        account::Role,
        ledger::tests::{amount, balance, dec, engine, open},
        store::in_memory::{Fault, FaultOp, InMemoryAccountStore},
    };

    use super::*;

    fn setup(agent_balance: &str) -> LedgerEngine<InMemoryAccountStore> {
        let engine = engine();
        open(&engine, "u@x", "0171", Role::User, "0");
        open(&engine, "agent@x", "0179", Role::Agent, agent_balance);
        engine
    }

    fn request(engine: &LedgerEngine<InMemoryAccountStore>, value: &str) -> PendingRequest {
        engine
            .request_cash_in(CashInRequestCommand {
                user: "u@x".to_string(),
                agent_mobile: "0179".to_string(),
                amount: amount(value),
            })
            .unwrap()
            .request
            .unwrap()
    }

    fn resolve(req: &PendingRequest, action: ResolveAction) -> ResolveRequestCommand {
        ResolveRequestCommand {
            agent: "agent@x".to_string(),
            request_id: req.id,
            requester_mobile: req.requester.clone(),
            amount: amount(&req.amount.to_string()),
            action,
        }
    }

    #[test]
    fn approve_moves_money() {
        let engine = setup("500");
        let req = request(&engine, "200");
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(engine.pending_requests("agent@x").unwrap(), vec![req.clone()]);
        // the user side keeps nothing
        assert!(engine.account("u@x").unwrap().requests.is_empty());

        let outcome = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap();
        assert_eq!(outcome.request.unwrap().status, RequestStatus::Approved);
        assert_eq!(balance(&engine, "u@x"), dec("200"));
        assert_eq!(balance(&engine, "agent@x"), dec("300"));
        assert!(engine.pending_requests("agent@x").unwrap().is_empty());

        let agent = engine.account("agent@x").unwrap();
        let user = engine.account("u@x").unwrap();
        assert_eq!(agent.transactions.len(), 1);
        assert_eq!(agent.transactions[0].kind, TransactionKind::CashInAgent);
        assert_eq!(user.transactions.len(), 1);
        assert_eq!(user.transactions[0].kind, TransactionKind::CashInUser);
        assert_eq!(user.transactions[0].counterparty, "0179");
    }

    #[test]
    fn deny_moves_nothing() {
        let engine = setup("500");
        let req = request(&engine, "200");
        let outcome = engine
            .resolve_request(resolve(&req, ResolveAction::Deny))
            .unwrap();
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.request.unwrap().status, RequestStatus::Denied);
        assert_eq!(balance(&engine, "agent@x"), dec("500"));
        assert!(engine.pending_requests("agent@x").unwrap().is_empty());
        assert!(engine.account("agent@x").unwrap().transactions.is_empty());

        let err = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::AlreadyResolved {
                id: req.id,
                status: RequestStatus::Denied
            }
        );
        assert_eq!(err.http_status(), 400);
        assert_eq!(balance(&engine, "u@x"), dec("0"));
    }

    #[test]
    fn resolving_twice_applies_once() {
        let engine = setup("500");
        let req = request(&engine, "200");
        engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap();
        let err = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyResolved { .. }));
        assert_eq!(balance(&engine, "u@x"), dec("200"));
        assert_eq!(balance(&engine, "agent@x"), dec("300"));
    }

    #[test]
    fn concurrent_resolution_applies_once() {
        let engine = Arc::new(setup("500"));
        let req = request(&engine, "200");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let cmd = resolve(&req, ResolveAction::Approve);
                thread::spawn(move || engine.resolve_request(cmd))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|err| matches!(
            err,
            LedgerError::AlreadyResolved { .. } | LedgerError::NotFound { .. }
        )));
        assert_eq!(balance(&engine, "u@x"), dec("200"));
        assert_eq!(balance(&engine, "agent@x"), dec("300"));
    }

    #[test]
    fn requests_are_addressed_by_id() {
        let engine = setup("500");
        let first = request(&engine, "50");
        let second = request(&engine, "50");
        assert_eq!(engine.pending_requests("agent@x").unwrap().len(), 2);

        engine
            .resolve_request(resolve(&second, ResolveAction::Approve))
            .unwrap();
        assert_eq!(engine.pending_requests("agent@x").unwrap(), vec![first.clone()]);
        assert_eq!(balance(&engine, "u@x"), dec("50"));

        // wrong requester or amount does not match the request
        open(&engine, "v@x", "0172", Role::User, "0");
        let err = engine
            .resolve_request(ResolveRequestCommand {
                requester_mobile: "0172".to_string(),
                ..resolve(&first, ResolveAction::Approve)
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::not_found(Party::Request));
        let err = engine
            .resolve_request(ResolveRequestCommand {
                amount: amount("51"),
                ..resolve(&first, ResolveAction::Approve)
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::not_found(Party::Request));
        let err = engine
            .resolve_request(ResolveRequestCommand {
                request_id: Uuid::new_v4(),
                ..resolve(&first, ResolveAction::Deny)
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::not_found(Party::Request));
    }

    #[test]
    fn agent_must_fund_approval() {
        let engine = setup("100");
        let req = request(&engine, "200");
        let err = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                required: dec("200"),
                available: dec("100")
            }
        );
        assert_eq!(engine.pending_requests("agent@x").unwrap(), vec![req]);
    }

    #[test]
    fn only_agents_take_requests() {
        let engine = setup("100");
        open(&engine, "v@x", "0172", Role::User, "0");
        let err = engine
            .request_cash_in(CashInRequestCommand {
                user: "u@x".to_string(),
                agent_mobile: "0172".to_string(),
                amount: amount("10"),
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::not_found(Party::Agent));

        let req = request(&engine, "10");
        let err = engine
            .resolve_request(ResolveRequestCommand {
                agent: "v@x".to_string(),
                ..resolve(&req, ResolveAction::Approve)
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::not_found(Party::Agent));
        assert!(engine.pending_requests("v@x").is_err());
    }

    #[test]
    fn failed_credit_restores_request_and_balances() {
        let engine = setup("500");
        let req = request(&engine, "200");
        engine
            .store()
            .inject_fault(Fault::new("u@x", FaultOp::Adjust));

        let err = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Internal {
                compensation: Compensation::Applied,
                ..
            }
        ));
        assert_eq!(balance(&engine, "agent@x"), dec("500"));
        assert_eq!(balance(&engine, "u@x"), dec("0"));
        assert_eq!(engine.pending_requests("agent@x").unwrap(), vec![req.clone()]);

        // the retry goes through
        engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap();
        assert_eq!(balance(&engine, "u@x"), dec("200"));
    }

    #[test]
    fn lost_request_requires_reconciliation() {
        let engine = setup("500");
        let req = request(&engine, "200");
        engine
            .store()
            .inject_fault(Fault::new("u@x", FaultOp::Adjust));
        engine
            .store()
            .inject_fault(Fault::new("agent@x", FaultOp::Release));

        let err = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap_err();
        assert!(err.reconciliation_required());
        // balances were still put back
        assert_eq!(balance(&engine, "agent@x"), dec("500"));
    }

    #[test]
    fn failed_reversal_keeps_request_resolved() {
        let engine = setup("500");
        let req = request(&engine, "200");
        engine
            .store()
            .inject_fault(Fault::new("u@x", FaultOp::Adjust));
        // let the funding debit through, fail its reversal
        engine
            .store()
            .inject_fault(Fault::new("agent@x", FaultOp::Adjust).after(1));

        let err = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap_err();
        assert!(err.reconciliation_required());
        assert!(engine.pending_requests("agent@x").unwrap().is_empty());

        let err = engine
            .resolve_request(resolve(&req, ResolveAction::Approve))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::AlreadyResolved {
                id: req.id,
                status: RequestStatus::Approved,
            }
        );
        // debited once, never twice
        assert_eq!(balance(&engine, "agent@x"), dec("300"));
        assert_eq!(balance(&engine, "u@x"), dec("0"));
    }
}
