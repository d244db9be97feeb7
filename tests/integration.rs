use std::{cell::RefCell, rc::Rc, str::from_utf8};

use wallet_ledger::{
    bin_utils::Service,
    config::LedgerConfig,
    ledger::{ErrorKind, LedgerError},
};

const ACCOUNTS: &str = include_str!("accounts.csv");
const OPERATIONS: &str = include_str!("operations.csv");
const CHEAP_PINS: &str = "[pin]\nmemory_kib = 8\niterations = 1\n";

fn config(extra: &str) -> LedgerConfig {
    format!("{CHEAP_PINS}{extra}").parse().unwrap()
}

fn run(operations: &str, config: LedgerConfig) -> (Vec<String>, Vec<ErrorKind>) {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let mut output = Vec::new();
    let service = Service {
        accounts: ACCOUNTS.as_bytes(),
        operations: operations.as_bytes(),
        output: &mut output,
        config,
        error_printer: Box::new(move |line: u64, err: LedgerError| {
            eprintln!("Error at line {line}: {err}");
            sink.borrow_mut().push(err.kind());
        }),
    };
    service.run().unwrap();
    let lines = from_utf8(&output)
        .unwrap()
        .lines()
        .map(ToOwned::to_owned)
        .collect();
    let errors = errors.borrow().clone();
    (lines, errors)
}

#[test]
fn process_operations() {
    let (lines, errors) = run(OPERATIONS, config(""));
    assert_eq!(
        lines,
        vec![
            "email,mobile,role,status,balance,transactions,pending_requests",
            "agent@wallet.test,01799999999,agent,active,401.5,2,0",
            "alice@wallet.test,01711111111,user,active,845,1,0",
            "bob@wallet.test,01722222222,user,active,248.5,3,0",
            "carol@wallet.test,01733333333,user,blocked,50,0,0",
        ]
    );
    assert_eq!(
        errors,
        vec![
            ErrorKind::AuthenticationFailed,
            ErrorKind::AlreadyResolved,
            ErrorKind::AuthenticationFailed,
            ErrorKind::InvalidAmount,
            ErrorKind::NotFound,
        ]
    );
}

#[test]
fn fees_follow_configuration() {
    let config = config(
        r#"
        [fees]
        transfer_fee = "10"
        withdraw_rate = "0.02"
    "#,
    );
    let operations = "op,caller,counterparty,amount,pin,request\n\
                      send,alice@wallet.test,01722222222,150,1111,\n\
                      withdraw,alice@wallet.test,01799999999,100,1111,\n";
    let (lines, errors) = run(operations, config);
    assert!(errors.is_empty());
    assert!(lines.contains(&"alice@wallet.test,01711111111,user,active,738,2,0".to_string()));
    assert!(lines.contains(&"agent@wallet.test,01799999999,agent,active,602,1,0".to_string()));
}

#[test]
fn unknown_request_label_is_not_found() {
    let operations = "op,caller,counterparty,amount,pin,request\n\
                      approve,agent@wallet.test,01722222222,10,,missing\n";
    let (_, errors) = run(operations, config(""));
    assert_eq!(errors, vec![ErrorKind::NotFound]);
}

#[test]
fn malformed_seed_fails_the_run() {
    let mut output = Vec::new();
    let service = Service {
        accounts: "email,mobile,pin,role,status,balance\na@x,0171,1,root,active,1\n".as_bytes(),
        operations: "op,caller,counterparty,amount,pin,request\n".as_bytes(),
        output: &mut output,
        config: LedgerConfig::default(),
        error_printer: Box::new(|_, _| {}),
    };
    assert!(service.run().is_err());
}
