use std::fs::File;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use wallet_ledger::{
    bin_utils::Service,
    config::LedgerConfig,
    ledger::{LedgerError, Outcome, OutcomeReport},
};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let accounts_file = args
        .next()
        .context("Expected the accounts file as the first argument")?;
    let operations_file = args
        .next()
        .context("Expected the operations file as the second argument")?;

    let config = match std::env::var("WALLET_LEDGER_CONFIG") {
        Ok(path) => {
            info!("Loading config from: {path}");
            LedgerConfig::from_file(&path)?
        }
        Err(_) => LedgerConfig::default(),
    };

    let accounts = File::open(&accounts_file)
        .with_context(|| format!("Failed to open `{accounts_file}`"))?;
    let operations = File::open(&operations_file)
        .with_context(|| format!("Failed to open `{operations_file}`"))?;

    let service = Service {
        accounts,
        operations,
        output: &mut std::io::stdout(),
        config,
        error_printer: Box::new(|line: u64, err: LedgerError| {
            if err.reconciliation_required() {
                error!(line, %err, "ledger needs reconciliation");
            }
            let report = OutcomeReport::from(Err::<Outcome, _>(err));
            match serde_json::to_string(&report) {
                Ok(json) => eprintln!("Error at line {line}: {json}"),
                Err(_) => eprintln!("Error at line {line}: status {}", report.http_status()),
            }
        }),
    };
    service.run()
}
