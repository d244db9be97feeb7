use std::io::Write;

use crate::account::{self, Role, Status};
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub email: String,
    pub mobile: String,
    pub role: Role,
    pub status: Status,
    pub balance: Decimal,
    pub transactions: usize,
    pub pending_requests: usize,
}

impl From<account::Account> for AccountRow {
    fn from(acc: account::Account) -> Self {
        AccountRow {
            transactions: acc.transactions.len(),
            pending_requests: acc.requests.len(),
            email: acc.email,
            mobile: acc.mobile_number,
            role: acc.role,
            status: acc.status,
            balance: acc.balance,
        }
    }
}

pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl Iterator<Item = AccountRow>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for acc in accounts {
        if let Err(err) = writer.serialize(acc) {
            anyhow::bail!("Failed to write to CSV: {err}")
        }
    }
    // csv buffers internally, nothing reaches `output` before this
    if let Err(err) = writer.flush() {
        anyhow::bail!("Failed to flush CSV writer: {err}")
    }
    Ok(())
}
