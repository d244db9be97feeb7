use std::io::Read;

use crate::{
    account::{Role, Status},
    command::OperationKind,
    ledger::NewAccount,
};
use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, de::DeserializeOwned};

/// Row of the account seed file.
#[derive(Debug, Deserialize)]
pub struct AccountRecord {
    pub email: String,
    pub mobile: String,
    pub pin: String,
    pub role: Role,
    pub status: Status,
    pub balance: Decimal,
}

impl From<AccountRecord> for NewAccount {
    fn from(record: AccountRecord) -> Self {
        NewAccount {
            email: record.email,
            mobile_number: record.mobile,
            pin: record.pin,
            role: record.role,
            status: record.status,
            balance: record.balance,
        }
    }
}

/// Row of the operation script.
///
/// `caller` is the already authenticated identity (email) and `counterparty` a
/// mobile number. `request` names a cash-in request: `cash-in` rows bind the label
/// to the created request, `approve`/`deny` rows look it up (a raw request id works
/// too). The amount stays raw text so that malformed amounts surface as ledger
/// errors.
#[derive(Debug, Deserialize)]
pub struct OperationRecord {
    pub op: OperationKind,
    pub caller: String,
    pub counterparty: String,
    pub amount: String,
    pub pin: Option<String>,
    pub request: Option<String>,
}

/// Reads CSV rows together with the line they started on.
pub struct CsvRecordParser<R, T> {
    iter: DeserializeRecordsIntoIter<R, T>,
}

impl<R, T> CsvRecordParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R, T> Iterator for CsvRecordParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    type Item = (u64, Result<T, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
