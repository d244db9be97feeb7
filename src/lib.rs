/// Wallet documents: balances, append-only transaction history and the
/// pending cash-in requests agents hold.
pub mod account;

/// Typed operation payloads handed to the [`ledger`], plus amount validation.
pub mod command;

/// Fee schedule and its configuration file.
pub mod config;

/// PIN hashing.
pub mod pin;

/// Account store interface, plus "in memory" implementation.
///
/// Every store call is atomic on one account. The engine builds its two-account
/// guarantees on top of that.
pub mod store;

/// Transfer, withdrawal and cash-in operations. Validates commands, computes
/// fees and applies paired mutations with compensation on partial failure.
pub mod ledger;

/// CSV bootstrap around [`ledger`], used by the binary and integration tests.
pub mod bin_utils;
