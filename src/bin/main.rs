// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use bank_ledger_rs::{AccountId, Bank, Currency, Role, UserId};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Bank Ledger - Replay operation CSV files
///
/// Reads ledger operations from a CSV file, applies them to an in-memory
/// bank, and outputs the final account states to stdout.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger-rs")]
#[command(about = "Replays a CSV of bank operations and prints account states", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected columns: op,user,account,to,amount,currency,currency_to,role,rate,backup
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let bank = match replay_operations(BufReader::new(file)) {
        Ok(bank) => bank,
        Err(e) => {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_accounts(&bank, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, user, account, to, amount, currency, currency_to, role, rate, backup`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    user: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    account: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    to: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    amount: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    currency_to: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    rate: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    backup: Option<bool>,
}

impl CsvRecord {
    /// Applies this record to the bank.
    ///
    /// Returns `false` for unknown operations or missing required fields,
    /// `true` if the operation was dispatched (even if the bank rejected
    /// it).
    fn apply(self, bank: &Bank) -> bool {
        match self.op.to_lowercase().as_str() {
            "create_user" => {
                let (Some(user), Some(role)) = (self.user, self.role) else {
                    return false;
                };
                let Ok(role) = role.parse::<Role>() else {
                    return false;
                };
                bank.create_user(UserId(user), role, self.backup.unwrap_or(false));
                true
            }
            "create_account" => {
                let (Some(user), Some(amount), Some(currency)) =
                    (self.user, self.amount, self.currency)
                else {
                    return false;
                };
                let Ok(currency) = currency.parse::<Currency>() else {
                    return false;
                };
                if let Err(e) = bank.create_account(UserId(user), amount, currency) {
                    #[cfg(debug_assertions)]
                    eprintln!("create_account rejected: {}", e);
                    let _ = e;
                }
                true
            }
            "deposit" => {
                let (Some(user), Some(account), Some(amount)) =
                    (self.user, self.account, self.amount)
                else {
                    return false;
                };
                if let Err(e) = bank.deposit(UserId(user), AccountId(account), amount) {
                    #[cfg(debug_assertions)]
                    eprintln!("deposit rejected: {}", e);
                    let _ = e;
                }
                true
            }
            "withdraw" => {
                let (Some(user), Some(account), Some(amount)) =
                    (self.user, self.account, self.amount)
                else {
                    return false;
                };
                if let Err(e) = bank.withdraw(UserId(user), AccountId(account), amount) {
                    #[cfg(debug_assertions)]
                    eprintln!("withdraw rejected: {}", e);
                    let _ = e;
                }
                true
            }
            "transfer" => {
                let (Some(from), Some(to), Some(amount)) = (self.account, self.to, self.amount)
                else {
                    return false;
                };
                if let Err(e) = bank.transfer(AccountId(from), AccountId(to), amount) {
                    #[cfg(debug_assertions)]
                    eprintln!("transfer rejected: {}", e);
                    let _ = e;
                }
                true
            }
            "set_rate" => {
                let (Some(from), Some(to), Some(rate)) =
                    (self.currency, self.currency_to, self.rate)
                else {
                    return false;
                };
                let (Ok(from), Ok(to)) = (from.parse::<Currency>(), to.parse::<Currency>()) else {
                    return false;
                };
                bank.set_exchange_rate(from, to, rate);
                true
            }
            "exchange" => {
                let (Some(user), Some(from), Some(to), Some(amount)) =
                    (self.user, self.account, self.to, self.amount)
                else {
                    return false;
                };
                if let Err(e) =
                    bank.exchange_currency(UserId(user), AccountId(from), AccountId(to), amount)
                {
                    #[cfg(debug_assertions)]
                    eprintln!("exchange rejected: {}", e);
                    let _ = e;
                }
                true
            }
            _ => false,
        }
    }
}

/// Replays operations from a CSV reader.
///
/// Streaming parse; malformed rows and unknown operations are skipped, and
/// operations the bank rejects do not stop the replay.
///
/// # CSV Format
///
/// ```csv
/// op,user,account,to,amount,currency,currency_to,role,rate,backup
/// create_user,1,,,,,,customer,,true
/// create_account,1,,,100.00,USD,,,,
/// deposit,1,0,,50.00,,,,,
/// transfer,,0,1,25.00,,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn replay_operations<R: Read>(reader: R) -> Result<Bank, csv::Error> {
    let bank = Bank::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                if !record.apply(&bank) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                }
            }
            Err(_e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", _e);
                continue;
            }
        }
    }

    Ok(bank)
}

/// Writes account states to a CSV writer.
///
/// Accounts are ordered by account ID with balances rounded to 4 decimal
/// places.
///
/// # CSV Format
///
/// Columns: `account, owner, currency, balance`
pub fn write_accounts<W: Write>(bank: &Bank, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut accounts: Vec<_> = bank
        .accounts()
        .map(|entry| std::sync::Arc::clone(entry.value()))
        .collect();
    accounts.sort_by_key(|account| account.id());

    for account in accounts {
        wtr.serialize(&*account)?;
    }

    wtr.flush()?;
    Ok(())
}
