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

//! # Bank Ledger
//!
//! An in-memory ledger that maintains user accounts and processes
//! concurrent balance-mutating operations: deposits, withdrawals with
//! backup-funds cascading, same-currency transfers, and currency exchange.
//!
//! ## Core Components
//!
//! - [`Bank`]: the ledger — directories, ID allocation, rate table, and
//!   every mutating operation with its locking protocol
//! - [`Account`]: a balance cell guarded by its own reader/writer lock
//! - [`User`]: role, owned-account list, and backup-funds policy
//! - [`ExchangeRateTable`]: directed currency-pair rates
//! - [`LedgerError`]: error taxonomy for all operations
//!
//! ## Example
//!
//! ```
//! use bank_ledger_rs::{Bank, Currency, Role, UserId};
//! use rust_decimal_macros::dec;
//!
//! let bank = Bank::new();
//! bank.create_user(UserId(1), Role::Customer, false);
//!
//! let account = bank.create_account(UserId(1), dec!(100.00), Currency::Usd).unwrap();
//! bank.deposit(UserId(1), account, dec!(50.00)).unwrap();
//!
//! let (balance, currency) = bank.get_balance(UserId(1), account).unwrap();
//! assert_eq!(balance, dec!(150.00));
//! assert_eq!(currency, Currency::Usd);
//! ```
//!
//! ## Thread Safety
//!
//! A single [`Bank`] is shared across threads. Operations on disjoint
//! accounts run in parallel; operations on the same account are serialized
//! by that account's lock. Multi-account operations acquire locks in
//! canonical account-ID order, so concurrent transfers and exchanges cannot
//! deadlock regardless of argument order.

pub mod account;
mod bank;
mod base;
pub mod error;
mod journal;
mod rates;
mod user;

pub use account::Account;
pub use bank::Bank;
pub use base::{AccountId, Currency, Role, UserId};
pub use error::LedgerError;
pub use journal::{Operation, OperationLog};
pub use rates::ExchangeRateTable;
pub use user::User;
