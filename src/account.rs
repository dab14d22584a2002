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

//! Account management.
//!
//! An [`Account`] is a balance cell guarded by its own reader/writer lock.
//! The account ID, owner, and currency are fixed at creation; only the
//! balance mutates, and only under the exclusive lock.
//!
//! # Example
//!
//! ```
//! use bank_ledger_rs::{Account, AccountId, Currency, UserId};
//! use rust_decimal_macros::dec;
//!
//! let account = Account::new(AccountId(0), UserId(1), dec!(100.00), Currency::Usd);
//! assert_eq!(account.balance(), dec!(100.00));
//! ```

use crate::base::{AccountId, Currency, UserId};
use parking_lot::{RwLock, RwLockWriteGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// A single bank account.
///
/// # Invariants
///
/// - `balance >= 0` whenever the balance lock is not held exclusively.
/// - `id`, `owner_id`, and `currency` never change after creation, so they
///   may be read without any lock.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    owner_id: UserId,
    currency: Currency,
    balance: RwLock<Decimal>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 4;

    /// Creates an account with an initial balance.
    ///
    /// The caller validates that the initial deposit is non-negative before
    /// construction.
    pub fn new(id: AccountId, owner_id: UserId, initial: Decimal, currency: Currency) -> Self {
        debug_assert!(initial >= Decimal::ZERO);
        Self {
            id,
            owner_id,
            currency,
            balance: RwLock::new(initial),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns the current balance under a shared lock.
    pub fn balance(&self) -> Decimal {
        *self.balance.read()
    }

    /// Returns a `(balance, currency)` snapshot, not a live view.
    pub fn snapshot(&self) -> (Decimal, Currency) {
        (*self.balance.read(), self.currency)
    }

    /// Adds `amount` to the balance under the exclusive lock.
    pub(crate) fn credit(&self, amount: Decimal) {
        debug_assert!(amount > Decimal::ZERO);
        let mut balance = self.balance.write();
        *balance += amount;
    }

    /// Acquires the exclusive balance lock.
    ///
    /// Multi-account operations must acquire these guards in canonical
    /// order: smaller [`AccountId`] first.
    pub(crate) fn balance_mut(&self) -> RwLockWriteGuard<'_, Decimal> {
        self.balance.write()
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let balance = *self.balance.read();
        let mut state = serializer.serialize_struct("Account", 4)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("owner", &self.owner_id)?;
        state.serialize_field("currency", &self.currency)?;
        state.serialize_field("balance", &balance.round_dp(Account::DECIMAL_PRECISION))?;
        state.end()
    }
}
