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

//! Operation journal.
//!
//! A lock-free, append-only record of mutations the ledger has applied.
//! Callers may drain it to build reports or audit trails; the ledger
//! itself never reads it back.

use crate::base::{AccountId, Currency, Role, UserId};
use crossbeam::queue::SegQueue;
use rust_decimal::Decimal;
use serde::Serialize;

/// An applied ledger mutation.
///
/// Only successful operations are journaled; a failed operation leaves no
/// record. The one exception is the backup cascade: each drained backup
/// account is journaled as it is drained, so a cascade that ultimately
/// fails still shows its partial debits, matching the balances it left
/// behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Operation {
    UserCreated {
        user: UserId,
        role: Role,
    },
    AccountCreated {
        account: AccountId,
        owner: UserId,
        currency: Currency,
        initial: Decimal,
    },
    Deposited {
        user: UserId,
        account: AccountId,
        amount: Decimal,
    },
    Withdrew {
        user: UserId,
        account: AccountId,
        amount: Decimal,
    },
    /// A backup account drained (fully or partially) during a cascade.
    BackupDrained {
        user: UserId,
        account: AccountId,
        amount: Decimal,
    },
    Transferred {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
    RateSet {
        from: Currency,
        to: Currency,
        rate: Decimal,
    },
    Exchanged {
        from: AccountId,
        to: AccountId,
        debited: Decimal,
        credited: Decimal,
    },
}

/// Append-only journal of applied operations.
///
/// Backed by a [`SegQueue`], so concurrent writers never block each other
/// or any balance lock. Insertion order reflects append order, which for
/// operations on a single account matches the order its lock serialized
/// them.
#[derive(Debug, Default)]
pub struct OperationLog {
    entries: SegQueue<Operation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self {
            entries: SegQueue::new(),
        }
    }

    pub fn record(&self, operation: Operation) {
        self.entries.push(operation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns all entries recorded so far.
    pub fn drain(&self) -> Vec<Operation> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some(entry) = self.entries.pop() {
            drained.push(entry);
        }
        drained
    }
}
