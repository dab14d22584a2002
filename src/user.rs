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

//! User records.
//!
//! A [`User`] holds the role, the ordered list of accounts it owns, and the
//! backup-funds policy flag. Role and flag are immutable after creation;
//! the account list is append-only.

use crate::base::{AccountId, Role, UserId};
use parking_lot::RwLock;

/// A bank user.
///
/// # Invariants
///
/// - Every [`AccountId`] in the account list exists in the ledger's account
///   directory and has this user as its owner.
/// - The account list preserves insertion order; the backup cascade walks
///   it in that order.
#[derive(Debug)]
pub struct User {
    id: UserId,
    role: Role,
    use_backup_funds: bool,
    accounts: RwLock<Vec<AccountId>>,
}

impl User {
    pub fn new(id: UserId, role: Role, use_backup_funds: bool) -> Self {
        Self {
            id,
            role,
            use_backup_funds,
            accounts: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether a withdrawal shortfall may be covered by draining the user's
    /// other accounts.
    pub fn use_backup_funds(&self) -> bool {
        self.use_backup_funds
    }

    /// Returns the owned account IDs in insertion order.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.accounts.read().clone()
    }

    /// Appends a newly created account ID.
    pub(crate) fn push_account(&self, account_id: AccountId) {
        self.accounts.write().push(account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_owns_no_accounts() {
        let user = User::new(UserId(1), Role::Customer, false);
        assert_eq!(user.id(), UserId(1));
        assert_eq!(user.role(), Role::Customer);
        assert!(!user.use_backup_funds());
        assert!(user.accounts().is_empty());
    }

    #[test]
    fn account_list_preserves_insertion_order() {
        let user = User::new(UserId(1), Role::Customer, true);
        user.push_account(AccountId(3));
        user.push_account(AccountId(1));
        user.push_account(AccountId(2));
        assert_eq!(
            user.accounts(),
            vec![AccountId(3), AccountId(1), AccountId(2)]
        );
    }
}
