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

//! The ledger.
//!
//! The [`Bank`] owns the account and user directories, allocates account
//! IDs, holds the exchange-rate table, and orchestrates every mutating
//! operation and its locking protocol.
//!
//! # Locking protocol
//!
//! - Directory lookups use [`DashMap`] shard locks, which are never held
//!   across a balance-lock acquisition.
//! - Single-account operations take that account's exclusive lock and no
//!   other.
//! - Two-account operations ([`transfer`](Bank::transfer),
//!   [`exchange_currency`](Bank::exchange_currency)) acquire both exclusive
//!   locks in canonical order: the numerically smaller [`AccountId`] first,
//!   regardless of which side is debited. No two concurrent calls can
//!   deadlock, whatever their argument order.
//! - The backup cascade holds at most one account lock at any instant. The
//!   primary debit and the cascade debits are therefore not one atomic
//!   critical section; see [`withdraw`](Bank::withdraw).

use crate::account::Account;
use crate::base::{AccountId, Currency, Role, UserId};
use crate::error::LedgerError;
use crate::journal::{Operation, OperationLog};
use crate::rates::ExchangeRateTable;
use crate::user::User;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Concurrent in-memory bank ledger.
///
/// # Operations
///
/// | Operation | Locks held |
/// |-----------|------------|
/// | `create_user` / `create_account` / `set_exchange_rate` | directory only |
/// | `get_balance` | one shared account lock |
/// | `deposit` | one exclusive account lock |
/// | `withdraw` | one exclusive account lock at a time (cascade included) |
/// | `transfer` / `exchange_currency` | two exclusive locks, canonical order |
///
/// # Invariants
///
/// - Every balance is non-negative whenever its lock is released.
/// - Account IDs come only from the internal counter and are never reused.
/// - Every account ID in a user's list refers to an account owned by that
///   user.
pub struct Bank {
    /// Accounts indexed by account ID. Accounts are never removed.
    accounts: DashMap<AccountId, Arc<Account>>,
    /// Users indexed by user ID. Users are never removed.
    users: DashMap<UserId, Arc<User>>,
    /// Directed currency-pair exchange rates.
    rates: ExchangeRateTable,
    /// Journal of applied mutations.
    journal: OperationLog,
    /// Sole source of new account IDs.
    next_account_id: AtomicU32,
}

impl Bank {
    /// Creates an empty ledger with no users, accounts, or rates.
    pub fn new() -> Self {
        Bank {
            accounts: DashMap::new(),
            users: DashMap::new(),
            rates: ExchangeRateTable::new(),
            journal: OperationLog::new(),
            next_account_id: AtomicU32::new(0),
        }
    }

    /// Registers a user with a role and a backup-funds policy.
    ///
    /// Re-registering an existing ID replaces the record, matching the
    /// reference behavior. The replaced user's accounts remain in the
    /// directory but are no longer reachable through a user record.
    pub fn create_user(&self, user_id: UserId, role: Role, use_backup_funds: bool) {
        self.users
            .insert(user_id, Arc::new(User::new(user_id, role, use_backup_funds)));
        self.journal.record(Operation::UserCreated {
            user: user_id,
            role,
        });
    }

    /// Opens an account for `user_id` with an initial deposit.
    ///
    /// The account is inserted into the directory before its ID is appended
    /// to the owner's list, so every listed ID always resolves.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NegativeDeposit`] - initial deposit below zero
    ///   (checked before any lock).
    /// - [`LedgerError::UserNotExist`] - unknown owner.
    pub fn create_account(
        &self,
        user_id: UserId,
        initial_deposit: Decimal,
        currency: Currency,
    ) -> Result<AccountId, LedgerError> {
        if initial_deposit < Decimal::ZERO {
            return Err(LedgerError::NegativeDeposit);
        }

        let user = self.user(user_id)?;
        let account_id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
        self.accounts.insert(
            account_id,
            Arc::new(Account::new(account_id, user_id, initial_deposit, currency)),
        );
        user.push_account(account_id);

        self.journal.record(Operation::AccountCreated {
            account: account_id,
            owner: user_id,
            currency,
            initial: initial_deposit,
        });
        Ok(account_id)
    }

    /// Checks whether `user_id` may operate on `account_id`.
    ///
    /// Access is granted to bankers and to the account's owner. Reads only
    /// immutable account fields and the directory; takes no balance lock.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotExist`] - unknown account.
    /// - [`LedgerError::UserNotExist`] - unknown caller.
    /// - [`LedgerError::UnauthorizedAccess`] - caller is neither a banker
    ///   nor the owner.
    pub fn check_permissions(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<(), LedgerError> {
        let account = self.account(account_id)?;
        let user = self.user(user_id)?;
        if user.role() == Role::Banker || account.owner_id() == user_id {
            return Ok(());
        }
        Err(LedgerError::UnauthorizedAccess)
    }

    /// Returns a `(balance, currency)` snapshot of an account.
    ///
    /// The balance is read under the account's shared lock; the returned
    /// pair is a snapshot, not a live view.
    pub fn get_balance(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<(Decimal, Currency), LedgerError> {
        self.check_permissions(user_id, account_id)?;
        let account = self.account(account_id)?;
        Ok(account.snapshot())
    }

    /// Adds funds to an account.
    ///
    /// Takes exactly one exclusive lock, so a deposit can never participate
    /// in a deadlock.
    pub fn deposit(
        &self,
        user_id: UserId,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.check_permissions(user_id, account_id)?;

        let account = self.account(account_id)?;
        account.credit(amount);

        self.journal.record(Operation::Deposited {
            user: user_id,
            account: account_id,
            amount,
        });
        Ok(())
    }

    /// Withdraws funds from an account, falling back to the user's other
    /// accounts when the backup-funds policy allows it.
    ///
    /// If the primary account covers the amount, this is a single
    /// critical-section debit. Otherwise, with backup funds enabled, the
    /// primary account is zeroed, its lock released, and the remainder is
    /// collected by the backup cascade. The primary debit and the cascade
    /// are deliberately not one atomic section: a concurrent withdrawal may
    /// interleave on the backup accounts, and a cascade that fails with
    /// [`LedgerError::InsufficientBalance`] does not roll back the accounts
    /// it already drained.
    pub fn withdraw(
        &self,
        user_id: UserId,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.check_permissions(user_id, account_id)?;

        let account = self.account(account_id)?;
        let user = self.user(user_id)?;

        let remaining = {
            let mut balance = account.balance_mut();
            if *balance >= amount {
                *balance -= amount;
                drop(balance);
                self.journal.record(Operation::Withdrew {
                    user: user_id,
                    account: account_id,
                    amount,
                });
                return Ok(());
            }
            if !user.use_backup_funds() {
                return Err(LedgerError::InsufficientBalance);
            }
            let drained = *balance;
            *balance = Decimal::ZERO;
            drop(balance);
            if drained > Decimal::ZERO {
                self.journal.record(Operation::BackupDrained {
                    user: user_id,
                    account: account_id,
                    amount: drained,
                });
            }
            // balance < amount, so the remainder is strictly positive
            amount - drained
        };

        self.withdraw_from_other_accounts(&user, account_id, remaining)?;
        self.journal.record(Operation::Withdrew {
            user: user_id,
            account: account_id,
            amount,
        });
        Ok(())
    }

    /// Collects `amount` from the user's other accounts in insertion order.
    ///
    /// Each step acquires and releases a single account lock. The first
    /// account that covers the outstanding amount is debited and the
    /// cascade short-circuits; accounts that cannot cover it are zeroed and
    /// the cascade continues. Exhausting the list fails with
    /// [`LedgerError::InsufficientBalance`], leaving earlier drains in
    /// place.
    fn withdraw_from_other_accounts(
        &self,
        user: &User,
        exclude_account_id: AccountId,
        mut amount: Decimal,
    ) -> Result<(), LedgerError> {
        for account_id in user.accounts() {
            if account_id == exclude_account_id {
                continue;
            }
            let Ok(account) = self.account(account_id) else {
                continue;
            };

            let mut balance = account.balance_mut();
            if *balance >= amount {
                *balance -= amount;
                drop(balance);
                self.journal.record(Operation::BackupDrained {
                    user: user.id(),
                    account: account_id,
                    amount,
                });
                return Ok(());
            }
            let drained = *balance;
            *balance = Decimal::ZERO;
            drop(balance);
            amount -= drained;
            if drained > Decimal::ZERO {
                self.journal.record(Operation::BackupDrained {
                    user: user.id(),
                    account: account_id,
                    amount: drained,
                });
            }
        }

        Err(LedgerError::InsufficientBalance)
    }

    /// Moves funds between two accounts of the same currency.
    ///
    /// Both exclusive locks are taken in canonical ID order before any
    /// balance is touched, so opposing transfers between the same pair
    /// cannot deadlock. A transfer from an account to itself checks
    /// sufficiency and moves nothing.
    ///
    /// This operation carries no caller identity and performs no permission
    /// check; see DESIGN.md for the rationale.
    pub fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let from = self.account(from_id)?;
        let to = self.account(to_id)?;
        if from.currency() != to.currency() {
            return Err(LedgerError::CurrencyMismatch);
        }

        if from_id == to_id {
            if from.balance() < amount {
                return Err(LedgerError::InsufficientBalance);
            }
        } else {
            let (first, second) = if from_id < to_id {
                (&from, &to)
            } else {
                (&to, &from)
            };
            let mut first_balance = first.balance_mut();
            let mut second_balance = second.balance_mut();
            let (from_balance, to_balance) = if from_id < to_id {
                (&mut *first_balance, &mut *second_balance)
            } else {
                (&mut *second_balance, &mut *first_balance)
            };

            if *from_balance < amount {
                return Err(LedgerError::InsufficientBalance);
            }
            *from_balance -= amount;
            *to_balance += amount;
        }

        self.journal.record(Operation::Transferred {
            from: from_id,
            to: to_id,
            amount,
        });
        Ok(())
    }

    /// Sets the exchange rate for the ordered pair `(from, to)`.
    ///
    /// The opposite direction is a distinct entry and is not derived.
    pub fn set_exchange_rate(&self, from: Currency, to: Currency, rate: Decimal) {
        self.rates.set(from, to, rate);
        self.journal.record(Operation::RateSet { from, to, rate });
    }

    /// Converts funds between two accounts through the configured rate.
    ///
    /// The caller must be authorized for both accounts. `amount` is debited
    /// from the source and `amount * rate` credited to the destination, so
    /// total numeric value is intentionally not conserved. Lock acquisition
    /// follows the same canonical ID order as [`transfer`](Bank::transfer).
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - non-positive amount.
    /// - [`LedgerError::UnauthorizedAccess`] / [`LedgerError::AccountNotExist`] /
    ///   [`LedgerError::UserNotExist`] - from the permission checks.
    /// - [`LedgerError::ExchangeRateNotFound`] - no rate for the ordered
    ///   currency pair.
    /// - [`LedgerError::InsufficientBalance`] - source cannot cover the
    ///   debit.
    pub fn exchange_currency(
        &self,
        user_id: UserId,
        from_id: AccountId,
        to_id: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.check_permissions(user_id, from_id)?;
        self.check_permissions(user_id, to_id)?;

        let from = self.account(from_id)?;
        let to = self.account(to_id)?;
        let rate = self
            .rates
            .get(from.currency(), to.currency())
            .ok_or(LedgerError::ExchangeRateNotFound)?;
        let credited = amount * rate;

        if from_id == to_id {
            // Same account: apply the net of debit and credit in one section.
            let mut balance = from.balance_mut();
            if *balance < amount {
                return Err(LedgerError::InsufficientBalance);
            }
            *balance = *balance - amount + credited;
        } else {
            let (first, second) = if from_id < to_id {
                (&from, &to)
            } else {
                (&to, &from)
            };
            let mut first_balance = first.balance_mut();
            let mut second_balance = second.balance_mut();
            let (from_balance, to_balance) = if from_id < to_id {
                (&mut *first_balance, &mut *second_balance)
            } else {
                (&mut *second_balance, &mut *first_balance)
            };

            if *from_balance < amount {
                return Err(LedgerError::InsufficientBalance);
            }
            *from_balance -= amount;
            *to_balance += credited;
        }

        self.journal.record(Operation::Exchanged {
            from: from_id,
            to: to_id,
            debited: amount,
            credited,
        });
        Ok(())
    }

    /// Returns an iterator over all accounts.
    ///
    /// Useful for generating output reports of account states.
    pub fn accounts(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, AccountId, Arc<Account>>>
    {
        self.accounts.iter()
    }

    /// Retrieves an account by ID.
    ///
    /// Returns `None` if no account exists for the given ID.
    pub fn get_account(&self, account_id: AccountId) -> Option<Arc<Account>> {
        self.accounts
            .get(&account_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// The journal of applied operations.
    pub fn journal(&self) -> &OperationLog {
        &self.journal
    }

    fn account(&self, account_id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.accounts
            .get(&account_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::AccountNotExist)
    }

    fn user(&self, user_id: UserId) -> Result<Arc<User>, LedgerError> {
        self.users
            .get(&user_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::UserNotExist)
    }
}

impl Default for Bank {
    fn default() -> Self {
        Self::new()
    }
}
