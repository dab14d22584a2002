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

//! Error types for ledger operations.

use thiserror::Error;

/// Ledger operation errors.
///
/// Every error is returned synchronously to the caller; none are retried
/// internally and none leave the ledger unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Account creation with a negative initial deposit
    #[error("initial deposit cannot be negative")]
    NegativeDeposit,

    /// Referenced account ID does not exist
    #[error("account does not exist")]
    AccountNotExist,

    /// Referenced user ID does not exist
    #[error("user does not exist")]
    UserNotExist,

    /// Amount is zero or negative on a value-moving operation
    #[error("amount must be positive")]
    InvalidAmount,

    /// Debit exceeds available funds (after the backup cascade, if any)
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Caller is neither a banker nor the account owner
    #[error("unauthorized access to account")]
    UnauthorizedAccess,

    /// Transfer between accounts of different currencies
    #[error("currency mismatch between accounts")]
    CurrencyMismatch,

    /// No configured rate for the requested currency pair and direction
    #[error("exchange rate not found")]
    ExchangeRateNotFound,
}
