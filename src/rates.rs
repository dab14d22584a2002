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

//! Exchange-rate table.
//!
//! Maps an ordered currency pair to a multiplicative rate. Rates are
//! directed: setting USD→EUR says nothing about EUR→USD, and no inverse or
//! derived rate is ever returned.

use crate::base::Currency;
use dashmap::DashMap;
use rust_decimal::Decimal;

/// Directed currency-pair rate table.
///
/// Entries are created or overwritten by [`set`](Self::set) and never
/// removed.
#[derive(Debug, Default)]
pub struct ExchangeRateTable {
    rates: DashMap<(Currency, Currency), Decimal>,
}

impl ExchangeRateTable {
    pub fn new() -> Self {
        Self {
            rates: DashMap::new(),
        }
    }

    /// Sets the rate for the ordered pair `(from, to)`, overwriting any
    /// previous value.
    pub fn set(&self, from: Currency, to: Currency, rate: Decimal) {
        debug_assert!(rate > Decimal::ZERO);
        self.rates.insert((from, to), rate);
    }

    /// Looks up the rate for the ordered pair `(from, to)`.
    pub fn get(&self, from: Currency, to: Currency) -> Option<Decimal> {
        self.rates.get(&(from, to)).map(|rate| *rate)
    }
}
