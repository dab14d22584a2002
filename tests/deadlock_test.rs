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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! These tests verify the ledger's locking protocol — canonical account-ID
//! ordering for two-account operations and one-lock-at-a-time cascading —
//! under adversarial concurrent schedules.
//!
//! The tests use parking_lot with the `deadlock_detection` feature to
//! automatically detect cycles in the lock graph.

use bank_ledger_rs::{AccountId, Bank, Currency, LedgerError, Role, UserId};
use parking_lot::deadlock;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Fixtures ===

fn bank_with_accounts(count: u32, initial: rust_decimal::Decimal) -> (Arc<Bank>, Vec<AccountId>) {
    let bank = Arc::new(Bank::new());
    bank.create_user(UserId(1), Role::Customer, false);
    let accounts = (0..count)
        .map(|_| {
            bank.create_account(UserId(1), initial, Currency::Usd)
                .unwrap()
        })
        .collect();
    (bank, accounts)
}

// === Tests ===

/// N concurrent transfers alternating direction between the same pair of
/// accounts. Caller-order locking would deadlock here; canonical ordering
/// must let every call complete.
#[test]
fn no_deadlock_opposing_transfers() {
    let detector = start_deadlock_detector();
    let (bank, accounts) = bank_with_accounts(2, dec!(10_000.00));
    let (a, b) = (accounts[0], accounts[1]);

    const NUM_THREADS: usize = 50;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let bank = bank.clone();

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                // Alternate direction per thread and per iteration.
                let (from, to) = if (thread_id + i) % 2 == 0 { (a, b) } else { (b, a) };
                let result = bank.transfer(from, to, dec!(1.00));
                assert!(
                    result.is_ok() || result == Err(LedgerError::InsufficientBalance),
                    "unexpected error: {result:?}"
                );
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // Opposing transfers of equal size conserve the pair's total.
    let total = bank.get_balance(UserId(1), a).unwrap().0 + bank.get_balance(UserId(1), b).unwrap().0;
    assert_eq!(total, dec!(20_000.00));
}

/// Opposing-direction currency exchanges between the same pair.
#[test]
fn no_deadlock_opposing_exchanges() {
    let detector = start_deadlock_detector();
    let bank = Arc::new(Bank::new());
    bank.create_user(UserId(1), Role::ExchangeManager, false);

    let usd = bank
        .create_account(UserId(1), dec!(10_000.00), Currency::Usd)
        .unwrap();
    let eur = bank
        .create_account(UserId(1), dec!(10_000.00), Currency::Eur)
        .unwrap();
    bank.set_exchange_rate(Currency::Usd, Currency::Eur, dec!(0.85));
    bank.set_exchange_rate(Currency::Eur, Currency::Usd, dec!(1.17));

    const NUM_THREADS: usize = 20;
    const OPS_PER_THREAD: usize = 50;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let bank = bank.clone();

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let (from, to) = if (thread_id + i) % 2 == 0 {
                    (usd, eur)
                } else {
                    (eur, usd)
                };
                let result = bank.exchange_currency(UserId(1), from, to, dec!(1.00));
                assert!(
                    result.is_ok() || result == Err(LedgerError::InsufficientBalance),
                    "unexpected error: {result:?}"
                );
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);
}

/// Backup cascades racing transfers over the same account set. The cascade
/// holds one lock at a time, so it must never form a cycle with two-lock
/// transfers.
#[test]
fn no_deadlock_cascade_against_transfers() {
    let detector = start_deadlock_detector();
    let bank = Arc::new(Bank::new());
    bank.create_user(UserId(1), Role::Customer, true);

    let accounts: Vec<AccountId> = (0..4)
        .map(|_| {
            bank.create_account(UserId(1), dec!(1_000.00), Currency::Usd)
                .unwrap()
        })
        .collect();

    const NUM_THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 50;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let bank = bank.clone();
        let accounts = accounts.clone();

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                if thread_id % 2 == 0 {
                    // Oversized withdrawal to force the cascade.
                    let primary = accounts[(thread_id + i) % accounts.len()];
                    let _ = bank.withdraw(UserId(1), primary, dec!(1_500.00));
                } else {
                    let from = accounts[(thread_id + i) % accounts.len()];
                    let to = accounts[(thread_id + i + 1) % accounts.len()];
                    let _ = bank.transfer(from, to, dec!(10.00));
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // Whatever interleaving happened, no balance may be negative.
    for account in accounts {
        let (balance, _) = bank.get_balance(UserId(1), account).unwrap();
        assert!(balance >= dec!(0.00), "negative balance on {account}");
    }
}

/// High contention on a single account with many threads mixing reads and
/// writes.
#[test]
fn no_deadlock_high_contention_single_account() {
    let detector = start_deadlock_detector();
    let (bank, accounts) = bank_with_accounts(1, dec!(1_000.00));
    let account = accounts[0];

    const NUM_THREADS: usize = 50;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for _ in 0..NUM_THREADS {
        let bank = bank.clone();

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                if i % 3 == 0 {
                    bank.deposit(UserId(1), account, dec!(10.00)).unwrap();
                } else if i % 3 == 1 {
                    let _ = bank.withdraw(UserId(1), account, dec!(1.00));
                } else {
                    let _ = bank.get_balance(UserId(1), account);
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let (balance, _) = bank.get_balance(UserId(1), account).unwrap();
    assert!(balance >= dec!(0.00));
}

/// Mixed operations across many accounts while new accounts are created.
#[test]
fn no_deadlock_mixed_operations_with_directory_growth() {
    let detector = start_deadlock_detector();
    let (bank, accounts) = bank_with_accounts(10, dec!(1_000.00));

    const NUM_THREADS: usize = 20;
    const OPS_PER_THREAD: usize = 50;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let bank = bank.clone();
        let accounts = accounts.clone();

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let account = accounts[(thread_id + i) % accounts.len()];
                match i % 4 {
                    0 => {
                        bank.deposit(UserId(1), account, dec!(5.00)).unwrap();
                    }
                    1 => {
                        let _ = bank.withdraw(UserId(1), account, dec!(1.00));
                    }
                    2 => {
                        let other = accounts[(thread_id + i + 1) % accounts.len()];
                        let _ = bank.transfer(account, other, dec!(2.00));
                    }
                    _ => {
                        // Directory mutation interleaved with balance work.
                        let _ = bank.create_account(UserId(1), dec!(1.00), Currency::Usd);
                    }
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);
}
