//! Concurrency and invariant tests
//!
//! These tests drive one shared engine from many threads at once and then
//! check the ledger invariants through the monitor:
//! - no lost updates under concurrent deposits
//! - withdrawals never overdraw the balance
//! - opposing transfers neither deadlock nor leak money
//! - a key or a reversal is applied at most once under contention
//! - every account reconciles with its entries
//! - readers never observe a half-applied transfer

#[cfg(test)]
mod tests {
    use ledger_engine::config::EngineConfig;
    use ledger_engine::core::{
        CreateAccount, LedgerEngine, LedgerMonitor, MovementRequest, TransferRequest,
    };
    use ledger_engine::types::{AccountId, EntryType, ErrorKind, OwnerId};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn open(engine: &LedgerEngine) -> AccountId {
        engine
            .create_account(CreateAccount {
                owner_id: Some(OwnerId::new()),
                currency: Some("USD".to_string()),
            })
            .unwrap()
            .id
    }

    fn funded(engine: &LedgerEngine, amount: &str) -> AccountId {
        let id = open(engine);
        engine.deposit(id, MovementRequest::new(dec(amount))).unwrap();
        id
    }

    /// Run `threads` copies of `work` released together by a barrier
    fn run_concurrently<T, F>(threads: usize, work: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        let barrier = Arc::new(Barrier::new(threads));
        let work = Arc::new(work);

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                let work = Arc::clone(&work);
                thread::spawn(move || {
                    barrier.wait();
                    work(i)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect()
    }

    fn assert_reconciled(engine: &LedgerEngine, accounts: &[AccountId]) {
        let monitor = LedgerMonitor::new(engine.clone());
        for account in accounts {
            let report = monitor.reconcile(*account).unwrap();
            assert!(report.is_consistent(), "{:?}", report);
            assert!(report.stored_balance >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_concurrent_deposits_lose_no_updates() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let account = funded(&engine, "10");

        let worker = engine.clone();
        let results = run_concurrently(16, move |i| {
            worker.deposit(
                account,
                MovementRequest::new(dec("12.5")).with_key(format!("dep-{}", i)),
            )
        });

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(engine.get_balance(account).unwrap(), dec("210"));
        assert_eq!(
            LedgerMonitor::new(engine.clone()).entry_count(account),
            17
        );
        assert_reconciled(&engine, &[account]);
    }

    #[test]
    fn test_concurrent_withdrawals_stop_at_sustainable_count() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let account = funded(&engine, "1000.00");

        let worker = engine.clone();
        let results = run_concurrently(5, move |_| {
            worker.withdraw(account, MovementRequest::new(dec("300.00")))
        });

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::InsufficientFunds))
            .count();
        assert_eq!((succeeded, insufficient), (3, 2));
        assert_eq!(engine.get_balance(account).unwrap(), dec("100.00"));
        assert_reconciled(&engine, &[account]);
    }

    #[test]
    fn test_same_key_under_contention_applies_once() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let account = open(&engine);

        let worker = engine.clone();
        let results = run_concurrently(8, move |_| {
            worker.deposit(account, MovementRequest::new(dec("100")).with_key("once"))
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::DuplicateTransaction));
        assert_eq!(engine.get_balance(account).unwrap(), dec("100"));
        assert_reconciled(&engine, &[account]);
    }

    #[test]
    fn test_reversal_under_contention_applies_once() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let account = funded(&engine, "50");
        let entry = engine
            .deposit(account, MovementRequest::new(dec("100")))
            .unwrap();

        let worker = engine.clone();
        let results = run_concurrently(4, move |_| worker.reverse(entry.id));

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::DuplicateTransaction));
        assert_eq!(engine.get_balance(account).unwrap(), dec("50"));
        assert_eq!(engine.related_entries(entry.id).unwrap().len(), 1);
        assert_reconciled(&engine, &[account]);
    }

    #[test]
    fn test_opposing_transfers_do_not_deadlock() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let a = funded(&engine, "1000");
        let b = funded(&engine, "1000");

        let worker = engine.clone();
        let results = run_concurrently(8, move |i| {
            let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
            (0..50)
                .map(|_| {
                    worker.transfer(TransferRequest {
                        from,
                        to,
                        amount: dec("1.25"),
                        remarks: None,
                    })
                })
                .filter(Result::is_ok)
                .count()
        });

        // balances never get close to zero, so every transfer must succeed
        assert_eq!(results.iter().sum::<usize>(), 400);
        assert_eq!(engine.get_balance(a).unwrap(), dec("1000"));
        assert_eq!(engine.get_balance(b).unwrap(), dec("1000"));
        assert_reconciled(&engine, &[a, b]);
    }

    #[test]
    fn test_readers_never_see_half_applied_transfer() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let a = funded(&engine, "1000");
        let b = funded(&engine, "1000");
        let monitor = LedgerMonitor::new(engine.clone());

        let writers: Vec<_> = [(a, b), (b, a)]
            .into_iter()
            .map(|(from, to)| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        engine
                            .transfer(TransferRequest {
                                from,
                                to,
                                amount: dec("1.00"),
                                remarks: None,
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        let mut reads = 0usize;
        let mut torn = 0usize;
        let mut inconsistent = 0usize;
        while reads == 0 || writers.iter().any(|writer| !writer.is_finished()) {
            if monitor.total_balance() != dec("2000") {
                torn += 1;
            }
            if reads % 50 == 0 {
                for account in [a, b] {
                    if !monitor.reconcile(account).unwrap().is_consistent() {
                        inconsistent += 1;
                    }
                }
            }
            reads += 1;
        }
        for writer in writers {
            writer.join().expect("writer panicked");
        }

        assert_eq!((torn, inconsistent), (0, 0), "after {} reads", reads);
        assert_eq!(monitor.total_balance(), dec("2000"));
        assert_reconciled(&engine, &[a, b]);
    }

    #[test]
    fn test_ring_transfers_conserve_total() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let ring: Vec<AccountId> = ["40", "0", "15.5", "7"]
            .iter()
            .map(|amount| {
                if *amount == "0" {
                    open(&engine)
                } else {
                    funded(&engine, amount)
                }
            })
            .collect();
        let before = LedgerMonitor::new(engine.clone()).total_balance();

        let worker = engine.clone();
        let accounts = ring.clone();
        run_concurrently(4, move |i| {
            for round in 0..25 {
                let amount = Decimal::new(((i + round) % 7 + 1) as i64 * 125, 2);
                // failures (insufficient funds) are expected and change nothing
                let _ = worker.transfer(TransferRequest {
                    from: accounts[i],
                    to: accounts[(i + 1) % accounts.len()],
                    amount,
                    remarks: Some(format!("round {}", round)),
                });
            }
        });

        let monitor = LedgerMonitor::new(engine.clone());
        assert_eq!(monitor.total_balance(), before);
        assert_reconciled(&engine, &ring);
    }

    #[test]
    fn test_transfer_scenario_links_both_legs() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let a = funded(&engine, "1000.00");
        let b = funded(&engine, "500.00");

        let receipt = engine
            .transfer(TransferRequest {
                from: a,
                to: b,
                amount: dec("200.00"),
                remarks: Some("invoice".to_string()),
            })
            .unwrap();

        assert_eq!(engine.get_balance(a).unwrap(), dec("800.00"));
        assert_eq!(engine.get_balance(b).unwrap(), dec("700.00"));
        assert_eq!(receipt.debit.entry_type, EntryType::TransferOut);
        assert_eq!(receipt.credit.entry_type, EntryType::TransferIn);
        assert_eq!(receipt.debit.related_entry_id, Some(receipt.credit.id));
        assert_eq!(receipt.credit.related_entry_id, Some(receipt.debit.id));

        let err = engine
            .transfer(TransferRequest {
                from: b,
                to: a,
                amount: dec("700.01"),
                remarks: None,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(engine.get_balance(a).unwrap(), dec("800.00"));
        assert_eq!(engine.get_balance(b).unwrap(), dec("700.00"));
        assert_reconciled(&engine, &[a, b]);
    }
}
