//! Benchmark suite for the ledger engine and the replay strategies
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Replay inputs are generated into temporary files before measuring: every
//! owner opens an account, receives deposits, and transfers to its neighbour,
//! so the concurrent strategy sees a mix of independent and linked groups.

use ledger_engine::cli::StrategyType;
use ledger_engine::config::EngineConfig;
use ledger_engine::core::{CreateAccount, LedgerEngine, MovementRequest, TransferRequest};
use ledger_engine::strategy::{create_strategy, BatchConfig};
use ledger_engine::types::{AccountId, OwnerId};
use rust_decimal::Decimal;
use std::io::Write;
use tempfile::NamedTempFile;

fn main() {
    divan::main();
}

const SIZES: [usize; 3] = [100, 1_000, 10_000];

/// Write a replay file of roughly `commands` rows spread over `commands / 10` owners
fn replay_file(commands: usize) -> NamedTempFile {
    let owners: Vec<OwnerId> = (0..(commands / 10).max(2))
        .map(|i| OwnerId::from_uuid(uuid::Uuid::from_u128(i as u128 + 1)))
        .collect();

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "op,owner,target,amount,currency,reference,remarks").unwrap();
    for owner in &owners {
        writeln!(file, "open,{},,,,,", owner).unwrap();
    }
    for row in 0..commands.saturating_sub(owners.len()) {
        let owner = owners[row % owners.len()];
        match row % 4 {
            0 | 1 => writeln!(file, "deposit,{},,10.5,,,", owner).unwrap(),
            2 => writeln!(file, "withdraw,{},,3,,,", owner).unwrap(),
            _ => {
                let target = owners[(row + 1) % owners.len()];
                writeln!(file, "transfer,{},{},2.25,,,", owner, target).unwrap()
            }
        }
    }
    file.flush().expect("Failed to flush temp file");
    file
}

#[divan::bench(args = SIZES)]
fn sequential_replay(bencher: divan::Bencher, commands: usize) {
    let file = replay_file(commands);
    bencher.bench_local(|| {
        let strategy = create_strategy(StrategyType::Sequential, EngineConfig::default(), None);
        let mut output = Vec::new();
        strategy
            .process(file.path(), &mut output)
            .expect("Replay failed");
    });
}

#[divan::bench(args = SIZES)]
fn concurrent_replay(bencher: divan::Bencher, commands: usize) {
    let file = replay_file(commands);
    bencher.bench_local(|| {
        let strategy = create_strategy(
            StrategyType::Concurrent,
            EngineConfig::default(),
            Some(BatchConfig::default()),
        );
        let mut output = Vec::new();
        strategy
            .process(file.path(), &mut output)
            .expect("Replay failed");
    });
}

fn open(engine: &LedgerEngine) -> AccountId {
    engine
        .create_account(CreateAccount {
            owner_id: Some(OwnerId::new()),
            currency: None,
        })
        .expect("Failed to open account")
        .id
}

#[divan::bench]
fn deposit(bencher: divan::Bencher) {
    let engine = LedgerEngine::in_memory(EngineConfig::default());
    let account = open(&engine);
    bencher.bench_local(|| {
        engine
            .deposit(account, MovementRequest::new(Decimal::ONE))
            .expect("Deposit failed");
    });
}

#[divan::bench]
fn deposit_with_key(bencher: divan::Bencher) {
    let engine = LedgerEngine::in_memory(EngineConfig::default());
    let account = open(&engine);
    let mut n = 0u64;
    bencher.bench_local(|| {
        n += 1;
        engine
            .deposit(
                account,
                MovementRequest::new(Decimal::ONE).with_key(format!("bench-{}", n)),
            )
            .expect("Deposit failed");
    });
}

#[divan::bench(threads = [1, 4])]
fn opposing_transfers(bencher: divan::Bencher) {
    let engine = LedgerEngine::in_memory(EngineConfig::default());
    let a = open(&engine);
    let b = open(&engine);
    for account in [a, b] {
        engine
            .deposit(account, MovementRequest::new(Decimal::new(1_000_000, 0)))
            .expect("Deposit failed");
    }

    bencher.bench(|| {
        let forward = engine.transfer(TransferRequest {
            from: a,
            to: b,
            amount: Decimal::ONE,
            remarks: None,
        });
        let back = engine.transfer(TransferRequest {
            from: b,
            to: a,
            amount: Decimal::ONE,
            remarks: None,
        });
        divan::black_box((forward, back))
    });
}
