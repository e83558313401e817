//! Concurrent batch replay strategy
//!
//! Multi-threaded implementation of the ReplayStrategy trait. Commands are read
//! in batches and each batch is split into independent groups that run in
//! parallel against one shared ledger engine.
//!
//! # Architecture
//!
//! ```text
//! ConcurrentReplay
//!     ├── BatchConfig (batch_size, workers)
//!     ├── CommandReader::next_batch (batch CSV reading)
//!     ├── partition_commands (owner / reference grouping)
//!     └── LedgerEngine (shared, row-locked account state)
//! ```
//!
//! # Ordering
//!
//! - Batches are processed one after another, so file order holds across batches
//! - Two commands land in the same group when they touch a common owner or
//!   name a common idempotency reference; groups are closed transitively
//! - A group is applied sequentially in file order on a blocking worker
//!
//! Groups never share an account or a caller-supplied key, which makes the
//! final account state identical to a sequential replay of the same file.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::{AccountStore, LedgerEngine, LedgerStore};
use crate::io::csv_format::write_accounts_csv;
use crate::io::{CommandReader, NumberedCommand};
use crate::strategy::{apply_logged, ReplayStrategy};
use crate::types::{LedgerCommand, OwnerId};

/// Configuration for batch processing
///
/// Controls how commands are batched and the number of worker threads used
/// for the groups of each batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of worker threads
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            workers: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, workers: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                invalid = batch_size,
                fallback = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let workers = if workers == 0 {
            warn!(
                invalid = workers,
                fallback = default.workers,
                "invalid workers, using default"
            );
            default.workers
        } else {
            workers
        };

        Self {
            batch_size,
            workers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Owner(OwnerId),
    Reference(String),
}

fn group_keys(command: &LedgerCommand) -> Vec<GroupKey> {
    let mut keys: Vec<GroupKey> = command.owners().into_iter().map(GroupKey::Owner).collect();
    match command {
        LedgerCommand::Deposit {
            reference: Some(reference),
            ..
        }
        | LedgerCommand::Withdraw {
            reference: Some(reference),
            ..
        }
        | LedgerCommand::Reverse { reference, .. } => {
            keys.push(GroupKey::Reference(reference.trim().to_string()))
        }
        _ => {}
    }
    keys
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        // keep the earlier command as root so groups sort by first appearance
        parent[ra.max(rb)] = ra.min(rb);
    }
}

/// Partition a batch into independent groups of commands
///
/// # Guarantees
///
/// - Each command appears in exactly one group
/// - Commands inside a group keep their original relative order
/// - No owner and no idempotency reference appears in two groups
/// - Groups are ordered by the position of their first command
pub fn partition_commands(batch: Vec<NumberedCommand>) -> Vec<Vec<NumberedCommand>> {
    let mut parent: Vec<usize> = (0..batch.len()).collect();
    let mut first_seen: HashMap<GroupKey, usize> = HashMap::new();

    for (index, (_, command)) in batch.iter().enumerate() {
        for key in group_keys(command) {
            match first_seen.entry(key) {
                Entry::Occupied(seen) => union(&mut parent, *seen.get(), index),
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
        }
    }

    let mut slots: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<NumberedCommand>> = Vec::new();
    for (index, command) in batch.into_iter().enumerate() {
        let root = find(&mut parent, index);
        let slot = *slots.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(command);
    }

    groups
}

/// Replay one batch and wait until every group has finished
///
/// Each group runs on the blocking pool, since engine operations wait on row
/// locks. Returns an error only if a worker panicked.
///
/// # Returns
///
/// The number of commands that were applied.
pub async fn replay_batch<A, L>(
    engine: &LedgerEngine<A, L>,
    batch: Vec<NumberedCommand>,
) -> Result<usize, String>
where
    A: AccountStore + 'static,
    L: LedgerStore + 'static,
{
    let tasks = partition_commands(batch).into_iter().map(|group| {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || {
            group
                .iter()
                .filter(|(line, command)| apply_logged(&engine, *line, command))
                .count()
        })
    });

    let mut applied = 0;
    for result in futures::future::join_all(tasks).await {
        applied += result.map_err(|e| format!("Replay worker failed: {}", e))?;
    }
    Ok(applied)
}

/// Concurrent batch replay strategy
///
/// # Thread Safety
///
/// ConcurrentReplay is Send + Sync. Each replay builds one engine and shares
/// clones of it (Arc-backed stores) with the blocking workers.
#[derive(Debug, Clone)]
pub struct ConcurrentReplay {
    engine_config: EngineConfig,
    batch: BatchConfig,
}

impl ConcurrentReplay {
    /// Create a new ConcurrentReplay
    ///
    /// # Arguments
    ///
    /// * `engine_config` - Configuration of the engine the replay builds
    /// * `batch` - BatchConfig with batch_size and workers
    pub fn new(engine_config: EngineConfig, batch: BatchConfig) -> Self {
        Self {
            engine_config,
            batch,
        }
    }
}

impl ReplayStrategy for ConcurrentReplay {
    /// Replay commands batch by batch with parallel groups
    ///
    /// 1. Creates a tokio multi-threaded runtime sized by `workers`
    /// 2. Reads a batch through `CommandReader::next_batch`
    /// 3. Hands it to `replay_batch`, which partitions it with
    ///    `partition_commands` and runs every group on `spawn_blocking`
    /// 4. Waits for the whole batch before reading the next one
    /// 5. Repeats until the input is exhausted, then writes the accounts
    ///
    /// Fatal errors (file not found, runtime errors, a panicked worker) are
    /// returned. Rejected commands are logged and replay continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.batch.workers)
            .max_blocking_threads(self.batch.workers)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let engine = LedgerEngine::in_memory(self.engine_config.clone());
        let mut reader = CommandReader::new(input_path)?;

        runtime.block_on(async {
            let mut batches = 0usize;
            let mut applied = 0usize;
            loop {
                let (batch, errors) = reader.next_batch(self.batch.batch_size);
                for error in &errors {
                    warn!(error = %error, "skipping malformed row");
                }
                // next_batch only comes back short at end of input
                if batch.is_empty() {
                    break;
                }

                batches += 1;
                debug!(batch = batches, commands = batch.len(), "dispatching batch");
                applied += replay_batch(&engine, batch).await?;
            }

            info!(batches, applied, "concurrent replay finished");
            Ok::<(), String>(())
        })?;

        write_accounts_csv(&engine.snapshot(|accounts, _| accounts.all()), output)
    }
}
