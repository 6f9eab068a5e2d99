//! The miner: builds candidate blocks, drains the mempool by fee, and runs
//! proof-of-work.
//!
//! State: the current candidate block, an owned PoW handle, and
//! two pairs of signals — {stop, resume} pausing/resuming the
//! `MineFromMempool` loop, {ready, reset} reporting a solved block and
//! cancelling an in-flight solve. The miner never touches the block store
//! or UTXO set; it only produces candidates for the node to append.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use terium_consensus::pow;
use terium_core::constants::{fixed_target, BLOCK_REWARD};
use terium_core::merkle::merkle_root;
use terium_core::script;
use terium_core::types::{Block, BlockHeader, Hash256, OutPoint, Tx, TxIn, TxOut};

use crate::mempool::Mempool;

/// How long the mining loop sleeps between mempool polls when it isn't
/// actively solving a candidate.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn coinbase_tx(reward_pubkey_hash: [u8; 20]) -> Tx {
    Tx {
        version: 1,
        inputs: vec![TxIn {
            prev_output: OutPoint::coinbase(),
            unlocking_script: vec![0x00],
        }],
        outputs: vec![TxOut {
            value: BLOCK_REWARD,
            locking_script: script::pay_to_pubkey_hash(&reward_pubkey_hash),
        }],
        lock_time: 0,
    }
}

/// Builds candidate blocks and tracks the miner's current one.
pub struct Miner {
    reward_pubkey_hash: [u8; 20],
    nbits: u32,
    num_tx_in_block: usize,
    mempool: Arc<Mempool>,
    candidate: Mutex<Block>,
}

impl Miner {
    pub fn new(
        reward_pubkey_hash: [u8; 20],
        nbits: u32,
        num_tx_in_block: usize,
        mempool: Arc<Mempool>,
        tip_hash: Hash256,
        now: u32,
    ) -> Miner {
        let candidate = Self::build_candidate(tip_hash, reward_pubkey_hash, nbits, now);
        Miner {
            reward_pubkey_hash,
            nbits,
            num_tx_in_block,
            mempool,
            candidate: Mutex::new(candidate),
        }
    }

    pub fn candidate(&self) -> Block {
        self.candidate.lock().clone()
    }

    /// `CreateBlock(coinbaseScript)`: a header referencing `prev_hash`,
    /// the configured fixed target, `timestamp = now`, and a single
    /// coinbase transaction paying the configured reward to the node's
    /// reward address.
    pub fn create_block(&self, prev_hash: Hash256, now: u32) -> Block {
        Self::build_candidate(prev_hash, self.reward_pubkey_hash, self.nbits, now)
    }

    fn build_candidate(prev_hash: Hash256, reward_pubkey_hash: [u8; 20], nbits: u32, now: u32) -> Block {
        let coinbase = coinbase_tx(reward_pubkey_hash);
        let merkle = merkle_root(&[coinbase.txid()]);
        Block {
            header: BlockHeader {
                version: 1,
                prev_hash,
                merkle_root: merkle,
                timestamp: now,
                target: fixed_target(nbits),
                nonce: 0,
            },
            transactions: vec![coinbase],
        }
    }

    /// Replace the tracked candidate with a fresh coinbase-only block on
    /// top of `prev_hash` — what the node does right after appending a
    /// block, whether self-mined or received from a peer.
    pub fn reset_candidate(&self, prev_hash: Hash256, now: u32) -> Block {
        let fresh = self.create_block(prev_hash, now);
        *self.candidate.lock() = fresh.clone();
        fresh
    }

    /// Drain exactly `num_tx_in_block` fee-ranked mempool transactions
    /// into a fresh candidate on top of `prev_hash`, recomputing the
    /// merkle root. Returns `None` (and leaves the candidate unchanged)
    /// unless the mempool holds exactly that many — the literal
    /// "when exactly `NumTxInBlock` are available" gate.
    pub fn fill_from_mempool(&self, prev_hash: Hash256, now: u32) -> Option<Block> {
        let txs = self.mempool.top_n_by_fee(self.num_tx_in_block);
        if txs.len() != self.num_tx_in_block {
            return None;
        }
        let mut block = self.create_block(prev_hash, now);
        block.transactions.extend(txs);
        block.header.merkle_root =
            merkle_root(&block.transactions.iter().map(|tx| tx.txid()).collect::<Vec<_>>());
        *self.candidate.lock() = block.clone();
        Some(block)
    }
}

/// A handle the node holds to pause and resume the mining loop.
pub struct MinerControl {
    stop_tx: mpsc::Sender<()>,
    resume_tx: mpsc::Sender<()>,
    current_reset: Arc<Mutex<Option<mpsc::Sender<()>>>>,
}

impl MinerControl {
    /// Send `stop` on the mine channel and `reset` on the solve channel,
    /// cancelling whatever nonce search is currently in flight.
    pub async fn pause(&self) {
        let _ = self.stop_tx.send(()).await;
        let reset = self.current_reset.lock().clone();
        if let Some(reset) = reset {
            let _ = reset.send(()).await;
        }
    }

    /// Send `resume` on the resume channel, releasing the loop from its
    /// paused wait.
    pub async fn resume(&self) {
        let _ = self.resume_tx.send(()).await;
    }
}

/// Spawn the `MineFromMempool` loop as a background task. `tip` and `now`
/// are read fresh on every iteration so a concurrently appended block (an
/// inbound peer block accepted by the node) is reflected in the next
/// candidate without restarting the task. Every solved block is sent on
/// the returned `ready` channel; the node owns appending it to the chain.
pub fn spawn_mining_loop(
    miner: Arc<Miner>,
    tip: impl Fn() -> Hash256 + Send + Sync + 'static,
    now: impl Fn() -> u32 + Send + Sync + 'static,
) -> (MinerControl, mpsc::Receiver<Block>, JoinHandle<()>) {
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(4);
    let (resume_tx, mut resume_rx) = mpsc::channel::<()>(4);
    let (ready_tx, ready_rx) = mpsc::channel::<Block>(4);
    let current_reset = Arc::new(Mutex::new(None));
    let current_reset_for_loop = current_reset.clone();

    let handle = tokio::spawn(async move {
        loop {
            if stop_rx.try_recv().is_ok() {
                debug!("mining loop paused, waiting for resume");
                if resume_rx.recv().await.is_none() {
                    return;
                }
                continue;
            }

            tokio::time::sleep(POLL_INTERVAL).await;

            let prev_hash = tip();
            let Some(candidate) = miner.fill_from_mempool(prev_hash, now()) else {
                continue;
            };

            let (reset_tx, reset_rx) = mpsc::channel::<()>(1);
            *current_reset_for_loop.lock() = Some(reset_tx);

            match pow::mine(candidate.header.clone(), reset_rx, None, &now).await {
                pow::MineOutcome::Solved(header) => {
                    let mut solved = candidate;
                    solved.header = header;
                    info!(hash = %solved.hash(), "candidate solved");
                    if ready_tx.send(solved).await.is_err() {
                        return;
                    }
                }
                pow::MineOutcome::Cancelled => {
                    debug!("solve cancelled, rebuilding candidate next iteration");
                }
            }
            *current_reset_for_loop.lock() = None;
        }
    });

    (
        MinerControl {
            stop_tx,
            resume_tx,
            current_reset,
        },
        ready_rx,
        handle,
    )
}
