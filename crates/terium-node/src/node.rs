//! The node: composes mining, validation, pool admission, UTXO updates and
//! peer broadcast into the single event loop.
//!
//! All durable-state mutations happen here and only here: validators read
//! the stores but never mutate them, and the miner only ever produces
//! candidate blocks. The UTXO update for
//! an appended block is durable, and tx-index updates complete, before the
//! next event is processed or the block is broadcast outbound.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use terium_consensus::{block_validator, tx_validator};
use terium_core::types::{Block, Height, OutPoint, Tx, Utxo};
use terium_network::Frame;

use crate::block_index::BlockIndex;
use crate::block_store::BlockStore;
use crate::chain::Blockchain;
use crate::error::NodeError;
use crate::mempool::Mempool;
use crate::miner::{Miner, MinerControl};
use crate::tx_index::{TxIndex, TxLocation};
use crate::utxo_store::UtxoStore;

pub fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Owns every durable store and the mempool; the sole mutator of chain
/// state. The miner and peer transport borrow it only through the
/// channels wired up by [`run`].
pub struct Node {
    pub block_store: BlockStore,
    pub block_index: BlockIndex,
    pub tx_index: TxIndex,
    pub utxo_store: UtxoStore,
    pub mempool: Arc<Mempool>,
    pub miner: Arc<Miner>,
}

impl Node {
    pub fn chain(&self) -> Blockchain<'_> {
        Blockchain::new(&self.block_store, &self.block_index)
    }

    /// The chain's current depth: the tip's height, or zero if empty.
    pub fn current_height(&self) -> Result<Height, NodeError> {
        Ok(self.chain().tip_height()?.unwrap_or(Height::ZERO))
    }

    /// The height a block appended right now would occupy.
    pub fn next_height(&self) -> Result<Height, NodeError> {
        Ok(match self.chain().tip_height()? {
            Some(h) => h.succ(),
            None => Height::ZERO,
        })
    }

    /// Sum of referenced UTXO values minus sum of output values — the fee
    /// a non-coinbase transaction pays, computed once at mempool admission
    /// time so the mempool's relational shape (`txid, tx, fee`) can store
    /// it directly.
    fn compute_fee(&self, tx: &Tx) -> Result<i64, NodeError> {
        let mut total_in: i64 = 0;
        for input in &tx.inputs {
            let utxo = self
                .utxo_store
                .get(&input.prev_output)?
                .ok_or(terium_core::error::ValidationError::UtxoMissing(input.prev_output))?;
            total_in = total_in.saturating_add(utxo.value);
        }
        let total_out = tx.total_output_value().unwrap_or(i64::MAX);
        Ok(total_in.saturating_sub(total_out))
    }

    /// The UTXO/tx-index update routine: one UTXO per output, spent inputs
    /// removed (the deliberate "UTXO invalidation on spend" fix noted in
    /// DESIGN NOTES), and a tx-index entry per transaction position.
    fn apply_block(&self, block: &Block, height: Height) -> Result<(), NodeError> {
        for (position, tx) in block.transactions.iter().enumerate() {
            let txid = tx.txid();
            for input in &tx.inputs {
                if !input.prev_output.is_coinbase() {
                    self.utxo_store.remove(&input.prev_output)?;
                }
            }
            for (index, out) in tx.outputs.iter().enumerate() {
                let utxo = Utxo {
                    outpoint: OutPoint {
                        txid,
                        index: index as i32,
                    },
                    value: out.value,
                    locking_script: out.locking_script.clone(),
                    block_height: height,
                    is_coinbase: tx.is_coinbase(),
                };
                self.utxo_store.put(&utxo)?;
            }
            self.tx_index.put(
                &txid,
                &TxLocation {
                    block_hash: block.hash(),
                    block_height: height,
                    position: position as u32,
                },
            )?;
        }
        self.mempool
            .remove_confirmed(block.transactions.iter().map(|tx| tx.txid()));
        Ok(())
    }

    /// **solver-ready**: append the mined block, run the UTXO/tx-index
    /// update, and publish it outbound before returning.
    pub fn handle_solved_block(
        &self,
        block: Block,
        outbound: Option<&mpsc::Sender<Frame>>,
    ) -> Result<(), NodeError> {
        let height = self.next_height()?;
        self.chain().append(&block, height)?;
        self.apply_block(&block, height)?;
        info!(hash = %block.hash(), height = height.as_u64(), "appended self-mined block");
        if let Some(tx) = outbound {
            let _ = tx.try_send(Frame::Block(block));
        }
        Ok(())
    }

    /// **inbound tx**: validate; on failure log and drop; on success
    /// insert into the mempool with its computed fee.
    pub fn handle_inbound_tx(&self, tx: Tx) {
        let height = match self.current_height() {
            Ok(h) => h,
            Err(e) => {
                error!(error = %e, "failed to read chain height, dropping inbound tx");
                return;
            }
        };
        match tx_validator::validate(&tx, height, &self.utxo_store, self.mempool.as_ref()) {
            Ok(()) => match self.compute_fee(&tx) {
                Ok(fee) => {
                    let txid = tx.txid();
                    self.mempool.insert(tx, fee);
                    info!(txid = %txid, fee, "admitted transaction to mempool");
                }
                Err(e) => warn!(error = %e, "dropping tx: fee computation failed"),
            },
            Err(e) => warn!(error = %e, "dropping invalid inbound transaction"),
        }
    }

    /// **inbound block**: validate; on success pause the miner, append,
    /// update state, hand the miner a fresh candidate, then resume it.
    /// Returns whether the block was accepted.
    pub async fn handle_inbound_block(
        &self,
        block: Block,
        miner_control: &MinerControl,
    ) -> Result<bool, NodeError> {
        let height = self.next_height()?;
        if block_validator::validate(&block, height, &self.utxo_store, self.mempool.as_ref()).is_err() {
            warn!(hash = %block.hash(), "rejecting invalid inbound block");
            return Ok(false);
        }

        miner_control.pause().await;
        self.chain().append(&block, height)?;
        self.apply_block(&block, height)?;
        self.miner.reset_candidate(block.hash(), unix_now());
        miner_control.resume().await;
        info!(hash = %block.hash(), height = height.as_u64(), "appended inbound block");
        Ok(true)
    }
}

/// The main event loop: a single selector serializing solver-ready,
/// inbound-tx and inbound-block events. Exits when every input channel is
/// closed, or on the first durable-store failure (store failures are
/// fatal — log and terminate).
pub async fn run(
    node: Arc<Node>,
    mut solved_rx: mpsc::Receiver<Block>,
    mut inbound_tx_rx: mpsc::Receiver<Tx>,
    mut inbound_block_rx: mpsc::Receiver<Block>,
    miner_control: MinerControl,
    outbound_tx: Option<mpsc::Sender<Frame>>,
) {
    loop {
        tokio::select! {
            maybe_block = solved_rx.recv() => {
                let Some(block) = maybe_block else { return };
                if let Err(e) = node.handle_solved_block(block, outbound_tx.as_ref()) {
                    error!(error = %e, "fatal store error applying solved block");
                    return;
                }
            }
            maybe_tx = inbound_tx_rx.recv() => {
                let Some(tx) = maybe_tx else { return };
                node.handle_inbound_tx(tx);
            }
            maybe_block = inbound_block_rx.recv() => {
                let Some(block) = maybe_block else { return };
                if let Err(e) = node.handle_inbound_block(block, &miner_control).await {
                    error!(error = %e, "fatal store error applying inbound block");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terium_core::crypto::{h160, KeyPair};
    use terium_core::script::{self, SIGHASH_ALL};
    use terium_core::types::{BlockHeader, Hash256, TxIn, TxOut};

    fn build_node(tmp: &tempfile::TempDir) -> Node {
        let block_store = BlockStore::open(tmp.path().join("blocks")).unwrap();
        let block_index = BlockIndex::open(tmp.path().join("block_index")).unwrap();
        let tx_index = TxIndex::open(tmp.path().join("tx_index")).unwrap();
        let utxo_store = UtxoStore::open(tmp.path().join("utxo")).unwrap();
        let mempool = Arc::new(Mempool::new());
        let miner = Arc::new(Miner::new([0u8; 20], 1, 0, mempool.clone(), Hash256::ZERO, 1));
        Node {
            block_store,
            block_index,
            tx_index,
            utxo_store,
            mempool,
            miner,
        }
    }

    fn coinbase_block(reward_hash: [u8; 20], prev_hash: Hash256) -> Block {
        let coinbase = Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: OutPoint::coinbase(),
                unlocking_script: vec![0x00],
            }],
            outputs: vec![TxOut {
                value: 100_000,
                locking_script: script::pay_to_pubkey_hash(&reward_hash),
            }],
            lock_time: 0,
        };
        let merkle = terium_core::merkle::merkle_root(&[coinbase.txid()]);
        let mut header = BlockHeader {
            version: 1,
            prev_hash,
            merkle_root: merkle,
            timestamp: 1,
            target: [0xFFu8; 32],
            nonce: 0,
        };
        while header.hash().as_bytes().as_slice() >= header.target.as_slice() {
            header.nonce += 1;
        }
        Block {
            header,
            transactions: vec![coinbase],
        }
    }

    #[test]
    fn handle_solved_block_applies_utxo_and_tx_index_updates() {
        let tmp = tempfile::tempdir().unwrap();
        let node = build_node(&tmp);
        let block = coinbase_block([1u8; 20], Hash256::ZERO);
        node.handle_solved_block(block.clone(), None).unwrap();

        assert_eq!(node.chain().tip_hash().unwrap(), Some(block.hash()));
        let utxo = node
            .utxo_store
            .get(&OutPoint {
                txid: block.transactions[0].txid(),
                index: 0,
            })
            .unwrap()
            .unwrap();
        assert_eq!(utxo.value, 100_000);
        assert!(utxo.is_coinbase);

        let location = node.tx_index.get(&block.transactions[0].txid()).unwrap().unwrap();
        assert_eq!(location.block_hash, block.hash());
        assert_eq!(location.position, 0);
    }

    #[test]
    fn handle_inbound_tx_admits_valid_spend_and_computes_fee() {
        let tmp = tempfile::tempdir().unwrap();
        let node = build_node(&tmp);
        let kp = KeyPair::generate();
        let hash = h160(&kp.public_key().to_der());
        let genesis = coinbase_block(hash, Hash256::ZERO);
        node.handle_solved_block(genesis.clone(), None).unwrap();

        // Advance 100 blocks so the coinbase matures.
        let mut prev = genesis.hash();
        for _ in 0..100 {
            let b = coinbase_block([9u8; 20], prev);
            node.handle_solved_block(b.clone(), None).unwrap();
            prev = b.hash();
        }

        let spent_outpoint = OutPoint {
            txid: genesis.transactions[0].txid(),
            index: 0,
        };
        let utxo = node.utxo_store.get(&spent_outpoint).unwrap().unwrap();
        let mut tx = Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: spent_outpoint,
                unlocking_script: vec![],
            }],
            outputs: vec![TxOut {
                value: 99_000,
                locking_script: vec![],
            }],
            lock_time: 0,
        };
        let preimage = terium_core::crypto::sighash_preimage(&tx, 0, &utxo, SIGHASH_ALL);
        let mut sig = kp.sign(preimage.as_bytes());
        sig.push(SIGHASH_ALL);
        tx.inputs[0].unlocking_script = script::p2pkh_unlocking_script(&sig, &kp.public_key().to_der());

        node.handle_inbound_tx(tx.clone());
        assert!(node.mempool.exists(&tx.txid()));
        // fee = 100_000 - 99_000 = 1_000, well above TX_FEE.
        let top = node.mempool.top_n_by_fee(1);
        assert_eq!(top, vec![tx]);
    }

    #[test]
    fn handle_inbound_tx_drops_invalid_transaction() {
        let tmp = tempfile::tempdir().unwrap();
        let node = build_node(&tmp);
        let tx = Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    txid: Hash256([1u8; 32]),
                    index: 0,
                },
                unlocking_script: vec![],
            }],
            outputs: vec![TxOut {
                value: 10,
                locking_script: vec![],
            }],
            lock_time: 0,
        };
        node.handle_inbound_tx(tx.clone());
        assert!(!node.mempool.exists(&tx.txid()));
    }

    #[tokio::test]
    async fn handle_inbound_block_rejects_invalid_pow() {
        let tmp = tempfile::tempdir().unwrap();
        let node = build_node(&tmp);
        let mut bad_block = coinbase_block([1u8; 20], Hash256::ZERO);
        bad_block.header.target = [0x00u8; 32];
        let (control, _ready_rx, handle) =
            crate::miner::spawn_mining_loop(node.miner.clone(), || Hash256::ZERO, || 1);
        handle.abort();

        let accepted = node.handle_inbound_block(bad_block, &control).await.unwrap();
        assert!(!accepted);
        assert!(node.chain().is_empty().unwrap());
    }
}
