//! Fixtures shared across the end-to-end scenarios: a node backed by a
//! temp directory, an easy-target coinbase block builder, and a signed
//! P2PKH spend builder.

use std::sync::Arc;

use terium_core::crypto::{sighash_preimage, KeyPair};
use terium_core::merkle::merkle_root;
use terium_core::script::{self, SIGHASH_ALL};
use terium_core::types::{Block, BlockHeader, Hash256, OutPoint, Tx, TxIn, TxOut, Utxo};
use terium_node::block_index::BlockIndex;
use terium_node::block_store::BlockStore;
use terium_node::mempool::Mempool;
use terium_node::miner::Miner;
use terium_node::node::Node;
use terium_node::tx_index::TxIndex;
use terium_node::utxo_store::UtxoStore;

pub fn build_node(tmp: &tempfile::TempDir) -> Node {
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

/// A coinbase-only block paying `value` to `reward_hash`, mined against an
/// easy all-ones target so tests don't spin searching for a nonce.
pub fn coinbase_block(reward_hash: [u8; 20], value: i64, prev_hash: Hash256) -> Block {
    let coinbase = Tx {
        version: 1,
        inputs: vec![TxIn {
            prev_output: OutPoint::coinbase(),
            unlocking_script: vec![0x00],
        }],
        outputs: vec![TxOut {
            value,
            locking_script: script::pay_to_pubkey_hash(&reward_hash),
        }],
        lock_time: 0,
    };
    let merkle = merkle_root(&[coinbase.txid()]);
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

/// A single-input, single-output P2PKH spend of `utxo`, signed under
/// `SIGHASH_ALL` by `keypair`.
pub fn spend(utxo: &Utxo, keypair: &KeyPair, to_hash: [u8; 20], amount: i64) -> Tx {
    let mut tx = Tx {
        version: 1,
        inputs: vec![TxIn {
            prev_output: utxo.outpoint,
            unlocking_script: vec![],
        }],
        outputs: vec![TxOut {
            value: amount,
            locking_script: script::pay_to_pubkey_hash(&to_hash),
        }],
        lock_time: 0,
    };
    let preimage = sighash_preimage(&tx, 0, utxo, SIGHASH_ALL);
    let mut sig = keypair.sign(preimage.as_bytes());
    sig.push(SIGHASH_ALL);
    tx.inputs[0].unlocking_script = script::p2pkh_unlocking_script(&sig, &keypair.public_key().to_der());
    tx
}
