//! `Genesis`: mine the height-0 block paying the block reward to a chosen
//! address. Refuses to run if the chain already has a tip.

use tokio::sync::mpsc;
use tracing::info;

use terium_consensus::pow;
use terium_core::constants::fixed_target;
use terium_core::merkle::merkle_root;
use terium_core::script;
use terium_core::types::{Block, BlockHeader, Height, OutPoint, Tx, TxIn, TxOut};

use crate::chain::Blockchain;
use crate::error::NodeError;

/// Mine and append the genesis block, paying `BLOCK_REWARD` to
/// `reward_pubkey_hash`. Errors with [`NodeError::ChainNotEmpty`] if a tip
/// already exists.
pub async fn run_genesis(
    chain: &Blockchain<'_>,
    reward_pubkey_hash: [u8; 20],
    nbits: u32,
    now: impl Fn() -> u32,
) -> Result<Block, NodeError> {
    if !chain.is_empty()? {
        return Err(NodeError::ChainNotEmpty);
    }

    let coinbase = Tx {
        version: 1,
        inputs: vec![TxIn {
            prev_output: OutPoint::coinbase(),
            unlocking_script: vec![0x00],
        }],
        outputs: vec![TxOut {
            value: terium_core::constants::BLOCK_REWARD,
            locking_script: script::pay_to_pubkey_hash(&reward_pubkey_hash),
        }],
        lock_time: 0,
    };
    let merkle = merkle_root(&[coinbase.txid()]);
    let header = BlockHeader {
        version: 1,
        prev_hash: terium_core::types::Hash256::ZERO,
        merkle_root: merkle,
        timestamp: now(),
        target: fixed_target(nbits),
        nonce: 0,
    };

    let (_cancel_tx, cancel_rx) = mpsc::channel(1);
    let solved_header = match pow::mine(header, cancel_rx, None, &now).await {
        pow::MineOutcome::Solved(h) => h,
        pow::MineOutcome::Cancelled => unreachable!("genesis mining is never cancelled"),
    };

    let block = Block {
        header: solved_header,
        transactions: vec![coinbase],
    };
    chain.append(&block, Height::ZERO)?;
    info!(hash = %block.hash(), "genesis block mined");
    Ok(block)
}
