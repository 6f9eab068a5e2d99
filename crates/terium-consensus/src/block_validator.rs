//! Block validation: proof-of-work, merkle root, coinbase shape, and every
//! contained transaction.

use terium_core::error::ValidationError;
use terium_core::merkle::merkle_root;
use terium_core::types::{Block, Height};

use crate::tx_validator::{self, MempoolSource, UtxoSource};

/// Run `BlockValidator`'s checklist against `block`, assumed to be a
/// candidate for height `current_height` (the height it would occupy once
/// connected — used for coinbase-maturity checks on its non-coinbase
/// transactions).
pub fn validate(
    block: &Block,
    current_height: Height,
    utxos: &impl UtxoSource,
    mempool: &impl MempoolSource,
) -> Result<(), ValidationError> {
    if block.transactions.is_empty() {
        return Err(ValidationError::EmptyBlock);
    }

    if block.header.hash().as_bytes().as_slice() >= block.header.target.as_slice() {
        return Err(ValidationError::InvalidProofOfWork);
    }

    let txids: Vec<_> = block.transactions.iter().map(|tx| tx.txid()).collect();
    if merkle_root(&txids) != block.header.merkle_root {
        return Err(ValidationError::InvalidMerkleRoot);
    }

    if !block.transactions[0].is_coinbase() {
        return Err(ValidationError::MissingCoinbase);
    }

    for tx in block.transactions.iter().skip(1) {
        tx_validator::validate(tx, current_height, utxos, mempool)?;
    }

    Ok(())
}
