//! Transaction validation: the checklist a transaction must pass to enter
//! the mempool or be included in a block.
//!
//! Checks run in order and fail on the first false, matching the ordering
//! a reviewer would expect from a spend-validity checklist: structural
//! shape first, then per-input UTXO and value checks, then maturity,
//! then script grammar, mempool membership, and finally script execution.

use terium_core::codec::validate_script_grammar;
use terium_core::constants::{COINBASE_MATURITY, TX_FEE};
use terium_core::error::ValidationError;
use terium_core::script::{self, ExecResult};
use terium_core::types::{Height, Tx, Utxo};

/// Looks up an unspent output by its outpoint. Implemented by the UTXO
/// store in `terium-node`; validators never mutate what they read.
pub trait UtxoSource {
    fn get(&self, outpoint: &terium_core::types::OutPoint) -> Option<Utxo>;
}

/// Checks whether a transaction id is already present in the mempool.
pub trait MempoolSource {
    fn contains(&self, txid: &terium_core::types::Hash256) -> bool;
}

/// Run every check in `TxValidator`'s ordered checklist against a
/// non-coinbase transaction.
pub fn validate(
    tx: &Tx,
    current_height: Height,
    utxos: &impl UtxoSource,
    mempool: &impl MempoolSource,
) -> Result<(), ValidationError> {
    // 1. At least one input and one output.
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(ValidationError::EmptyInputsOrOutputs);
    }

    // 2. No reserved (coinbase) outpoints among inputs.
    if tx.inputs.iter().any(|input| input.prev_output.is_coinbase()) {
        return Err(ValidationError::UnexpectedCoinbaseInput);
    }

    // 3. Referenced UTXOs exist; per-input value conservation; total
    //    inputs cover total outputs plus the fixed network fee.
    let mut resolved = Vec::with_capacity(tx.inputs.len());
    let mut total_input_value: i64 = 0;
    for (index, input) in tx.inputs.iter().enumerate() {
        let utxo = utxos
            .get(&input.prev_output)
            .ok_or(ValidationError::UtxoMissing(input.prev_output))?;
        if let Some(out) = tx.outputs.get(index) {
            if out.value > utxo.value {
                return Err(ValidationError::ValueExceedsUtxo { index });
            }
        }
        total_input_value = total_input_value.saturating_add(utxo.value);
        resolved.push(utxo);
    }
    let total_output_value = tx
        .total_output_value()
        .ok_or(ValidationError::InsufficientFee)?;
    if total_input_value < total_output_value.saturating_add(TX_FEE) {
        return Err(ValidationError::InsufficientFee);
    }

    // 4. Coinbase inputs must be mature.
    for (index, utxo) in resolved.iter().enumerate() {
        if !utxo.is_mature(current_height, COINBASE_MATURITY) {
            return Err(ValidationError::ImmatureCoinbase { index });
        }
    }

    // 5. Each unlocking script parses under the push grammar.
    for (index, input) in tx.inputs.iter().enumerate() {
        if validate_script_grammar(&input.unlocking_script).is_err() {
            return Err(ValidationError::BadUnlockingScript { index });
        }
    }

    // 6. Not already in the mempool.
    if mempool.contains(&tx.txid()) {
        return Err(ValidationError::AlreadyInMempool);
    }

    // 7. Every referenced outpoint is present in the UTXO store.
    for input in &tx.inputs {
        if utxos.get(&input.prev_output).is_none() {
            return Err(ValidationError::UtxoMissing(input.prev_output));
        }
    }

    // 8. Script execution must return OK for every input.
    for (index, input) in tx.inputs.iter().enumerate() {
        let utxo = &resolved[index];
        let result = script::execute(
            &input.unlocking_script,
            &utxo.locking_script,
            tx,
            index,
            utxo,
        );
        if result != ExecResult::Ok {
            return Err(ValidationError::ScriptFailed { index });
        }
    }

    Ok(())
}
