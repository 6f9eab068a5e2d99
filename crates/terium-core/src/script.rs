//! The stack-based script interpreter.
//!
//! A single execution context holds the spending transaction, the input
//! index under validation, the UTXO being spent, a byte stack, and a
//! program counter walking the concatenated `unlocking ‖ locking` program.
//! Dispatch is a `match` on a tagged [`OpCode`] rather than an
//! opcode-to-function-pointer table: unknown bytes become a type-checked
//! exhaustive-match failure instead of a missing map entry.

use crate::crypto::{self, h160};
use crate::error::{CryptoError, ScriptError};
use crate::types::{Tx, Utxo};

// Opcode byte values, carried over unchanged from the source revision that
// resolved `OP_VERIFY`/`OP_CHECKSIG` correctly.
pub const OP_OK: u8 = 0x00;
pub const OP_DUP: u8 = 0x02;
pub const OP_HASH160: u8 = 0x03;
pub const OP_EQUALVERIFY: u8 = 0x04;
pub const OP_EQUAL: u8 = 0x05;
pub const OP_VERIFY: u8 = 0x06;
pub const OP_CHECKSIG: u8 = 0x07;
pub const OP_PUSHDATA1: u8 = 0x08;
pub const OP_PUSHDATA2: u8 = 0x09;
pub const OP_PUSHDATA4: u8 = 0x0A;

/// Sighash flag bits, appended as the trailing byte of every signature.
pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Tagged opcode enum used for the `match`-based dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpCode {
    Dup,
    Hash160,
    Equal,
    Verify,
    EqualVerify,
    CheckSig,
    PushData { len_width: usize },
}

impl OpCode {
    fn from_byte(b: u8) -> Option<OpCode> {
        match b {
            OP_DUP => Some(OpCode::Dup),
            OP_HASH160 => Some(OpCode::Hash160),
            OP_EQUAL => Some(OpCode::Equal),
            OP_VERIFY => Some(OpCode::Verify),
            OP_EQUALVERIFY => Some(OpCode::EqualVerify),
            OP_CHECKSIG => Some(OpCode::CheckSig),
            OP_PUSHDATA1 => Some(OpCode::PushData { len_width: 1 }),
            OP_PUSHDATA2 => Some(OpCode::PushData { len_width: 2 }),
            OP_PUSHDATA4 => Some(OpCode::PushData { len_width: 4 }),
            _ => None,
        }
    }
}

/// True for any opcode byte that is a fixed-size, non-push instruction.
pub fn is_known_nonpush_opcode(b: u8) -> bool {
    matches!(
        b,
        OP_DUP | OP_HASH160 | OP_EQUAL | OP_VERIFY | OP_EQUALVERIFY | OP_CHECKSIG
    )
}

/// The big-endian length-prefix width for a push opcode, or `None` if `b`
/// is not a push opcode.
pub fn push_len_width(b: u8) -> Option<usize> {
    match b {
        OP_PUSHDATA1 => Some(1),
        OP_PUSHDATA2 => Some(2),
        OP_PUSHDATA4 => Some(4),
        _ => None,
    }
}

/// The standard pay-to-pubkey-hash locking script:
/// `OP_DUP OP_HASH160 PUSHDATA1(20, hash) OP_EQUALVERIFY OP_CHECKSIG`.
pub fn pay_to_pubkey_hash(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(6 + 20);
    s.push(OP_DUP);
    s.push(OP_HASH160);
    s.push(OP_PUSHDATA1);
    s.push(pubkey_hash.len() as u8);
    s.extend_from_slice(pubkey_hash);
    s.push(OP_EQUALVERIFY);
    s.push(OP_CHECKSIG);
    s
}

/// The unlocking script for a pay-to-pubkey-hash spend:
/// `PUSHDATA1(sig ‖ flag) PUSHDATA1(pubkey DER)`.
pub fn p2pkh_unlocking_script(signature_with_flag: &[u8], pubkey_der: &[u8]) -> Vec<u8> {
    let mut s = Vec::with_capacity(4 + signature_with_flag.len() + pubkey_der.len());
    s.push(OP_PUSHDATA1);
    s.push(signature_with_flag.len() as u8);
    s.extend_from_slice(signature_with_flag);
    s.push(OP_PUSHDATA1);
    s.push(pubkey_der.len() as u8);
    s.extend_from_slice(pubkey_der);
    s
}

/// Result of running a script program to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecResult {
    Ok,
    Fail,
}

/// Execute `unlocking ‖ locking` against the spending transaction and the
/// UTXO it references. Any structural or stack-underflow condition
/// degrades to [`ExecResult::Fail`] rather than propagating an error: a
/// malformed program is simply an invalid spend.
pub fn execute(unlocking: &[u8], locking: &[u8], tx: &Tx, input_index: usize, utxo: &Utxo) -> ExecResult {
    let mut program = Vec::with_capacity(unlocking.len() + locking.len());
    program.extend_from_slice(unlocking);
    program.extend_from_slice(locking);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut pc = 0usize;

    while pc < program.len() {
        let op = program[pc];
        let Some(opcode) = OpCode::from_byte(op) else {
            return ExecResult::Fail;
        };

        match opcode {
            OpCode::PushData { len_width } => {
                if pc + 1 + len_width > program.len() {
                    return ExecResult::Fail;
                }
                let len_bytes = &program[pc + 1..pc + 1 + len_width];
                let len = be_len(len_bytes);
                let data_start = pc + 1 + len_width;
                if data_start + len > program.len() {
                    return ExecResult::Fail;
                }
                stack.push(program[data_start..data_start + len].to_vec());
                pc = data_start + len;
            }
            OpCode::Dup => {
                let Some(top) = stack.last().cloned() else {
                    return ExecResult::Fail;
                };
                stack.push(top);
                pc += 1;
            }
            OpCode::Hash160 => {
                let Some(top) = stack.pop() else {
                    return ExecResult::Fail;
                };
                stack.push(h160(&top).to_vec());
                pc += 1;
            }
            OpCode::Equal => {
                if !op_equal(&mut stack) {
                    return ExecResult::Fail;
                }
                pc += 1;
            }
            OpCode::Verify => {
                if !op_verify(&mut stack) {
                    return ExecResult::Fail;
                }
                pc += 1;
            }
            OpCode::EqualVerify => {
                if !op_equal(&mut stack) || !op_verify(&mut stack) {
                    return ExecResult::Fail;
                }
                pc += 1;
            }
            OpCode::CheckSig => {
                match op_checksig(&mut stack, tx, input_index, utxo) {
                    Ok(truthy) => stack.push(if truthy { vec![0x01] } else { vec![0x00] }),
                    Err(_) => return ExecResult::Fail,
                }
                pc += 1;
            }
        }
    }

    match stack.last() {
        Some(top) if is_truthy(top) => ExecResult::Ok,
        _ => ExecResult::Fail,
    }
}

fn be_len(bytes: &[u8]) -> usize {
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    u64::from_be_bytes(buf) as usize
}

fn is_truthy(value: &[u8]) -> bool {
    !value.is_empty() && value != [0x00]
}

/// `OP_EQUAL`: pop two; push `0x01` if equal else `0x00`.
fn op_equal(stack: &mut Vec<Vec<u8>>) -> bool {
    let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
        return false;
    };
    stack.push(if a == b { vec![0x01] } else { vec![0x00] });
    true
}

/// `OP_VERIFY`: pop; fail if `0x00`.
fn op_verify(stack: &mut Vec<Vec<u8>>) -> bool {
    let Some(top) = stack.pop() else {
        return false;
    };
    is_truthy(&top)
}

/// `OP_CHECKSIG`: pop pubkey, pop (signature‖sighash-flag); recompute the
/// preimage for the flag and verify the ECDSA signature against it.
fn op_checksig(
    stack: &mut Vec<Vec<u8>>,
    tx: &Tx,
    input_index: usize,
    utxo: &Utxo,
) -> Result<bool, ScriptError> {
    let pubkey_der = stack.pop().ok_or(ScriptError::StackUnderflow)?;
    let sig_with_flag = stack.pop().ok_or(ScriptError::StackUnderflow)?;
    if sig_with_flag.is_empty() {
        return Err(ScriptError::StackUnderflow);
    }
    let (sig_der, flag) = sig_with_flag.split_at(sig_with_flag.len() - 1);
    let flag = flag[0];

    let public_key = crypto::PublicKey::from_der(&pubkey_der)
        .map_err(|_: CryptoError| ScriptError::StackUnderflow)?;
    let preimage = crypto::sighash_preimage(tx, input_index, utxo, flag);
    Ok(public_key.verify(preimage.as_bytes(), sig_der).is_ok())
}
