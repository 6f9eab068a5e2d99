//! The on-chain data model: hashes, outpoints, transactions, blocks, UTXOs.
//!
//! Field layouts follow `DATA MODEL` exactly: signed 32-bit outpoint index,
//! big-endian integers throughout, a fixed 32-byte target encoding, and a
//! 256-bit (32-byte) block-index height rather than a machine word, so that
//! height durably orders chains longer than 2^64 blocks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::h256;

/// A 32-byte double-SHA-256 digest, used for tx ids, block hashes and the
/// merkle root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Hash256> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Some(Hash256(out))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A 256-bit unsigned integer stored big-endian, used for block-index
/// height. Ordering on the byte array is lexicographic, which is exactly
/// magnitude ordering for a big-endian unsigned integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Height(pub [u8; 32]);

impl Height {
    pub const ZERO: Height = Height([0u8; 32]);

    pub fn from_u64(n: u64) -> Height {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&n.to_be_bytes());
        Height(out)
    }

    /// Truncating view as a `u64`, sufficient for any realistic chain length.
    pub fn as_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[24..]);
        u64::from_be_bytes(buf)
    }

    pub fn add_u32(&self, n: u32) -> Height {
        let mut out = self.0;
        let mut carry = n;
        for byte in out.iter_mut().rev() {
            if carry == 0 {
                break;
            }
            let sum = *byte as u32 + (carry & 0xFF);
            *byte = sum as u8;
            carry = (carry >> 8) + (sum >> 8);
        }
        Height(out)
    }

    pub fn succ(&self) -> Height {
        self.add_u32(1)
    }
}

impl fmt::Debug for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Height({})", self.as_u64())
    }
}

/// (txid, output index) uniquely identifying a UTXO. The reserved outpoint
/// (all-zero txid, index = -1) denotes a coinbase input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: i32,
}

impl OutPoint {
    pub const COINBASE_INDEX: i32 = -1;

    pub fn coinbase() -> OutPoint {
        OutPoint {
            txid: Hash256::ZERO,
            index: Self::COINBASE_INDEX,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.txid.is_zero() && self.index == Self::COINBASE_INDEX
    }
}

/// A transaction output: an amount locked by a script.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxOut {
    pub value: i64,
    pub locking_script: Vec<u8>,
}

/// A transaction input: a reference to a prior output plus its unlocking
/// script (empty/placeholder for a coinbase).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxIn {
    pub prev_output: OutPoint,
    pub unlocking_script: Vec<u8>,
}

/// A transaction: `numInputs`/`numOutputs` are derived from the vector
/// lengths at encode time rather than stored as independent fields, so the
/// invariant `numInputs == len(inputs)` cannot drift.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Tx {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Tx {
    /// Double-SHA-256 of the canonical serialization.
    pub fn txid(&self) -> Hash256 {
        let bytes = crate::codec::encode_tx(self);
        h256(&bytes)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_output.is_coinbase()
    }

    pub fn total_output_value(&self) -> Option<i64> {
        self.outputs
            .iter()
            .try_fold(0i64, |sum, out| sum.checked_add(out.value))
    }
}

/// An unspent output as held in the UTXO store. `block_height`/`is_coinbase`
/// ride alongside the bare outpoint/value/script so the coinbase-maturity
/// check does not require a tx-index round trip per spent input.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub value: i64,
    pub locking_script: Vec<u8>,
    pub block_height: Height,
    pub is_coinbase: bool,
}

impl Utxo {
    pub fn is_mature(&self, current_height: Height, coinbase_maturity: u32) -> bool {
        if !self.is_coinbase {
            return true;
        }
        current_height >= self.block_height.add_u32(coinbase_maturity)
    }
}

/// A block header: the 80 conceptual bytes of version/prevHash/merkleRoot/
/// timestamp/nonce, plus a fixed 32-byte target (resolving the
/// "target field width" source ambiguity in favor of a 256-bit integer).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub target: [u8; 32],
    pub nonce: u32,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash256 {
        let bytes = crate::codec::encode_header(self);
        h256(&bytes)
    }
}

/// A block: header plus its transactions, the first of which must be a
/// coinbase.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Tx>,
}

impl Block {
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn coinbase(&self) -> Option<&Tx> {
        self.transactions.first()
    }
}

/// Metadata the block index stores per block hash.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BlockMeta {
    pub hash: Hash256,
    pub nonce: u32,
    pub height: Height,
}
