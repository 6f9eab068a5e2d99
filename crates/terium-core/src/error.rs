//! Layered error taxonomy for the Terium consensus core.
//!
//! Each subsystem gets its own `thiserror` enum; [`TeriumError`] aggregates
//! them at the crate boundary so callers can match on domain without
//! threading a dozen error types through every signature.

use thiserror::Error;

/// Failures produced while decoding or encoding the on-chain binary types.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CodecError {
    #[error("bad outpoint encoding")]
    BadOutPoint,
    #[error("bad compact size encoding")]
    BadCompactSize,
    #[error("bad script encoding: {0}")]
    BadScript(String),
    #[error("bad txout encoding")]
    BadTxOut,
    #[error("bad txin encoding")]
    BadTxIn,
    #[error("bad tx encoding")]
    BadTx,
    #[error("bad header encoding")]
    BadHeader,
    #[error("bad block encoding")]
    BadBlock,
    #[error("bad utxo encoding")]
    BadUtxo,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("trailing bytes after decoding a well-formed value")]
    TrailingBytes,
}

/// Failures raised by the script interpreter.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ScriptError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("script execution did not end truthy")]
    ExecutionFailed,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Failures from key handling, signing and verification.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CryptoError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    #[error("invalid private key encoding")]
    InvalidPrivateKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Failures decoding or validating an [`crate::address::Address`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AddressError {
    #[error("invalid address length")]
    InvalidLength,
    #[error("invalid checksum")]
    InvalidChecksum,
    #[error("invalid base58 encoding")]
    InvalidBase58,
    #[error("invalid hex encoding")]
    InvalidHex,
}

/// Failures produced by the transaction and block validators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("transaction has no inputs or no outputs")]
    EmptyInputsOrOutputs,
    #[error("reserved coinbase outpoint used in a non-coinbase input")]
    UnexpectedCoinbaseInput,
    #[error("referenced utxo {0:?} is missing")]
    UtxoMissing(crate::types::OutPoint),
    #[error("input {index} spends more than its utxo carries")]
    ValueExceedsUtxo { index: usize },
    #[error("total input value does not cover outputs plus network fee")]
    InsufficientFee,
    #[error("input {index} spends an immature coinbase")]
    ImmatureCoinbase { index: usize },
    #[error("input {index} has an unparseable unlocking script")]
    BadUnlockingScript { index: usize },
    #[error("transaction already present in the mempool")]
    AlreadyInMempool,
    #[error("input {index} script execution failed")]
    ScriptFailed { index: usize },
    #[error("block has no transactions")]
    EmptyBlock,
    #[error("block header hash is not below target")]
    InvalidProofOfWork,
    #[error("block merkle root does not match computed root")]
    InvalidMerkleRoot,
    #[error("block's first transaction is not a coinbase")]
    MissingCoinbase,
}

/// Failures from the durable stores (block files, block index, tx index, UTXO store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rocksdb error: {0}")]
    Rocks(String),
    #[error("corrupt block on disk: checksum mismatch")]
    CorruptBlock,
    #[error("no blocks remaining")]
    NoBlocksRemaining,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Failures from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration missing: {0}")]
    Missing(String),
    #[error("TERIUM_ROOT is not set")]
    RootNotSet,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// The top-level error type, aggregating every domain error below it.
#[derive(Debug, Error)]
pub enum TeriumError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("nonce space exhausted")]
    NoNonce,
    #[error("bad address")]
    BadAddress,
}
