//! Consensus constants shared by the core, consensus and node crates.

/// Reward paid to a block's coinbase output. A literal amount, not scaled by
/// any "coin" subdivision (`t_config/config.go` carries the same literal).
pub const BLOCK_REWARD: i64 = 100_000;

/// Blocks a coinbase output must wait before it can be spent.
pub const COINBASE_MATURITY: u32 = 100;

/// Flat network fee a transaction must pay beyond its declared outputs.
pub const TX_FEE: i64 = 10;

/// Default difficulty exponent: the fixed target is `1 << (255 - NBITS + 1)`.
pub const NBITS: u32 = 2;

/// Address payload length: 2-byte version + 20-byte pubkey hash + 4-byte checksum.
pub const ADDRESS_PAYLOAD_LEN: usize = 26;

/// Version prefix for a mainnet P2PKH address.
pub const ADDRESS_VERSION: [u8; 2] = [0x00, 0x00];

/// The fixed proof-of-work target for a given difficulty exponent:
/// `1 << (255 - nbits + 1)`, as a 32-byte big-endian integer. There is no
/// retargeting; `nbits` is a static configuration value.
pub fn fixed_target(nbits: u32) -> [u8; 32] {
    let shift = 255 - nbits + 1;
    let mut out = [0u8; 32];
    let byte_index = 31 - (shift / 8) as usize;
    let bit_index = shift % 8;
    out[byte_index] = 1u8 << bit_index;
    out
}
