//! The transaction index: `txHash -> (blockHash, blockHeight, positionInBlock)`.

use rocksdb::DB;

use terium_core::error::StoreError;
use terium_core::types::{Hash256, Height};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TxLocation {
    pub block_hash: Hash256,
    pub block_height: Height,
    pub position: u32,
}

fn encode_location(loc: &TxLocation) -> [u8; 68] {
    let mut out = [0u8; 68];
    out[0..32].copy_from_slice(loc.block_hash.as_bytes());
    out[32..64].copy_from_slice(&loc.block_height.0);
    out[64..68].copy_from_slice(&loc.position.to_be_bytes());
    out
}

fn decode_location(bytes: &[u8]) -> Result<TxLocation, StoreError> {
    if bytes.len() != 68 {
        return Err(StoreError::Rocks("malformed tx index record".into()));
    }
    let mut block_hash = [0u8; 32];
    block_hash.copy_from_slice(&bytes[0..32]);
    let mut block_height = [0u8; 32];
    block_height.copy_from_slice(&bytes[32..64]);
    let mut position = [0u8; 4];
    position.copy_from_slice(&bytes[64..68]);
    Ok(TxLocation {
        block_hash: Hash256(block_hash),
        block_height: Height(block_height),
        position: u32::from_be_bytes(position),
    })
}

pub struct TxIndex {
    db: DB,
}

impl TxIndex {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<TxIndex, StoreError> {
        let db = DB::open_default(path).map_err(|e| StoreError::Rocks(e.to_string()))?;
        Ok(TxIndex { db })
    }

    pub fn put(&self, txid: &Hash256, location: &TxLocation) -> Result<(), StoreError> {
        self.db
            .put(txid.as_bytes(), encode_location(location))
            .map_err(|e| StoreError::Rocks(e.to_string()))
    }

    pub fn get(&self, txid: &Hash256) -> Result<Option<TxLocation>, StoreError> {
        match self
            .db
            .get(txid.as_bytes())
            .map_err(|e| StoreError::Rocks(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode_location(&bytes)?)),
            None => Ok(None),
        }
    }
}
