//! The block index: `blockHash -> (nonce, height)`, plus the distinguished
//! key `lastHash` holding the current tip. Both are updated atomically per
//! append via a single rocksdb write batch.

use rocksdb::{WriteBatch, DB};

use terium_core::error::StoreError;
use terium_core::types::{Hash256, Height};

const LAST_HASH_KEY: &[u8] = b"lastHash";

pub struct BlockIndex {
    db: DB,
}

fn encode_meta(nonce: u32, height: Height) -> [u8; 36] {
    let mut out = [0u8; 36];
    out[0..4].copy_from_slice(&nonce.to_be_bytes());
    out[4..36].copy_from_slice(&height.0);
    out
}

fn decode_meta(bytes: &[u8]) -> Result<(u32, Height), StoreError> {
    if bytes.len() != 36 {
        return Err(StoreError::Rocks("malformed block index record".into()));
    }
    let mut nonce_bytes = [0u8; 4];
    nonce_bytes.copy_from_slice(&bytes[0..4]);
    let mut height_bytes = [0u8; 32];
    height_bytes.copy_from_slice(&bytes[4..36]);
    Ok((u32::from_be_bytes(nonce_bytes), Height(height_bytes)))
}

impl BlockIndex {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<BlockIndex, StoreError> {
        let db = DB::open_default(path).map_err(|e| StoreError::Rocks(e.to_string()))?;
        Ok(BlockIndex { db })
    }

    /// Record `hash -> (nonce, height)` and advance `lastHash` to `hash` in
    /// one atomic batch.
    pub fn append(&self, hash: &Hash256, nonce: u32, height: Height) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        batch.put(hash.as_bytes(), encode_meta(nonce, height));
        batch.put(LAST_HASH_KEY, hash.as_bytes());
        self.db
            .write(batch)
            .map_err(|e| StoreError::Rocks(e.to_string()))
    }

    pub fn get(&self, hash: &Hash256) -> Result<Option<(u32, Height)>, StoreError> {
        match self
            .db
            .get(hash.as_bytes())
            .map_err(|e| StoreError::Rocks(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode_meta(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn last_hash(&self) -> Result<Option<Hash256>, StoreError> {
        match self
            .db
            .get(LAST_HASH_KEY)
            .map_err(|e| StoreError::Rocks(e.to_string()))?
        {
            Some(bytes) if bytes.len() == 32 => {
                let mut out = [0u8; 32];
                out.copy_from_slice(&bytes);
                Ok(Some(Hash256(out)))
            }
            Some(_) => Err(StoreError::Rocks("malformed lastHash record".into())),
            None => Ok(None),
        }
    }

    pub fn contains(&self, hash: &Hash256) -> Result<bool, StoreError> {
        Ok(self.get(hash)?.is_some())
    }
}
