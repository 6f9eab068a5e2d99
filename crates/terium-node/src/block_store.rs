//! Durable block storage: one file per block.
//!
//! Filename is `hex(blockHash)`; payload is the block's canonical
//! serialization followed by a trailing SHA-256 checksum of that payload.
//! Reading a block recomputes and compares the checksum, surfacing a
//! mismatch as [`StoreError::CorruptBlock`] rather than silently returning
//! truncated or bit-flipped data.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use terium_core::codec::{self, Cursor};
use terium_core::error::StoreError;
use terium_core::types::{Block, Hash256};

pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<BlockStore, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(BlockStore { dir })
    }

    fn path_for(&self, hash: &Hash256) -> PathBuf {
        self.dir.join(hash.to_hex())
    }

    pub fn put(&self, block: &Block) -> Result<(), StoreError> {
        let hash = block.hash();
        let mut payload = codec::encode_block(block);
        let checksum = Sha256::digest(&payload);
        payload.extend_from_slice(&checksum);
        fs::write(self.path_for(&hash), payload)?;
        Ok(())
    }

    pub fn get(&self, hash: &Hash256) -> Result<Option<Block>, StoreError> {
        let path = self.path_for(hash);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        if bytes.len() < 32 {
            return Err(StoreError::CorruptBlock);
        }
        let (payload, checksum) = bytes.split_at(bytes.len() - 32);
        let expected = Sha256::digest(payload);
        if checksum != expected.as_slice() {
            return Err(StoreError::CorruptBlock);
        }
        let mut cursor = Cursor::new(payload);
        let block = codec::decode_block(&mut cursor)?;
        Ok(Some(block))
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.path_for(hash).exists()
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}
