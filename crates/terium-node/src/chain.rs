//! The blockchain view: a thin, externally-owned-store wrapper.
//!
//! `Blockchain` never owns block bytes itself — it borrows the
//! [`BlockStore`] and [`BlockIndex`] for the duration of every call, which
//! is how the cyclic "blockchain needs the block store, the block store is
//! owned by the node" reference is broken (DESIGN NOTES, `Cyclic
//! references`).

use terium_core::error::StoreError;
use terium_core::types::{Block, Hash256, Height};

use crate::block_index::BlockIndex;
use crate::block_store::BlockStore;

pub struct Blockchain<'a> {
    store: &'a BlockStore,
    index: &'a BlockIndex,
}

impl<'a> Blockchain<'a> {
    pub fn new(store: &'a BlockStore, index: &'a BlockIndex) -> Blockchain<'a> {
        Blockchain { store, index }
    }

    pub fn tip_hash(&self) -> Result<Option<Hash256>, StoreError> {
        self.index.last_hash()
    }

    pub fn tip(&self) -> Result<Option<Block>, StoreError> {
        match self.tip_hash()? {
            Some(hash) => self.store.get(&hash),
            None => Ok(None),
        }
    }

    pub fn tip_height(&self) -> Result<Option<Height>, StoreError> {
        match self.tip_hash()? {
            Some(hash) => Ok(self.index.get(&hash)?.map(|(_, height)| height)),
            None => Ok(None),
        }
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.tip_hash()?.is_none())
    }

    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, StoreError> {
        self.store.get(hash)
    }

    pub fn height_of(&self, hash: &Hash256) -> Result<Option<Height>, StoreError> {
        Ok(self.index.get(hash)?.map(|(_, height)| height))
    }

    /// Append `block` as the new tip. `height` is the height it occupies —
    /// the caller computes it (predecessor height + 1, or 0 for genesis).
    pub fn append(&self, block: &Block, height: Height) -> Result<(), StoreError> {
        self.store.put(block)?;
        self.index
            .append(&block.hash(), block.header.nonce, height)
    }

    /// A cursor over the chain from the tip back to genesis, following
    /// `prevHash` links, terminating when the current block's `prevHash`
    /// is all-zero.
    pub fn cursor(&self) -> Result<ChainCursor<'_>, StoreError> {
        Ok(ChainCursor {
            chain: self,
            current: self.tip_hash()?,
        })
    }
}

/// Walks the main chain from the tip to genesis.
pub struct ChainCursor<'a> {
    chain: &'a Blockchain<'a>,
    current: Option<Hash256>,
}

impl<'a> Iterator for ChainCursor<'a> {
    type Item = Result<Block, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current?;
        let block = match self.chain.get_block(&hash) {
            Ok(Some(block)) => block,
            Ok(None) => {
                self.current = None;
                return Some(Err(StoreError::NoBlocksRemaining));
            }
            Err(e) => {
                self.current = None;
                return Some(Err(e));
            }
        };
        self.current = if block.header.prev_hash.is_zero() {
            None
        } else {
            Some(block.header.prev_hash)
        };
        Some(Ok(block))
    }
}
