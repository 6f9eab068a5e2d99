//! The UTXO store: `encode(outpoint) -> encode(utxo)`.
//!
//! Address-indexed lookup has no dedicated index in this design: it is a
//! full scan over every entry, parsing each locking script for a pubkey
//! hash and comparing it against the queried address. Acceptable for a
//! single-node design without the sharding a real address index would need.

use rocksdb::{IteratorMode, DB};

use terium_consensus::tx_validator::UtxoSource;
use terium_core::codec::{self, Cursor};
use terium_core::error::StoreError;
use terium_core::script::{OP_DUP, OP_HASH160};
use terium_core::types::{OutPoint, Utxo};

pub struct UtxoStore {
    db: DB,
}

impl UtxoStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<UtxoStore, StoreError> {
        let db = DB::open_default(path).map_err(|e| StoreError::Rocks(e.to_string()))?;
        Ok(UtxoStore { db })
    }

    pub fn put(&self, utxo: &Utxo) -> Result<(), StoreError> {
        let key = codec::encode_outpoint(&utxo.outpoint);
        let value = codec::encode_utxo(utxo);
        self.db
            .put(key, value)
            .map_err(|e| StoreError::Rocks(e.to_string()))
    }

    pub fn get(&self, outpoint: &OutPoint) -> Result<Option<Utxo>, StoreError> {
        let key = codec::encode_outpoint(outpoint);
        match self.db.get(key).map_err(|e| StoreError::Rocks(e.to_string()))? {
            Some(bytes) => {
                let mut cursor = Cursor::new(&bytes);
                Ok(Some(codec::decode_utxo(&mut cursor)?))
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, outpoint: &OutPoint) -> Result<(), StoreError> {
        let key = codec::encode_outpoint(outpoint);
        self.db
            .delete(key)
            .map_err(|e| StoreError::Rocks(e.to_string()))
    }

    /// Every UTXO whose locking script is a P2PKH script paying `pubkey_hash`.
    pub fn by_pubkey_hash(&self, pubkey_hash: &[u8; 20]) -> Result<Vec<Utxo>, StoreError> {
        let mut matches = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| StoreError::Rocks(e.to_string()))?;
            let mut cursor = Cursor::new(&value);
            let utxo = codec::decode_utxo(&mut cursor)?;
            if script_pays(&utxo.locking_script, pubkey_hash) {
                matches.push(utxo);
            }
        }
        Ok(matches)
    }

    pub fn balance_of(&self, pubkey_hash: &[u8; 20]) -> Result<i64, StoreError> {
        Ok(self
            .by_pubkey_hash(pubkey_hash)?
            .iter()
            .fold(0i64, |sum, utxo| sum.saturating_add(utxo.value)))
    }
}

/// `OP_DUP OP_HASH160 <push 20 bytes == pubkey_hash> ...`
fn script_pays(locking_script: &[u8], pubkey_hash: &[u8; 20]) -> bool {
    if locking_script.len() < 2 || locking_script[0] != OP_DUP || locking_script[1] != OP_HASH160 {
        return false;
    }
    locking_script
        .windows(20)
        .any(|window| window == pubkey_hash)
}

impl UtxoSource for UtxoStore {
    fn get(&self, outpoint: &OutPoint) -> Option<Utxo> {
        UtxoStore::get(self, outpoint).ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terium_core::script::OP_PUSHDATA1;
    use terium_core::types::{Hash256, Height};

    fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
        let mut s = vec![OP_DUP, OP_HASH160, OP_PUSHDATA1, 0x14];
        s.extend_from_slice(hash);
        s
    }

    fn sample_utxo(index: i32, hash: [u8; 20]) -> Utxo {
        Utxo {
            outpoint: OutPoint {
                txid: Hash256([index as u8 + 1; 32]),
                index,
            },
            value: 1_000,
            locking_script: p2pkh_script(&hash),
            block_height: Height::ZERO,
            is_coinbase: false,
        }
    }

    #[test]
    fn put_get_remove_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UtxoStore::open(tmp.path()).unwrap();
        let utxo = sample_utxo(0, [1u8; 20]);
        store.put(&utxo).unwrap();
        assert_eq!(store.get(&utxo.outpoint).unwrap(), Some(utxo.clone()));
        store.remove(&utxo.outpoint).unwrap();
        assert_eq!(store.get(&utxo.outpoint).unwrap(), None);
    }

    #[test]
    fn by_pubkey_hash_filters_correctly() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UtxoStore::open(tmp.path()).unwrap();
        let mine = sample_utxo(0, [1u8; 20]);
        let other = sample_utxo(1, [2u8; 20]);
        store.put(&mine).unwrap();
        store.put(&other).unwrap();

        let found = store.by_pubkey_hash(&[1u8; 20]).unwrap();
        assert_eq!(found, vec![mine]);
    }

    #[test]
    fn balance_sums_matching_utxos() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UtxoStore::open(tmp.path()).unwrap();
        store.put(&sample_utxo(0, [3u8; 20])).unwrap();
        store.put(&sample_utxo(1, [3u8; 20])).unwrap();
        assert_eq!(store.balance_of(&[3u8; 20]).unwrap(), 2_000);
    }
}
