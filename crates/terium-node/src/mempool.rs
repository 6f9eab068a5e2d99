//! The fee-priority transaction pool.
//!
//! Backed by the relational shape `(txid, serialized_tx, fee)`.
//! Held in memory, guarded by a `parking_lot::Mutex`, since the node loop is
//! the pool's only mutator and every other component only reads through
//! [`terium_consensus::tx_validator::MempoolSource`].

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::collections::HashMap;

use terium_consensus::tx_validator::MempoolSource;
use terium_core::types::{Hash256, Tx};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    tx: Tx,
    fee: i64,
}

/// Ordered by `(fee, txid)` ascending; the top-N-by-fee query reads the set
/// in reverse so higher-fee transactions sort first, with txid as a
/// deterministic tiebreak between equal fees.
struct Inner {
    by_txid: HashMap<Hash256, Entry>,
    by_fee: BTreeSet<(i64, Hash256)>,
}

pub struct Mempool {
    inner: Mutex<Inner>,
}

impl Default for Mempool {
    fn default() -> Self {
        Mempool::new()
    }
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool {
            inner: Mutex::new(Inner {
                by_txid: HashMap::new(),
                by_fee: BTreeSet::new(),
            }),
        }
    }

    pub fn exists(&self, txid: &Hash256) -> bool {
        self.inner.lock().by_txid.contains_key(txid)
    }

    pub fn get(&self, txid: &Hash256) -> Option<Tx> {
        self.inner.lock().by_txid.get(txid).map(|e| e.tx.clone())
    }

    pub fn insert(&self, tx: Tx, fee: i64) {
        let txid = tx.txid();
        let mut guard = self.inner.lock();
        if let Some(old) = guard.by_txid.remove(&txid) {
            guard.by_fee.remove(&(old.fee, txid));
        }
        guard.by_fee.insert((fee, txid));
        guard.by_txid.insert(txid, Entry { tx, fee });
    }

    pub fn remove(&self, txid: &Hash256) -> Option<Tx> {
        let mut guard = self.inner.lock();
        let entry = guard.by_txid.remove(txid)?;
        guard.by_fee.remove(&(entry.fee, *txid));
        Some(entry.tx)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_txid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `n` highest-fee transactions currently pooled, highest first.
    /// Returns fewer than `n` if the pool does not hold enough.
    pub fn top_n_by_fee(&self, n: usize) -> Vec<Tx> {
        let guard = self.inner.lock();
        guard
            .by_fee
            .iter()
            .rev()
            .take(n)
            .map(|(_, txid)| guard.by_txid[txid].tx.clone())
            .collect()
    }

    /// Drop every transaction in `block` from the pool — the removal step
    /// that runs once a block containing them has been appended.
    pub fn remove_confirmed(&self, block_txids: impl IntoIterator<Item = Hash256>) {
        for txid in block_txids {
            self.remove(&txid);
        }
    }
}

impl MempoolSource for Mempool {
    fn contains(&self, txid: &Hash256) -> bool {
        self.exists(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terium_core::types::{OutPoint, TxIn, TxOut};

    fn sample_tx(seed: u8) -> Tx {
        Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    txid: Hash256([seed; 32]),
                    index: 0,
                },
                unlocking_script: vec![],
            }],
            outputs: vec![TxOut {
                value: 100,
                locking_script: vec![],
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn insert_then_exists_and_get() {
        let pool = Mempool::new();
        let tx = sample_tx(1);
        pool.insert(tx.clone(), 10);
        assert!(pool.exists(&tx.txid()));
        assert_eq!(pool.get(&tx.txid()), Some(tx));
    }

    #[test]
    fn top_n_orders_by_fee_descending() {
        let pool = Mempool::new();
        let low = sample_tx(1);
        let high = sample_tx(2);
        let mid = sample_tx(3);
        pool.insert(low.clone(), 10);
        pool.insert(high.clone(), 50);
        pool.insert(mid.clone(), 20);

        let top2 = pool.top_n_by_fee(2);
        assert_eq!(top2, vec![high, mid]);
    }

    #[test]
    fn remove_drops_entry() {
        let pool = Mempool::new();
        let tx = sample_tx(1);
        pool.insert(tx.clone(), 10);
        assert_eq!(pool.remove(&tx.txid()), Some(tx.clone()));
        assert!(!pool.exists(&tx.txid()));
    }

    #[test]
    fn remove_confirmed_clears_block_txs() {
        let pool = Mempool::new();
        let a = sample_tx(1);
        let b = sample_tx(2);
        pool.insert(a.clone(), 10);
        pool.insert(b.clone(), 20);
        pool.remove_confirmed(vec![a.txid()]);
        assert!(!pool.exists(&a.txid()));
        assert!(pool.exists(&b.txid()));
    }

    #[test]
    fn reinserting_same_txid_replaces_fee_ordering() {
        let pool = Mempool::new();
        let tx = sample_tx(1);
        pool.insert(tx.clone(), 10);
        pool.insert(tx.clone(), 999);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.top_n_by_fee(1), vec![tx]);
    }

    #[test]
    fn top_n_caps_at_pool_size() {
        let pool = Mempool::new();
        pool.insert(sample_tx(1), 5);
        assert_eq!(pool.top_n_by_fee(10).len(), 1);
    }
}
