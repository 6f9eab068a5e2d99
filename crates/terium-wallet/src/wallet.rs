//! A single-key P2PKH wallet: key storage on disk, address derivation,
//! balance lookup and simple send-transaction construction.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use terium_core::address::Address;
use terium_core::constants::TX_FEE;
use terium_core::crypto::KeyPair;
use terium_core::script::{self, SIGHASH_ALL};
use terium_core::types::{Tx, TxIn, TxOut, Utxo};
use terium_node::utxo_store::UtxoStore;

use crate::error::WalletError;

/// A wallet backed by a single ECDSA P-256 keypair, persisted as SEC1 DER
/// at `<wallet_dir>/<name>.key`.
pub struct Wallet {
    name: String,
    keypair: KeyPair,
}

impl Wallet {
    fn key_path(wallet_dir: &Path, name: &str) -> PathBuf {
        wallet_dir.join(format!("{name}.key"))
    }

    /// Load the named wallet's key file, or generate and persist a fresh
    /// keypair if none exists yet.
    pub fn load_or_create(wallet_dir: &Path, name: &str) -> Result<Wallet, WalletError> {
        let path = Self::key_path(wallet_dir, name);
        let keypair = if path.exists() {
            let der = fs::read(&path)?;
            KeyPair::from_sec1_der(&der)?
        } else {
            let fresh = KeyPair::generate();
            fs::write(&path, fresh.to_sec1_der())?;
            info!(wallet = name, path = %path.display(), "provisioned a new wallet key");
            fresh
        };
        Ok(Wallet {
            name: name.to_string(),
            keypair,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        self.keypair.public_key().pubkey_hash()
    }

    pub fn address(&self) -> Address {
        Address::from_pubkey_hash(self.pubkey_hash())
    }

    pub fn balance(&self, utxos: &UtxoStore) -> Result<i64, WalletError> {
        Ok(utxos.balance_of(&self.pubkey_hash())?)
    }

    /// Build and sign a transaction paying `amount` to `to`, spending this
    /// wallet's own UTXOs largest-first until `amount + TX_FEE` is covered,
    /// with any excess returned as a change output back to this wallet.
    pub fn build_transaction(
        &self,
        utxos: &UtxoStore,
        to: Address,
        amount: i64,
    ) -> Result<Tx, WalletError> {
        let mut candidates = utxos.by_pubkey_hash(&self.pubkey_hash())?;
        candidates.sort_by(|a, b| b.value.cmp(&a.value));

        let needed = amount.saturating_add(TX_FEE);
        let mut selected: Vec<Utxo> = Vec::new();
        let mut total = 0i64;
        for utxo in candidates {
            if total >= needed {
                break;
            }
            total = total.saturating_add(utxo.value);
            selected.push(utxo);
        }
        if total < needed {
            warn!(needed, available = total, "insufficient funds to build transaction");
            return Err(WalletError::InsufficientFunds {
                needed,
                available: total,
            });
        }

        let mut outputs = vec![TxOut {
            value: amount,
            locking_script: script::pay_to_pubkey_hash(&to.pubkey_hash),
        }];
        let change = total - needed;
        if change > 0 {
            outputs.push(TxOut {
                value: change,
                locking_script: script::pay_to_pubkey_hash(&self.pubkey_hash()),
            });
        }

        let mut tx = Tx {
            version: 1,
            inputs: selected
                .iter()
                .map(|utxo| TxIn {
                    prev_output: utxo.outpoint,
                    unlocking_script: vec![],
                })
                .collect(),
            outputs,
            lock_time: 0,
        };

        for (index, utxo) in selected.iter().enumerate() {
            let preimage = terium_core::crypto::sighash_preimage(&tx, index, utxo, SIGHASH_ALL);
            let mut sig = self.keypair.sign(preimage.as_bytes());
            sig.push(SIGHASH_ALL);
            let pubkey_der = self.keypair.public_key().to_der();
            tx.inputs[index].unlocking_script = script::p2pkh_unlocking_script(&sig, &pubkey_der);
        }

        info!(
            txid = %tx.txid(),
            amount,
            inputs = tx.inputs.len(),
            "built transaction"
        );
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terium_core::types::{Hash256, OutPoint, Height};

    fn utxo(txid: u8, hash: [u8; 20], value: i64) -> Utxo {
        Utxo {
            outpoint: OutPoint {
                txid: Hash256([txid; 32]),
                index: 0,
            },
            value,
            locking_script: script::pay_to_pubkey_hash(&hash),
            block_height: Height::ZERO,
            is_coinbase: false,
        }
    }

    #[test]
    fn load_or_create_persists_and_reloads_same_key() {
        let tmp = tempfile::tempdir().unwrap();
        let wallet = Wallet::load_or_create(tmp.path(), "alice").unwrap();
        let address = wallet.address();

        let reloaded = Wallet::load_or_create(tmp.path(), "alice").unwrap();
        assert_eq!(reloaded.address(), address);
    }

    #[test]
    fn different_names_get_different_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let alice = Wallet::load_or_create(tmp.path(), "alice").unwrap();
        let bob = Wallet::load_or_create(tmp.path(), "bob").unwrap();
        assert_ne!(alice.address(), bob.address());
    }

    #[test]
    fn balance_sums_owned_utxos() {
        let tmp = tempfile::tempdir().unwrap();
        let wallet = Wallet::load_or_create(tmp.path(), "alice").unwrap();
        let store = UtxoStore::open(tmp.path().join("utxo")).unwrap();
        store.put(&utxo(1, wallet.pubkey_hash(), 1_000)).unwrap();
        store.put(&utxo(2, wallet.pubkey_hash(), 500)).unwrap();
        assert_eq!(wallet.balance(&store).unwrap(), 1_500);
    }

    #[test]
    fn build_transaction_spends_largest_utxos_first_and_signs_each_input() {
        let tmp = tempfile::tempdir().unwrap();
        let wallet = Wallet::load_or_create(tmp.path(), "alice").unwrap();
        let recipient = Wallet::load_or_create(tmp.path(), "bob").unwrap();
        let store = UtxoStore::open(tmp.path().join("utxo")).unwrap();
        store.put(&utxo(1, wallet.pubkey_hash(), 100)).unwrap();
        store.put(&utxo(2, wallet.pubkey_hash(), 1_000)).unwrap();

        let tx = wallet
            .build_transaction(&store, recipient.address(), 500)
            .unwrap();

        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.inputs[0].prev_output.txid, Hash256([2u8; 32]));
        assert_eq!(tx.outputs[0].value, 500);
        assert_eq!(tx.outputs[1].value, 1_000 - 500 - TX_FEE);
    }

    #[test]
    fn build_transaction_errors_when_funds_insufficient() {
        let tmp = tempfile::tempdir().unwrap();
        let wallet = Wallet::load_or_create(tmp.path(), "alice").unwrap();
        let recipient = Wallet::load_or_create(tmp.path(), "bob").unwrap();
        let store = UtxoStore::open(tmp.path().join("utxo")).unwrap();
        store.put(&utxo(1, wallet.pubkey_hash(), 10)).unwrap();

        let err = wallet
            .build_transaction(&store, recipient.address(), 500)
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    }
}
