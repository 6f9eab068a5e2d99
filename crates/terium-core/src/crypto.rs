//! Hashing, ECDSA P-256 keys, and the sighash preimage algorithm.
//!
//! - `H256(x) = SHA256(SHA256(x))`, used for tx ids, block hashes, the
//!   merkle root and address checksums.
//! - `H160(x) = RIPEMD160(SHA256(x))`, used for pubkey hashes.
//! - Public/private keys and signatures are DER: SubjectPublicKeyInfo,
//!   EC private key (SEC1), and ECDSA-DER respectively.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::SecretKey;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::script::{SIGHASH_ANYONECANPAY, SIGHASH_NONE, SIGHASH_SINGLE};
use crate::types::{Hash256, Tx, Utxo};

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `H256(x) = SHA256(SHA256(x))`.
pub fn h256(data: &[u8]) -> Hash256 {
    Hash256(sha256(&sha256(data)))
}

/// `H160(x) = RIPEMD160(SHA256(x))`.
pub fn h160(data: &[u8]) -> [u8; 20] {
    let first = sha256(data);
    let mut hasher = Ripemd160::new();
    hasher.update(first);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// An ECDSA P-256 keypair, serialized on disk as EC private key (SEC1) DER.
pub struct KeyPair {
    secret: SecretKey,
}

impl KeyPair {
    pub fn generate() -> KeyPair {
        KeyPair {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    pub fn from_sec1_der(bytes: &[u8]) -> Result<KeyPair, CryptoError> {
        let secret = SecretKey::from_sec1_der(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(KeyPair { secret })
    }

    pub fn to_sec1_der(&self) -> Vec<u8> {
        self.secret
            .to_sec1_der()
            .expect("a valid secret key always encodes to SEC1 DER")
            .as_bytes()
            .to_vec()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: VerifyingKey::from(self.secret.public_key()),
        }
    }

    /// Sign a 32-byte digest directly (no additional hashing): the caller
    /// is expected to pass an `H256` output, as the sighash preimage does.
    pub fn sign(&self, digest: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from(&self.secret);
        let signature: Signature = signing_key
            .sign_prehash(digest)
            .expect("a 32-byte digest always signs under P-256");
        signature.to_der().as_bytes().to_vec()
    }
}

/// A public key, serialized on disk / on the wire as SubjectPublicKeyInfo DER.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    pub fn from_der(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
        let verifying_key =
            VerifyingKey::from_public_key_der(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(PublicKey { verifying_key })
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.verifying_key
            .to_public_key_der()
            .expect("a valid verifying key always encodes to SubjectPublicKeyInfo DER")
            .as_bytes()
            .to_vec()
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        h160(&self.to_der())
    }

    /// Verify a DER-encoded ECDSA signature against a 32-byte digest.
    pub fn verify(&self, digest: &[u8], der_signature: &[u8]) -> Result<(), CryptoError> {
        let signature =
            Signature::from_der(der_signature).map_err(|_| CryptoError::InvalidSignature)?;
        self.verifying_key
            .verify_prehash(digest, &signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

/// Build the sighash preimage digest for `tx`'s input at `input_index`,
/// spending `utxo`, scoped by `flag`.
///
/// A deep copy of `tx` is modified by: (a) clearing every input's unlocking
/// script to a single `0x00` byte; (b) substituting the current input's
/// unlocking script with the UTXO's locking script; (c) adjusting outputs
/// per the low two sighash bits; (d) if `ANYONECANPAY` is set, reducing
/// inputs to just the current one. The canonical serialization is then
/// concatenated with the flag byte and `H256`-hashed.
pub fn sighash_preimage(tx: &Tx, input_index: usize, utxo: &Utxo, flag: u8) -> Hash256 {
    let mut modified = tx.clone();

    for input in modified.inputs.iter_mut() {
        input.unlocking_script = vec![0x00];
    }
    if let Some(input) = modified.inputs.get_mut(input_index) {
        input.unlocking_script = utxo.locking_script.clone();
    }

    match flag & 0x03 {
        SIGHASH_NONE => modified.outputs.clear(),
        SIGHASH_SINGLE => {
            let keep = input_index + 1;
            if keep <= modified.outputs.len() {
                for out in modified.outputs.iter_mut().take(keep - 1) {
                    out.value = -1;
                    out.locking_script.clear();
                }
                modified.outputs.truncate(keep);
            } else {
                modified.outputs.clear();
            }
        }
        _ => {}
    }

    if flag & SIGHASH_ANYONECANPAY != 0 {
        if let Some(only) = modified.inputs.get(input_index).cloned() {
            modified.inputs = vec![only];
        }
    }

    let mut bytes = crate::codec::encode_tx(&modified);
    bytes.push(flag);
    h256(&bytes)
}
