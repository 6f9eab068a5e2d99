//! P2PKH addresses: `version(2) ++ pubkeyHash(20) ++ checksum(4)`.
//!
//! Field order follows `keys.go`'s `version ++ hash ++ checksum` layout, not
//! `address.go`'s divergent checksum-first revision. Lowercase hex is the
//! canonical on-disk/CLI form; base58 is offered alongside it since the
//! dependency is already part of the stack.

use std::fmt;

use crate::constants::{ADDRESS_PAYLOAD_LEN, ADDRESS_VERSION};
use crate::crypto::h256;
use crate::error::AddressError;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Address {
    pub version: [u8; 2],
    pub pubkey_hash: [u8; 20],
    pub checksum: [u8; 4],
}

impl Address {
    pub fn from_pubkey_hash(pubkey_hash: [u8; 20]) -> Address {
        let checksum = compute_checksum(ADDRESS_VERSION, pubkey_hash);
        Address {
            version: ADDRESS_VERSION,
            pubkey_hash,
            checksum,
        }
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_PAYLOAD_LEN] {
        let mut out = [0u8; ADDRESS_PAYLOAD_LEN];
        out[0..2].copy_from_slice(&self.version);
        out[2..22].copy_from_slice(&self.pubkey_hash);
        out[22..26].copy_from_slice(&self.checksum);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Address, AddressError> {
        if bytes.len() != ADDRESS_PAYLOAD_LEN {
            return Err(AddressError::InvalidLength);
        }
        let mut version = [0u8; 2];
        version.copy_from_slice(&bytes[0..2]);
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&bytes[2..22]);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&bytes[22..26]);

        if checksum != compute_checksum(version, pubkey_hash) {
            return Err(AddressError::InvalidChecksum);
        }
        Ok(Address {
            version,
            pubkey_hash,
            checksum,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Address, AddressError> {
        let bytes = hex::decode(s.trim()).map_err(|_| AddressError::InvalidHex)?;
        Address::from_bytes(&bytes)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Address, AddressError> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58)?;
        Address::from_bytes(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn compute_checksum(version: [u8; 2], pubkey_hash: [u8; 20]) -> [u8; 4] {
    let mut payload = Vec::with_capacity(22);
    payload.extend_from_slice(&version);
    payload.extend_from_slice(&pubkey_hash);
    let hash = h256(&payload);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&hash.as_bytes()[0..4]);
    checksum
}

/// Whether a hex string decodes to an address with a matching checksum.
pub fn validate_address_hex(s: &str) -> bool {
    Address::from_hex(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let addr = Address::from_pubkey_hash([9u8; 20]);
        let hex = addr.to_hex();
        assert_eq!(Address::from_hex(&hex).unwrap(), addr);
    }

    #[test]
    fn base58_roundtrip() {
        let addr = Address::from_pubkey_hash([3u8; 20]);
        let encoded = addr.to_base58();
        assert_eq!(Address::from_base58(&encoded).unwrap(), addr);
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let addr = Address::from_pubkey_hash([1u8; 20]);
        let mut bytes = addr.to_bytes();
        bytes[25] ^= 0xFF;
        assert_eq!(
            Address::from_bytes(&bytes),
            Err(AddressError::InvalidChecksum)
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(
            Address::from_bytes(&[0u8; 10]),
            Err(AddressError::InvalidLength)
        );
    }

    #[test]
    fn different_pubkey_hashes_give_different_addresses() {
        let a = Address::from_pubkey_hash([1u8; 20]);
        let b = Address::from_pubkey_hash([2u8; 20]);
        assert_ne!(a, b);
    }

    #[test]
    fn validate_address_hex_accepts_valid_and_rejects_garbage() {
        let addr = Address::from_pubkey_hash([5u8; 20]);
        assert!(validate_address_hex(&addr.to_hex()));
        assert!(!validate_address_hex("not hex at all"));
        assert!(!validate_address_hex("00"));
    }
}
