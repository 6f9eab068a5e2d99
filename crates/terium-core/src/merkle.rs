//! Merkle root computation over a block's transaction ids.
//!
//! Standard bottom-up pairwise double-SHA-256: at each level, hash
//! concatenated pairs of nodes; if a level has an odd count, the last node
//! is duplicated to pair with itself.

use crate::crypto::h256;
use crate::types::Hash256;

/// The merkle root of a non-empty list of leaf hashes (transaction ids).
/// Returns `Hash256::ZERO` for an empty list. A singleton list hashes its
/// one element concatenated with itself, same as the odd-duplication rule
/// applied at every other level.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }
    if leaves.len() == 1 {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(leaves[0].as_bytes());
        bytes.extend_from_slice(leaves[0].as_bytes());
        return h256(&bytes);
    }
    let mut level: Vec<Hash256> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut bytes = Vec::with_capacity(64);
                bytes.extend_from_slice(pair[0].as_bytes());
                bytes.extend_from_slice(pair[1].as_bytes());
                h256(&bytes)
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_is_zero() {
        assert_eq!(merkle_root(&[]), Hash256::ZERO);
    }

    #[test]
    fn single_leaf_hashes_concatenated_with_itself() {
        let leaf = Hash256([1u8; 32]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(leaf.as_bytes());
        bytes.extend_from_slice(leaf.as_bytes());
        assert_eq!(merkle_root(&[leaf]), h256(&bytes));
    }

    #[test]
    fn two_leaves_hash_concatenation() {
        let a = Hash256([1u8; 32]);
        let b = Hash256([2u8; 32]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(a.as_bytes());
        bytes.extend_from_slice(b.as_bytes());
        let expected = h256(&bytes);
        assert_eq!(merkle_root(&[a, b]), expected);
    }

    #[test]
    fn odd_count_duplicates_last_leaf() {
        let a = Hash256([1u8; 32]);
        let b = Hash256([2u8; 32]);
        let c = Hash256([3u8; 32]);
        let with_three = merkle_root(&[a, b, c]);
        let with_duplicate = merkle_root(&[a, b, c, c]);
        assert_eq!(with_three, with_duplicate);
    }

    #[test]
    fn order_matters() {
        let a = Hash256([1u8; 32]);
        let b = Hash256([2u8; 32]);
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }

    #[test]
    fn deterministic() {
        let leaves = vec![Hash256([1u8; 32]), Hash256([2u8; 32]), Hash256([3u8; 32])];
        assert_eq!(merkle_root(&leaves), merkle_root(&leaves));
    }
}
