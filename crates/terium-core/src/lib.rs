//! Core data model, binary codecs, the script engine and cryptography for
//! Terium: a Bitcoin-style proof-of-work full node.

pub mod address;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod script;
pub mod types;
