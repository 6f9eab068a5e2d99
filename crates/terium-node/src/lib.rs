//! Full node composition: durable stores, mempool, miner and the event
//! loop tying them together.

pub mod block_index;
pub mod block_store;
pub mod chain;
pub mod config;
pub mod error;
pub mod genesis;
pub mod mempool;
pub mod miner;
pub mod node;
pub mod tx_index;
pub mod utxo_store;

pub use chain::Blockchain;
pub use error::NodeError;
pub use mempool::Mempool;
pub use miner::{Miner, MinerControl};
pub use node::Node;
