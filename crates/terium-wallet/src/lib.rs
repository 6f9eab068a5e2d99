//! A minimal single-key wallet: DER key storage, address derivation,
//! balance lookup and P2PKH send-transaction construction.

pub mod error;
pub mod wallet;

pub use error::WalletError;
pub use wallet::Wallet;
