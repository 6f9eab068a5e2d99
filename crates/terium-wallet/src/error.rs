//! Wallet-level errors.

use thiserror::Error;

use terium_core::error::{AddressError, CryptoError, StoreError};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
}
