//! Node-level errors: everything `terium-core`'s taxonomy doesn't already
//! name, composed alongside it via `#[from]`.

use thiserror::Error;

use terium_core::error::{ConfigError, StoreError, TeriumError, ValidationError};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Core(#[from] TeriumError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("genesis already mined: chain has a tip")]
    ChainNotEmpty,
}
