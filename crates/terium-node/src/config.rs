//! Node directory layout and `config.json` loading.
//!
//! Every path is rooted at `TERIUM_ROOT`: `.data` (block files, block index,
//! tx index, UTXO store), `.data/index` (the rocksdb index databases),
//! `.tmp` (scratch space), and `wallets` (per-wallet key material). The
//! node config itself lives at `TERIUM_ROOT/config.json`, merged against
//! defaults on every load and persisted back if anything was missing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use terium_core::error::ConfigError;

const DEFAULT_NUM_TX_IN_BLOCK: u8 = 10;
const DEFAULT_RPC_ENDPOINT_PORT: u16 = 8033;

/// The on-disk, mergeable node configuration (`config.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(rename = "numTxInBlock")]
    pub num_tx_in_block: Option<u8>,
    #[serde(rename = "rpcEndpointPort")]
    pub rpc_endpoint_port: Option<u16>,
    #[serde(rename = "clientAddress")]
    pub client_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_tx_in_block: None,
            rpc_endpoint_port: None,
            client_address: None,
        }
    }
}

impl Config {
    pub fn num_tx_in_block(&self) -> u8 {
        self.num_tx_in_block.unwrap_or(DEFAULT_NUM_TX_IN_BLOCK)
    }

    pub fn rpc_endpoint_port(&self) -> u16 {
        self.rpc_endpoint_port.unwrap_or(DEFAULT_RPC_ENDPOINT_PORT)
    }

    /// Fill in any missing field with its default; returns `true` if
    /// anything changed (meaning the caller should persist the result).
    fn fill_defaults(&mut self) -> bool {
        let mut changed = false;
        if self.num_tx_in_block.is_none() {
            self.num_tx_in_block = Some(DEFAULT_NUM_TX_IN_BLOCK);
            changed = true;
        }
        if self.rpc_endpoint_port.is_none() {
            self.rpc_endpoint_port = Some(DEFAULT_RPC_ENDPOINT_PORT);
            changed = true;
        }
        changed
    }
}

/// Every directory and file path a running node touches, rooted at
/// `TERIUM_ROOT`.
#[derive(Debug, Clone)]
pub struct DirCtx {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub index_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub wallet_dir: PathBuf,
    pub config_path: PathBuf,
}

impl DirCtx {
    /// Read `TERIUM_ROOT` from the environment, verify it exists, and
    /// ensure every subdirectory this node needs is present.
    pub fn from_env() -> Result<DirCtx, ConfigError> {
        let root = std::env::var("TERIUM_ROOT").map_err(|_| ConfigError::RootNotSet)?;
        Self::new(PathBuf::from(root))
    }

    pub fn new(root: PathBuf) -> Result<DirCtx, ConfigError> {
        if !root.is_dir() {
            return Err(ConfigError::RootNotSet);
        }
        let data_dir = root.join(".data");
        let index_dir = data_dir.join("index");
        let tmp_dir = root.join(".tmp");
        let wallet_dir = root.join("wallets");
        let config_path = root.join("config.json");

        for dir in [&data_dir, &index_dir, &tmp_dir, &wallet_dir] {
            ensure_dir(dir)?;
        }

        Ok(DirCtx {
            root,
            data_dir,
            index_dir,
            tmp_dir,
            wallet_dir,
            config_path,
        })
    }

    /// Load `config.json`, filling in and persisting any missing defaults.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = if self.config_path.exists() {
            let raw = fs::read_to_string(&self.config_path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Config::default()
        };

        if config.fill_defaults() || !self.config_path.exists() {
            let bytes = serde_json::to_vec_pretty(&config)?;
            fs::write(&self.config_path, bytes)?;
        }

        Ok(config)
    }
}

fn ensure_dir(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_every_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = DirCtx::new(tmp.path().to_path_buf()).unwrap();
        assert!(ctx.data_dir.is_dir());
        assert!(ctx.index_dir.is_dir());
        assert!(ctx.tmp_dir.is_dir());
        assert!(ctx.wallet_dir.is_dir());
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        assert!(DirCtx::new(missing).is_err());
    }

    #[test]
    fn load_config_creates_and_persists_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = DirCtx::new(tmp.path().to_path_buf()).unwrap();
        let config = ctx.load_config().unwrap();
        assert_eq!(config.num_tx_in_block(), DEFAULT_NUM_TX_IN_BLOCK);
        assert_eq!(config.rpc_endpoint_port(), DEFAULT_RPC_ENDPOINT_PORT);
        assert!(ctx.config_path.exists());

        let reloaded = ctx.load_config().unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn load_config_preserves_explicit_client_address() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = DirCtx::new(tmp.path().to_path_buf()).unwrap();
        fs::write(&ctx.config_path, br#"{"clientAddress":"deadbeef"}"#).unwrap();
        let config = ctx.load_config().unwrap();
        assert_eq!(config.client_address.as_deref(), Some("deadbeef"));
        assert_eq!(config.num_tx_in_block(), DEFAULT_NUM_TX_IN_BLOCK);
    }
}
