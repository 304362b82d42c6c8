//! engine configuration

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use komuso_pool::AssetTagMode;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{EngineError, Result};

/// serde-friendly mirror of [`AssetTagMode`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetTagModeConfig {
    Raw,
    Numeric,
}

impl From<AssetTagModeConfig> for AssetTagMode {
    fn from(mode: AssetTagModeConfig) -> Self {
        match mode {
            AssetTagModeConfig::Raw => AssetTagMode::Raw,
            AssetTagModeConfig::Numeric => AssetTagMode::Numeric,
        }
    }
}

/// engine configuration
///
/// addresses are kept as base58 strings so the config can live in a toml
/// file; [`EngineConfig::accounts`] parses them once at engine start
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// relayer base url
    pub relayer_url: String,
    /// pool program id (base58)
    pub program_id: String,
    /// fee recipient account (base58)
    pub fee_recipient: String,
    /// address lookup table used by relayer-built transactions (base58)
    pub lookup_table: String,
    /// circom witness generator
    pub circuit_wasm: PathBuf,
    /// circom constraint system
    pub circuit_r1cs: PathBuf,
    /// groth16 proving key
    pub circuit_zkey: PathBuf,
    /// asset-tag encoding inside the ext-data hash
    #[serde(default = "default_asset_tag_mode")]
    pub asset_tag_mode: AssetTagModeConfig,
    /// fee rate in basis points, applied on both legs
    #[serde(default = "default_fee_rate_bps")]
    pub fee_rate_bps: u64,
    /// pipeline restarts on retriable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// per-attempt http timeout, seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub verbose: bool,
}

fn default_asset_tag_mode() -> AssetTagModeConfig {
    AssetTagModeConfig::Raw
}

fn default_fee_rate_bps() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_http_timeout_secs() -> u64 {
    30
}

/// parsed chain accounts the engine addresses
#[derive(Clone, Copy, Debug)]
pub struct PoolAccounts {
    pub program_id: Pubkey,
    pub fee_recipient: Pubkey,
    pub lookup_table: Pubkey,
    /// commitment tree account
    pub tree: Pubkey,
    /// native vault for the tree
    pub tree_token: Pubkey,
    pub global_config: Pubkey,
}

impl EngineConfig {
    pub fn from_toml(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn asset_tag_mode(&self) -> AssetTagMode {
        self.asset_tag_mode.into()
    }

    /// parse the configured addresses and derive the program's pool accounts
    pub fn accounts(&self) -> Result<PoolAccounts> {
        let program_id = parse_pubkey(&self.program_id)?;
        let (tree, _) = Pubkey::find_program_address(&[b"merkle_tree"], &program_id);
        let (tree_token, _) = Pubkey::find_program_address(&[b"tree_token"], &program_id);
        let (global_config, _) = Pubkey::find_program_address(&[b"global_config"], &program_id);

        Ok(PoolAccounts {
            program_id,
            fee_recipient: parse_pubkey(&self.fee_recipient)?,
            lookup_table: parse_pubkey(&self.lookup_table)?,
            tree,
            tree_token,
            global_config,
        })
    }
}

pub(crate) fn parse_pubkey(s: &str) -> Result<Pubkey> {
    Pubkey::from_str(s).map_err(|_| EngineError::InvalidAddress(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
relayer_url = "http://localhost:3000"
program_id = "Vote111111111111111111111111111111111111111"
fee_recipient = "Stake11111111111111111111111111111111111111"
lookup_table = "So11111111111111111111111111111111111111112"
circuit_wasm = "artifacts/transaction2.wasm"
circuit_r1cs = "artifacts/transaction2.r1cs"
circuit_zkey = "artifacts/transaction2.zkey"
asset_tag_mode = "numeric"
"#
    }

    #[test]
    fn test_toml_parse_with_defaults() {
        let config: EngineConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.fee_rate_bps, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.asset_tag_mode, AssetTagModeConfig::Numeric);
        assert!(!config.verbose);
    }

    #[test]
    fn test_accounts_derivation_is_deterministic() {
        let config: EngineConfig = toml::from_str(sample_toml()).unwrap();
        let a = config.accounts().unwrap();
        let b = config.accounts().unwrap();
        assert_eq!(a.tree, b.tree);
        assert_eq!(a.tree_token, b.tree_token);
        assert_ne!(a.tree, a.tree_token);
    }

    #[test]
    fn test_bad_address_rejected() {
        let mut config: EngineConfig = toml::from_str(sample_toml()).unwrap();
        config.program_id = "not-base58!".into();
        assert!(matches!(
            config.accounts(),
            Err(EngineError::InvalidAddress(_))
        ));
    }
}
