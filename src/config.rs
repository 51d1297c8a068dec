//! Protocol constants and runtime configuration.
//!
//! Constants here are consensus-critical: changing any of them forks the
//! ledger away from the network.

use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Base currency ticker. Asset ID 0 is reserved for it and can never be
/// dispensed or credited through the ledger.
pub const BTC: &str = "BTC";

/// Native protocol token, asset ID 1.
pub const XCP: &str = "XCP";

/// Fixed-point scaling factor for divisible quantities and fee fractions.
pub const UNIT: i64 = 100_000_000;

/// Largest quantity storable in the ledger (SQLite INTEGER is a signed
/// 64-bit value). Anything above this is a validation error.
pub const MAX_INT: i64 = i64::MAX;

/// Per-address option bit: broadcasts may require a memo on incoming sends.
pub const ADDRESS_OPTION_REQUIRE_MEMO: i64 = 1;

/// Bit-mask of all currently defined address options.
pub const ADDRESS_OPTION_MAX_VALUE: i64 = ADDRESS_OPTION_REQUIRE_MEMO;

/// Dust threshold for regular (non-multisig) outputs, in satoshis.
/// Oracle fees below this never require an output.
pub const DEFAULT_REGULAR_DUST_SIZE: u64 = 546;

/// Largest asset ID representable by a 12-character alphabetic name.
/// Numeric assets live strictly above this bound.
pub const MAX_ALPHA_ASSET_ID: u64 = 26u64.pow(12);

/// Smallest asset ID representable by a 4-character alphabetic name.
pub const MIN_ALPHA_ASSET_ID: u64 = 26u64.pow(3);

/// The Bitcoin network the ledger replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mainnet" => Some(Self::Mainnet),
            "testnet" => Some(Self::Testnet),
            "regtest" => Some(Self::Regtest),
            _ => None,
        }
    }
}

/// Runtime configuration loaded from config.toml or environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub network: Network,
    pub database: DatabaseConfig,
    pub dust: DustConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub default_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DustConfig {
    pub regular_dust_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Snapshot of oldest-transaction lookups used by the empty-address
    /// dispenser rule. Optional; an absent file disables the check data.
    pub oldest_tx_snapshot: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from config.toml file and environment variables.
    /// Environment variables take precedence over file configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("network", "mainnet")?
            .set_default("database.default_path", "./xcp_consensus.db")?
            .set_default("dust.regular_dust_size", DEFAULT_REGULAR_DUST_SIZE)?
            .set_default("paths.oldest_tx_snapshot", None::<String>)?
            .add_source(File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("XCP"));

        let mut app_config: AppConfig = builder.build()?.try_deserialize()?;

        if let Ok(network) = env::var("XCP_NETWORK") {
            app_config.network = Network::from_str_opt(&network)
                .ok_or_else(|| ConfigError::Message(format!("unknown network: {network}")))?;
        }

        if let Ok(db_path) = env::var("XCP_DATABASE_PATH") {
            app_config.database.default_path = PathBuf::from(db_path);
        }

        Ok(app_config)
    }

    /// Sensible defaults when no config file is present.
    pub fn get_defaults() -> Self {
        Self {
            network: Network::Mainnet,
            database: DatabaseConfig {
                default_path: PathBuf::from("./xcp_consensus.db"),
            },
            dust: DustConfig {
                regular_dust_size: DEFAULT_REGULAR_DUST_SIZE,
            },
            paths: PathsConfig {
                oldest_tx_snapshot: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_defaults() {
        let config = AppConfig::get_defaults();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.dust.regular_dust_size, DEFAULT_REGULAR_DUST_SIZE);
        assert!(config.paths.oldest_tx_snapshot.is_none());
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!(Network::from_str_opt("Mainnet"), Some(Network::Mainnet));
        assert_eq!(Network::from_str_opt("regtest"), Some(Network::Regtest));
        assert_eq!(Network::from_str_opt("signet"), None);
    }

    #[test]
    fn test_alpha_asset_id_bounds() {
        // 4-char names start at 26^3, 12-char names end at 26^12 - 1
        assert_eq!(MIN_ALPHA_ASSET_ID, 17_576);
        assert!(MAX_ALPHA_ASSET_ID > MIN_ALPHA_ASSET_ID);
    }
}
