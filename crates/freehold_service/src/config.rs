//! Configuration settings structures
//!
//! This module defines the configuration consumed when embedding Freehold
//! in a host server, serializable to/from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Root configuration object.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FreeholdConfig {
    /// Multi-server partition settings
    pub shard: ShardSettings,
    /// Cache tuning
    pub cache: CacheSettings,
    /// Storage backend selection
    pub storage: StorageSettings,
    /// Optional logging configuration
    pub logging: Option<LoggingSettings>,
}

/// Which deployment shard this server is.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ShardSettings {
    /// Shard id; regions carry the shard that owns them and the caches
    /// admit only records of the local shard.
    pub id: i32,
}

/// Cache tuning knobs.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CacheSettings {
    /// Sector edge length of the spatial index, in blocks.
    ///
    /// Smaller sectors shorten the candidate scan per point query in dense
    /// layouts at the cost of more buckets per claim.
    pub sector_size: i32,
}

/// Storage backend selection.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StorageSettings {
    /// Which backend to open.
    pub backend: StorageBackend,
    /// Data directory for file-backed backends.
    pub data_dir: String,
}

/// Available storage backends.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process tables; records do not survive a restart.
    Memory,
    /// One JSON document per record under `data_dir`.
    Json,
}

/// Logging system configuration.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoggingSettings {
    /// Logging level filter: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable JSON-formatted log output for log aggregation systems.
    pub json_format: bool,
}

impl Default for FreeholdConfig {
    /// Defaults suitable for local development: single shard, in-memory
    /// storage, plain info-level logs.
    fn default() -> Self {
        Self {
            shard: ShardSettings { id: 0 },
            cache: CacheSettings {
                sector_size: freehold_cache::DEFAULT_SECTOR_SIZE,
            },
            storage: StorageSettings {
                backend: StorageBackend::Memory,
                data_dir: "data/freehold".to_string(),
            },
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            }),
        }
    }
}

/// Read and parse a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<FreeholdConfig, ServiceError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ServiceError::ConfigRead(path.to_path_buf(), e))?;
    toml::from_str(&contents).map_err(|e| ServiceError::ConfigParse(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = FreeholdConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: FreeholdConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.shard.id, config.shard.id);
        assert_eq!(parsed.cache.sector_size, config.cache.sector_size);
        assert_eq!(parsed.storage.backend, config.storage.backend);
    }

    #[test]
    fn parses_a_minimal_deployment_file() {
        let parsed: FreeholdConfig = toml::from_str(
            r#"
            [shard]
            id = 3

            [cache]
            sector_size = 32

            [storage]
            backend = "json"
            data_dir = "/var/lib/freehold"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.shard.id, 3);
        assert_eq!(parsed.cache.sector_size, 32);
        assert_eq!(parsed.storage.backend, StorageBackend::Json);
        assert!(parsed.logging.is_none());
    }

    #[test]
    fn missing_file_is_a_typed_error() {
        let err = load_config("/nonexistent/freehold.toml").unwrap_err();
        assert!(matches!(err, ServiceError::ConfigRead(_, _)));
    }
}
