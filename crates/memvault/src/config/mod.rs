use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Memvault
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Vault storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Index configuration (embedding dimension and search behavior)
    #[serde(default)]
    pub index: IndexConfig,
}

/// Vault storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the vault log and key file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Path to the 32-byte encryption key file.
    /// Defaults to `<data_dir>/vault.key`; created on first run if absent.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved key file path (explicit setting or `<data_dir>/vault.key`)
    pub fn key_path(&self) -> PathBuf {
        self.key_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("vault.key"))
    }

    /// Path of the vault log inside the data directory
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join("vault.log")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            key_file: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".memvault"))
        .unwrap_or_else(|| PathBuf::from(".memvault"))
}

/// HTTP API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Address to listen on (e.g., "127.0.0.1:7070")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:7070".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Index configuration
///
/// The embedding dimension is a service-wide invariant: every stored record
/// and every query must carry exactly this many components. It is fixed at
/// deployment and baked into the vault file header, so changing it requires
/// a new vault.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Embedding dimension for all records and queries
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: default_embedding_dimension(),
        }
    }
}

fn default_embedding_dimension() -> usize {
    384
}
