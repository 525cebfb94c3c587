use std::sync::Arc;

use engui_cloud::store::LocalStore;
use engui_core::crypto::SecretCipher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: engui_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Encrypts and decrypts provider secrets in `user_settings`.
    pub cipher: SecretCipher,
    /// Shared HTTP client for RunPod calls and result downloads.
    pub http: reqwest::Client,
    /// Local media store rooted at `STORAGE_DIR`.
    pub local_store: Arc<LocalStore>,
}

impl AppState {
    /// Build state from a pool and configuration.
    pub fn new(pool: engui_db::DbPool, config: ServerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(engui_cloud::runpod::DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            pool,
            cipher: SecretCipher::from_passphrase(&config.encryption_key),
            local_store: Arc::new(LocalStore::new(config.storage_dir.clone())),
            http,
            config: Arc::new(config),
        })
    }
}
