//! Shared, read-only application state

use crate::error::Result;
use crate::roles::{HeaderRoleResolver, RoleResolver};
use axum::http::HeaderMap;
use gob_auth::{AuthContext, AuthScheme, Base64Cipher, Cipher};
use gob_config::{GobConfig, StreamingConfig};
use gob_model::Registry;
use gob_sqlite::{SqliteConfig, SqliteStore};
use std::sync::Arc;
use tracing::info;

/// Everything a request needs; cloned per request, never mutated
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub scheme: Arc<AuthScheme>,
    pub cipher: Arc<dyn Cipher>,
    pub store: SqliteStore,
    pub resolver: Arc<dyn RoleResolver>,
    pub streaming: StreamingConfig,
}

impl AppState {
    /// Unrestricted state with the development cipher and default headers
    pub fn new(registry: Registry, store: SqliteStore) -> Self {
        Self {
            registry: Arc::new(registry),
            scheme: Arc::new(AuthScheme::default()),
            cipher: Arc::new(Base64Cipher),
            store,
            resolver: Arc::new(HeaderRoleResolver::default()),
            streaming: StreamingConfig::default(),
        }
    }

    /// Load model, auth scheme and store as configured
    pub fn from_config(config: &GobConfig) -> Result<Self> {
        let registry = Registry::from_file(&config.model.path)?;
        let store = SqliteStore::new(
            SqliteConfig::new(&config.database.path)
                .with_busy_timeout(config.database.busy_timeout_ms)
                .with_mmap_size(config.database.mmap_size),
        )?;

        let scheme = match &config.auth.scheme_path {
            Some(path) => AuthScheme::from_file(path)?,
            None => {
                info!("No auth scheme configured, all collections are unrestricted");
                AuthScheme::default()
            }
        };

        Ok(Self::new(registry, store)
            .with_scheme(scheme)
            .with_resolver(HeaderRoleResolver::from_config(&config.auth))
            .with_streaming(config.streaming.clone()))
    }

    pub fn with_scheme(mut self, scheme: AuthScheme) -> Self {
        self.scheme = Arc::new(scheme);
        self
    }

    pub fn with_cipher(mut self, cipher: impl Cipher + 'static) -> Self {
        self.cipher = Arc::new(cipher);
        self
    }

    pub fn with_resolver(mut self, resolver: impl RoleResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_streaming(mut self, streaming: StreamingConfig) -> Self {
        self.streaming = streaming;
        self
    }

    /// Request-scoped authorization context for the caller of `headers`
    pub fn auth_context(&self, headers: &HeaderMap) -> AuthContext {
        AuthContext::new(
            self.registry.clone(),
            self.scheme.clone(),
            self.cipher.clone(),
            self.resolver.resolve(headers),
        )
    }
}
