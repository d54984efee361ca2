//! Configuration and shared resources for commands

use crate::cli::{CallerArgs, Cli};
use anyhow::{Context, Result};
use gob_auth::{AuthContext, AuthScheme, Base64Cipher, User};
use gob_config::{ConfigLoader, GobConfig};
use gob_model::Registry;
use gob_sqlite::{SqliteConfig, SqliteStore};
use std::io::Read;
use std::sync::Arc;

/// Effective configuration: file and environment, then command line overrides
pub fn load_config(cli: &Cli) -> Result<GobConfig> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    if let Some(path) = &cli.model {
        config.model.path = path.clone();
    }
    if let Some(path) = &cli.auth_scheme {
        config.auth.scheme_path = Some(path.clone());
    }
    Ok(config)
}

pub fn registry(config: &GobConfig) -> Result<Registry> {
    Registry::from_file(&config.model.path)
        .with_context(|| format!("Failed to load model {}", config.model.path.display()))
}

pub fn sqlite_config(config: &GobConfig) -> SqliteConfig {
    SqliteConfig::new(&config.database.path)
        .with_busy_timeout(config.database.busy_timeout_ms)
        .with_mmap_size(config.database.mmap_size)
}

pub fn store(config: &GobConfig) -> Result<SqliteStore> {
    SqliteStore::new(sqlite_config(config))
        .with_context(|| format!("Failed to open {}", config.database.path.display()))
}

/// Authorization context for the caller named on the command line
pub fn auth_context(config: &GobConfig, caller: &CallerArgs) -> Result<AuthContext> {
    let scheme = match &config.auth.scheme_path {
        Some(path) => AuthScheme::from_file(path)
            .with_context(|| format!("Failed to load auth scheme {}", path.display()))?,
        None => AuthScheme::default(),
    };
    Ok(AuthContext::new(
        Arc::new(registry(config)?),
        Arc::new(scheme),
        Arc::new(Base64Cipher),
        User::from_role_header(caller.user.clone(), &caller.roles),
    ))
}

/// Query from the argument, or all of stdin
pub fn read_query(query: Option<String>) -> Result<String> {
    match query {
        Some(query) => Ok(query),
        None => {
            let mut query = String::new();
            std::io::stdin()
                .read_to_string(&mut query)
                .context("Failed to read query from stdin")?;
            Ok(query)
        }
    }
}
