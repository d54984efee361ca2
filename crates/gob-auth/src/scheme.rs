//! Role requirements per catalog, collection and attribute
//!
//! ```yaml
//! catalogs:
//!   brk:
//!     roles: [gob_brk]
//!     collections:
//!       kadastralesubjecten:
//!         roles: [gob_brk_subjecten]
//!         attributes:
//!           bsn: [gob_brk_bsn]
//! secure:
//!   levels:
//!     "5": [gob_secure_5]
//! ```
//!
//! Anything not mentioned has no role requirement.

use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Complete authorization scheme
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthScheme {
    #[serde(default)]
    pub catalogs: HashMap<String, CatalogRule>,
    #[serde(default)]
    pub secure: SecureLevels,
}

/// Requirements for a catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRule {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub collections: HashMap<String, CollectionRule>,
}

/// Requirements for a collection and its attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRule {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
}

/// Roles entitled to each confidentiality level of secure values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecureLevels {
    #[serde(default)]
    pub levels: HashMap<String, Vec<String>>,
}

impl SecureLevels {
    /// Roles required for a level; empty when the level is unrestricted
    pub fn roles_for(&self, level: u32) -> &[String] {
        self.levels
            .get(&level.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl AuthScheme {
    /// Load a scheme, choosing the parser by file extension
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        debug!(path = %path.display(), "Reading auth scheme");

        match extension.as_str() {
            "json" => serde_json::from_str(&contents).map_err(|e| AuthError::Parse {
                format: "json",
                message: e.to_string(),
            }),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| AuthError::Parse {
                format: "yaml",
                message: e.to_string(),
            }),
            #[cfg(feature = "toml")]
            "toml" => toml::from_str(&contents).map_err(|e| AuthError::Parse {
                format: "toml",
                message: e.to_string(),
            }),
            other => Err(AuthError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Roles required to read a catalog
    pub fn catalog_roles(&self, catalog: &str) -> &[String] {
        self.catalogs
            .get(catalog)
            .map(|c| c.roles.as_slice())
            .unwrap_or(&[])
    }

    fn collection_rule(&self, catalog: &str, collection: &str) -> Option<&CollectionRule> {
        self.catalogs.get(catalog)?.collections.get(collection)
    }

    /// Roles required to read a collection
    pub fn collection_roles(&self, catalog: &str, collection: &str) -> &[String] {
        self.collection_rule(catalog, collection)
            .map(|c| c.roles.as_slice())
            .unwrap_or(&[])
    }

    /// Roles required to read an attribute
    pub fn attribute_roles(&self, catalog: &str, collection: &str, attribute: &str) -> &[String] {
        self.collection_rule(catalog, collection)
            .and_then(|c| c.attributes.get(attribute))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
