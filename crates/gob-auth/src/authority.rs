//! Per collection authorization decisions

use crate::scheme::AuthScheme;
use crate::secure::{Cipher, SecureUser};
use crate::user::User;
use gob_model::{Attribute, AttributeType, Registry, SecureKind};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Where secure values live inside an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInfo {
    /// The attribute itself is a secure value
    Secure(SecureKind),
    /// Structured attribute with secure values among its nested attributes
    Structured(HashMap<String, TypeInfo>),
}

/// Everything needed to authorize one request
///
/// Cheap to build: the registry, scheme and cipher are shared snapshots, the
/// user is resolved from the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    registry: Arc<Registry>,
    scheme: Arc<AuthScheme>,
    cipher: Arc<dyn Cipher>,
    user: User,
}

impl AuthContext {
    pub fn new(
        registry: Arc<Registry>,
        scheme: Arc<AuthScheme>,
        cipher: Arc<dyn Cipher>,
        user: User,
    ) -> Self {
        Self {
            registry,
            scheme,
            cipher,
            user,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    /// Derive the authority for a collection
    pub fn authority(&self, catalog: &str, collection: &str) -> Authority<'_> {
        Authority::new(self, catalog, collection)
    }

    fn secure_user(&self) -> SecureUser<'_> {
        SecureUser::new(&self.user, &self.scheme.secure, self.cipher.as_ref())
    }
}

/// Authorization decisions for one (catalog, collection) pair
#[derive(Debug)]
pub struct Authority<'a> {
    ctx: &'a AuthContext,
    catalog: String,
    collection: String,
    allows_access: bool,
    suppressed: HashSet<String>,
    secured: HashMap<String, TypeInfo>,
}

impl<'a> Authority<'a> {
    pub fn new(ctx: &'a AuthContext, catalog: &str, collection: &str) -> Self {
        let scheme = ctx.scheme();
        let user = ctx.user();

        let allows_access = user.has_any_role(scheme.catalog_roles(catalog))
            && user.has_any_role(scheme.collection_roles(catalog, collection));

        let attributes: &[Attribute] = ctx
            .registry()
            .collection(catalog, collection)
            .map(|c| c.attributes.as_slice())
            .unwrap_or(&[]);

        let suppressed: HashSet<String> = attributes
            .iter()
            .filter(|a| {
                !allows_access
                    || !user.has_any_role(scheme.attribute_roles(catalog, collection, &a.name))
            })
            .map(|a| a.name.clone())
            .collect();

        let secured = secured_attributes(attributes);

        if !allows_access || !suppressed.is_empty() {
            debug!(
                catalog,
                collection,
                allows_access,
                suppressed = suppressed.len(),
                "Authority restricts collection"
            );
        }

        Self {
            ctx,
            catalog: catalog.to_string(),
            collection: collection.to_string(),
            allows_access,
            suppressed,
            secured,
        }
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Catalog and collection role check
    pub fn allows_access(&self) -> bool {
        self.allows_access
    }

    /// Attributes the caller may not see; all attributes when the collection
    /// itself is inaccessible
    pub fn suppressed_columns(&self) -> &HashSet<String> {
        &self.suppressed
    }

    /// Attributes holding secure values, directly or nested
    pub fn secured_columns(&self) -> &HashMap<String, TypeInfo> {
        &self.secured
    }

    /// Apply the policy to a row keyed by attribute name
    ///
    /// Suppressed attributes become `null`, secure attributes are replaced by
    /// their readable value or the placeholder. For an inaccessible
    /// collection every attribute becomes `null`. Internal keys (leading
    /// underscore) are left alone.
    pub fn filter_row(&self, row: &mut Map<String, Value>) {
        let secure_user = self.ctx.secure_user();

        for (key, value) in row.iter_mut() {
            if key.starts_with('_') {
                continue;
            }
            if !self.allows_access || self.suppressed.contains(key) {
                *value = Value::Null;
                continue;
            }
            if let Some(info) = self.secured.get(key) {
                *value = reveal(&secure_user, value, info);
            }
        }
    }
}

fn secured_attributes(attributes: &[Attribute]) -> HashMap<String, TypeInfo> {
    attributes
        .iter()
        .filter_map(|a| match a.attribute_type {
            AttributeType::Secure(kind) => Some((a.name.clone(), TypeInfo::Secure(kind))),
            AttributeType::Json if !a.nested.is_empty() => {
                let nested = secured_attributes(&a.nested);
                (!nested.is_empty()).then(|| (a.name.clone(), TypeInfo::Structured(nested)))
            }
            _ => None,
        })
        .collect()
}

fn reveal(secure_user: &SecureUser<'_>, value: &Value, info: &TypeInfo) -> Value {
    match info {
        TypeInfo::Secure(kind) => secure_user.reveal(value, *kind),
        TypeInfo::Structured(nested) => match value {
            Value::Object(map) => {
                let mut map = map.clone();
                for (key, nested_info) in nested {
                    if let Some(v) = map.get_mut(key) {
                        *v = reveal(secure_user, v, nested_info);
                    }
                }
                Value::Object(map)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| reveal(secure_user, item, info))
                    .collect(),
            ),
            // Structured values may still be JSON text when read by other surfaces
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(parsed) if parsed.is_object() || parsed.is_array() => {
                    reveal(secure_user, &parsed, info)
                }
                _ => value.clone(),
            },
            _ => value.clone(),
        },
    }
}
