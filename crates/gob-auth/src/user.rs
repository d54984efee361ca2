//! Request-scoped caller identity

use std::collections::HashSet;

/// Caller as resolved from the request
///
/// Authentication happens upstream; this only carries what it resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    id: Option<String>,
    roles: HashSet<String>,
}

impl User {
    /// Caller without identity or roles
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(id: Option<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma separated role list (`X-Auth-Roles` header format)
    pub fn from_role_header(id: Option<String>, header: &str) -> Self {
        Self::new(
            id,
            header
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        )
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    /// True when no roles are required or the caller holds one of them
    pub fn has_any_role(&self, required: &[String]) -> bool {
        required.is_empty() || required.iter().any(|r| self.roles.contains(r))
    }
}
