//! Caller identity from request headers

use axum::http::HeaderMap;
use gob_auth::User;
use gob_config::AuthConfig;

/// Derives the caller of a request
pub trait RoleResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> User;
}

/// Reads roles and user id from headers set by an authenticating proxy
#[derive(Debug, Clone)]
pub struct HeaderRoleResolver {
    roles_header: String,
    user_header: String,
}

impl HeaderRoleResolver {
    pub fn new(roles_header: impl Into<String>, user_header: impl Into<String>) -> Self {
        Self {
            roles_header: roles_header.into(),
            user_header: user_header.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.roles_header, &config.user_header)
    }
}

impl Default for HeaderRoleResolver {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl RoleResolver for HeaderRoleResolver {
    fn resolve(&self, headers: &HeaderMap) -> User {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let id = header(&self.user_header).map(str::to_string);
        User::from_role_header(id, header(&self.roles_header).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_roles_and_user_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Auth-Roles", HeaderValue::from_static("gob_a, gob_b"));
        headers.insert("X-Auth-Userid", HeaderValue::from_static("jan"));

        let user = HeaderRoleResolver::default().resolve(&headers);
        assert_eq!(user.id(), Some("jan"));
        assert!(user.has_any_role(&["gob_b".to_string()]));
        assert!(!user.has_any_role(&["gob_c".to_string()]));
    }

    #[test]
    fn test_no_headers_is_anonymous() {
        let user = HeaderRoleResolver::default().resolve(&HeaderMap::new());
        assert_eq!(user.id(), None);
        assert!(user.roles().is_empty());
    }

    #[test]
    fn test_custom_header_names() {
        let mut headers = HeaderMap::new();
        headers.insert("x-roles", HeaderValue::from_static("gob_a"));
        let user = HeaderRoleResolver::new("x-roles", "x-user").resolve(&headers);
        assert!(user.has_any_role(&["gob_a".to_string()]));
    }
}
