//! Authorization for GOB collections
//!
//! An [`Authority`] is derived per request for every (catalog, collection)
//! pair that is touched. It decides whether the caller may read the
//! collection at all, which attributes are suppressed and which attributes
//! hold encrypted values that are decrypted when the caller is entitled to
//! them. [`Authority::filter_row`] is the single place where that policy is
//! applied to data.

pub mod authority;
pub mod error;
pub mod scheme;
pub mod secure;
pub mod user;

// Re-exports
pub use authority::{AuthContext, Authority, TypeInfo};
pub use error::{AuthError, AuthResult};
pub use scheme::{AuthScheme, CatalogRule, CollectionRule, SecureLevels};
pub use secure::{Base64Cipher, Cipher, SecureEnvelope, SecureUser, Unsealed, PLACEHOLDER};
pub use user::User;
