//! Secure (encrypted) attribute values
//!
//! A secure value is stored as an envelope `{"i": key id, "l": level, "v":
//! payload}`. The level is the confidentiality level; the scheme lists which
//! roles may read each level. Decryption never fails a request: a caller
//! without the right role, or a payload that cannot be decrypted, gets
//! [`PLACEHOLDER`] instead of the value.

use crate::scheme::SecureLevels;
use crate::user::User;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gob_model::SecureKind;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, warn};

/// Value returned for secure data the caller may not read
pub const PLACEHOLDER: &str = "**********";

/// Decrypts secure payloads
pub trait Cipher: Send + Sync + fmt::Debug {
    /// Decrypt a payload with the given key; `None` when it cannot be decrypted
    fn decrypt(&self, key_id: &str, payload: &str) -> Option<String>;
}

/// Keyless development cipher: payloads are plain base64
///
/// Meant for local databases and tests; production deployments plug in a
/// keyed [`Cipher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Cipher;

impl Base64Cipher {
    /// Build an envelope for a plaintext value
    pub fn seal(level: u32, plaintext: &str) -> Value {
        json!({
            "i": "dev",
            "l": level,
            "v": STANDARD.encode(plaintext.as_bytes()),
        })
    }
}

impl Cipher for Base64Cipher {
    fn decrypt(&self, _key_id: &str, payload: &str) -> Option<String> {
        let bytes = STANDARD.decode(payload).ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Parsed secure value envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureEnvelope {
    pub key_id: String,
    pub level: u32,
    pub payload: String,
}

impl SecureEnvelope {
    /// Parse an envelope from a JSON object or from JSON text
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                key_id: map.get("i")?.as_str()?.to_string(),
                level: u32::try_from(map.get("l")?.as_u64()?).ok()?,
                payload: map.get("v")?.as_str()?.to_string(),
            }),
            Value::String(text) => serde_json::from_str::<Value>(text)
                .ok()
                .filter(Value::is_object)
                .and_then(|v| Self::from_value(&v)),
            _ => None,
        }
    }
}

/// Outcome of unsealing a secure value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsealed {
    Plain(String),
    /// Caller not entitled, or payload undecryptable
    Denied,
}

/// Caller identity bound to the secure level policy and a cipher
#[derive(Debug, Clone, Copy)]
pub struct SecureUser<'a> {
    user: &'a User,
    levels: &'a SecureLevels,
    cipher: &'a dyn Cipher,
}

impl<'a> SecureUser<'a> {
    pub fn new(user: &'a User, levels: &'a SecureLevels, cipher: &'a dyn Cipher) -> Self {
        Self {
            user,
            levels,
            cipher,
        }
    }

    /// Whether the caller may read values of a confidentiality level
    pub fn has_access_to(&self, level: u32) -> bool {
        self.user.has_any_role(self.levels.roles_for(level))
    }

    /// Decrypt an envelope when the caller is entitled to it
    pub fn unseal(&self, envelope: &SecureEnvelope) -> Unsealed {
        if !self.has_access_to(envelope.level) {
            debug!(level = envelope.level, user = ?self.user.id(), "Secure value denied");
            return Unsealed::Denied;
        }
        match self.cipher.decrypt(&envelope.key_id, &envelope.payload) {
            Some(plain) => Unsealed::Plain(plain),
            None => {
                warn!(key_id = %envelope.key_id, "Secure value could not be decrypted");
                Unsealed::Denied
            }
        }
    }

    /// Replace a stored secure value by its readable form
    ///
    /// `null` stays `null`; anything that is not an envelope or cannot be
    /// read becomes [`PLACEHOLDER`].
    pub fn reveal(&self, value: &Value, kind: SecureKind) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        let Some(envelope) = SecureEnvelope::from_value(value) else {
            warn!("Secure attribute holds a value that is not an envelope");
            return Value::String(PLACEHOLDER.to_string());
        };
        match self.unseal(&envelope) {
            Unsealed::Plain(plain) => typed(plain, kind),
            Unsealed::Denied => Value::String(PLACEHOLDER.to_string()),
        }
    }
}

fn typed(plain: String, kind: SecureKind) -> Value {
    match kind {
        SecureKind::Decimal => plain
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(plain)),
        SecureKind::String | SecureKind::Date | SecureKind::DateTime => Value::String(plain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    fn levels() -> SecureLevels {
        SecureLevels {
            levels: HashMap::from([("5".to_string(), vec!["gob_level_5".to_string()])]),
        }
    }

    #[test]
    fn test_envelope_from_object_and_text() {
        let sealed = Base64Cipher::seal(5, "123456789");
        let from_object = SecureEnvelope::from_value(&sealed).unwrap();
        let from_text = SecureEnvelope::from_value(&Value::String(sealed.to_string())).unwrap();
        assert_eq!(from_object, from_text);
        assert_eq!(from_object.level, 5);
    }

    #[test]
    fn test_reveal_authorized() {
        let user = User::new(None, ["gob_level_5"]);
        let levels = levels();
        let secure = SecureUser::new(&user, &levels, &Base64Cipher);

        let value = secure.reveal(&Base64Cipher::seal(5, "123456789"), SecureKind::String);
        assert_eq!(value, json!("123456789"));
    }

    #[test]
    fn test_reveal_denied_is_placeholder() {
        let user = User::anonymous();
        let levels = levels();
        let secure = SecureUser::new(&user, &levels, &Base64Cipher);

        let value = secure.reveal(&Base64Cipher::seal(5, "123456789"), SecureKind::String);
        assert_eq!(value, json!(PLACEHOLDER));
    }

    #[test]
    fn test_reveal_unrestricted_level() {
        let user = User::anonymous();
        let levels = levels();
        let secure = SecureUser::new(&user, &levels, &Base64Cipher);

        let value = secure.reveal(&Base64Cipher::seal(1, "12.5"), SecureKind::Decimal);
        assert_eq!(value, json!(12.5));
    }

    #[test_case(SecureKind::String, "12.5", json!("12.5"); "string stays text")]
    #[test_case(SecureKind::Decimal, "12.5", json!(12.5); "decimal becomes number")]
    #[test_case(SecureKind::Decimal, "n/a", json!("n/a"); "unparsable decimal stays text")]
    #[test_case(SecureKind::Date, "1970-01-01", json!("1970-01-01"); "date")]
    #[test_case(SecureKind::DateTime, "1970-01-01T00:00:00", json!("1970-01-01T00:00:00"); "datetime")]
    fn test_reveal_typed(kind: SecureKind, plain: &str, expected: Value) {
        let user = User::new(None, ["gob_level_5"]);
        let levels = levels();
        let secure = SecureUser::new(&user, &levels, &Base64Cipher);

        assert_eq!(secure.reveal(&Base64Cipher::seal(5, plain), kind), expected);
    }

    #[test]
    fn test_reveal_garbage_and_null() {
        let user = User::new(None, ["gob_level_5"]);
        let levels = levels();
        let secure = SecureUser::new(&user, &levels, &Base64Cipher);

        assert_eq!(secure.reveal(&Value::Null, SecureKind::String), Value::Null);
        assert_eq!(
            secure.reveal(&json!("plain text"), SecureKind::String),
            json!(PLACEHOLDER)
        );
        let broken = json!({"i": "dev", "l": 5, "v": "%%%"});
        assert_eq!(
            secure.reveal(&broken, SecureKind::String),
            json!(PLACEHOLDER)
        );
    }
}
