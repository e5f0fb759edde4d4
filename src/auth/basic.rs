//! Static username/password credential (HTTP Basic).
//!
//! This path grants the same access as a verified Telegram admin. It is only enabled when
//! a non-empty `ADMIN_PASSWORD` is configured.

use super::{AdminIdentity, AdminRequest, AuthError, CredentialProvider};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Credential provider for a single static admin account.
pub struct StaticCredentialProvider {
    username: String,
    password: SecretString,
}

impl StaticCredentialProvider {
    /// Creates the provider, or `None` when `password` is empty.
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Option<Self> {
        if password.expose_secret().is_empty() {
            return None;
        }
        Some(Self {
            username: username.into(),
            password,
        })
    }

    /// Checks an `Authorization` header value of the form `Basic base64(user:password)`.
    #[must_use]
    pub fn check(&self, authorization: &str) -> bool {
        let Some((username, password)) = decode_basic(authorization) else {
            debug!("Authorization header is not valid Basic credentials");
            return false;
        };

        let username_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let password_ok = password
            .as_bytes()
            .ct_eq(self.password.expose_secret().as_bytes());
        bool::from(username_ok & password_ok)
    }
}

fn decode_basic(authorization: &str) -> Option<(String, String)> {
    let encoded = authorization.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

impl CredentialProvider for StaticCredentialProvider {
    fn name(&self) -> &'static str {
        "static-credential"
    }

    fn authenticate(&self, request: &AdminRequest) -> Result<AdminIdentity, AuthError> {
        let authorization = request
            .authorization
            .as_deref()
            .ok_or(AuthError::Unauthorized)?;
        if self.check(authorization) {
            Ok(AdminIdentity::StaticCredential {
                username: self.username.clone(),
            })
        } else {
            Err(AuthError::Unauthorized)
        }
    }
}
