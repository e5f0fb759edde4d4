//! Telegram Web App `initData` verification.
//!
//! The Telegram client SDK hands the Mini App a URL-query-encoded credential such as
//! `query_id=...&user=%7B%22id%22%3A...%7D&auth_date=...&hash=<hex>`. It is verified as:
//!
//! 1. Parse the pairs and remove `hash`.
//! 2. Sort the remaining keys and join `key=value` lines with `\n` (the data-check-string).
//! 3. `secret_key = HMAC-SHA256(key = "WebAppData", msg = bot_token)`.
//! 4. `hash == hex(HMAC-SHA256(key = secret_key, msg = data_check_string))`, compared in
//!    constant time.
//! 5. The `user` field holds the JSON principal.
//!
//! The bot token is kept in a `SecretString` so it cannot end up in logs.

use super::{AdminIdentity, AdminRequest, AllowList, AuthError, CredentialProvider};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// Identity extracted from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Telegram user id
    pub id: i64,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name, may be empty
    #[serde(default)]
    pub last_name: String,
    /// Telegram username, may be empty
    #[serde(default)]
    pub username: String,
}

/// Why a credential was rejected. Only ever logged; callers see [`AuthError`].
#[derive(Debug, Error)]
enum Rejection {
    #[error("credential string is empty or malformed")]
    Malformed,
    #[error("credential has no hash field")]
    MissingHash,
    #[error("hash does not match")]
    BadSignature,
    #[error("credential has no user field")]
    MissingUser,
    #[error("user field is not a valid principal: {0}")]
    InvalidUser(#[from] serde_json::Error),
    #[error("principal {0} is not on the allow-list")]
    NotAllowed(i64),
}

impl From<Rejection> for AuthError {
    fn from(rejection: Rejection) -> Self {
        debug!("Signed credential rejected: {}", rejection);
        match rejection {
            Rejection::NotAllowed(_) => Self::Forbidden,
            _ => Self::Unauthorized,
        }
    }
}

/// Parses the credential into sorted key/value pairs. On duplicate keys the last one wins.
fn parse_fields(init_data: &str) -> Result<BTreeMap<String, String>, Rejection> {
    let fields: BTreeMap<String, String> = form_urlencoded::parse(init_data.trim().as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if fields.is_empty() || fields.contains_key("") {
        return Err(Rejection::Malformed);
    }
    Ok(fields)
}

/// Builds the data-check-string: every field except `hash`, sorted by key, as
/// `key=value` lines joined by `\n`.
#[must_use]
pub fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this only fails if the hmac crate changes contract
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return Vec::new();
    };
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Computes the lowercase hex hash the Telegram client would attach to `check_string`.
#[must_use]
pub fn compute_hash(bot_token: &str, check_string: &str) -> String {
    let secret_key = hmac_sha256(WEB_APP_DATA_KEY, bot_token.as_bytes());
    hex::encode(hmac_sha256(&secret_key, check_string.as_bytes()))
}

/// Credential provider for signed Telegram `initData`.
pub struct SignedCredentialProvider {
    bot_token: SecretString,
    allow_list: AllowList,
}

impl SignedCredentialProvider {
    /// Creates a provider verifying against `bot_token` and authorizing `allow_list`.
    #[must_use]
    pub const fn new(bot_token: SecretString, allow_list: AllowList) -> Self {
        Self {
            bot_token,
            allow_list,
        }
    }

    /// Verifies the signature of `init_data` and extracts its principal.
    ///
    /// This checks authenticity only; [`authorize`](Self::authorize) also applies the
    /// allow-list.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] for any malformed, unsigned or tampered credential.
    pub fn verify(&self, init_data: &str) -> Result<Principal, AuthError> {
        Ok(self.verify_inner(init_data)?)
    }

    /// Verifies `init_data` and requires its principal to be on the allow-list.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] if verification fails, [`AuthError::Forbidden`] if the
    /// principal is authentic but not an admin.
    pub fn authorize(&self, init_data: &str) -> Result<Principal, AuthError> {
        let principal = self.verify_inner(init_data)?;
        if !self.allow_list.contains(principal.id) {
            return Err(Rejection::NotAllowed(principal.id).into());
        }
        Ok(principal)
    }

    fn verify_inner(&self, init_data: &str) -> Result<Principal, Rejection> {
        let mut fields = parse_fields(init_data)?;
        let supplied = fields.remove("hash").ok_or(Rejection::MissingHash)?;

        let expected = compute_hash(
            self.bot_token.expose_secret(),
            &data_check_string(&fields),
        );
        if !bool::from(expected.as_bytes().ct_eq(supplied.as_bytes())) {
            return Err(Rejection::BadSignature);
        }

        let user = fields.get("user").ok_or(Rejection::MissingUser)?;
        Ok(serde_json::from_str(user)?)
    }
}

impl CredentialProvider for SignedCredentialProvider {
    fn name(&self) -> &'static str {
        "telegram-init-data"
    }

    fn authenticate(&self, request: &AdminRequest) -> Result<AdminIdentity, AuthError> {
        let init_data = request.init_data().ok_or(AuthError::Unauthorized)?;
        self.authorize(&init_data).map(AdminIdentity::SignedPrincipal)
    }
}
