//! Admin trust verification.
//!
//! Mutating admin operations are gated by [`AdminVerifier`], which asks each configured
//! [`CredentialProvider`] in turn. Two providers exist and either one grants identical
//! access:
//! - [`StaticCredentialProvider`]: HTTP Basic username/password
//! - [`SignedCredentialProvider`]: Telegram Web App `initData` signed with the bot token,
//!   whose principal must be on the [`AllowList`]
//!
//! Denials never say which check failed. The reason is logged at debug level only.

/// Allow-list of admin Telegram ids
pub mod allow_list;
/// HTTP Basic static credential
pub mod basic;
/// Telegram `initData` signature verification
pub mod init_data;

pub use allow_list::AllowList;
pub use basic::StaticCredentialProvider;
pub use init_data::{Principal, SignedCredentialProvider};

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use thiserror::Error;
use tracing::{info, warn};

/// Outcome of a denied admin request.
///
/// Both variants display the same generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential, or a credential that failed verification
    #[error("Access denied")]
    Unauthorized,
    /// Authentic principal that is not an administrator
    #[error("Access denied")]
    Forbidden,
}

/// Credentials carried by one admin request, as extracted by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct AdminRequest {
    /// `Authorization` header
    pub authorization: Option<String>,
    /// `X-Telegram-Init-Data` header
    pub init_data_header: Option<String>,
    /// `tg_init_data` query parameter
    pub init_data_query: Option<String>,
    /// `tg_init_data` cookie, still percent-encoded
    pub init_data_cookie: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl AdminRequest {
    /// The signed credential, taken from the header, the query parameter or the cookie,
    /// in that order. Empty values are skipped.
    #[must_use]
    pub fn init_data(&self) -> Option<Cow<'_, str>> {
        if let Some(value) =
            non_empty(self.init_data_header.as_deref())
                .or_else(|| non_empty(self.init_data_query.as_deref()))
        {
            return Some(Cow::Borrowed(value));
        }
        non_empty(self.init_data_cookie.as_deref())
            .and_then(|cookie| percent_decode_str(cookie).decode_utf8().ok())
    }
}

/// Who was let in, and by which path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminIdentity {
    /// Static username/password
    StaticCredential {
        /// The configured admin username
        username: String,
    },
    /// Verified Telegram principal on the allow-list
    SignedPrincipal(Principal),
}

impl AdminIdentity {
    /// Short label for audit logs.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::StaticCredential { username } => format!("static:{username}"),
            Self::SignedPrincipal(principal) => {
                format!("telegram:{} ({})", principal.id, principal.first_name)
            }
        }
    }
}

/// One independent way of proving admin access.
pub trait CredentialProvider: Send + Sync {
    /// Name used in audit logs
    fn name(&self) -> &'static str;

    /// Returns the identity proven by `request`, or why it proves nothing.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] when this provider's credential is missing or invalid,
    /// [`AuthError::Forbidden`] when it is valid but not privileged.
    fn authenticate(&self, request: &AdminRequest) -> Result<AdminIdentity, AuthError>;
}

/// Grants admin access if any configured provider accepts the request.
#[derive(Default)]
pub struct AdminVerifier {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl AdminVerifier {
    /// A verifier with no providers denies everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider; providers are asked in the order they were added.
    #[must_use]
    pub fn with_provider<P>(mut self, provider: P) -> Self
    where
        P: CredentialProvider + 'static,
    {
        self.providers.push(Box::new(provider));
        self
    }

    /// Builds the standard verifier: static credential first, then signed `initData`.
    /// Either may be absent when its secret is not configured.
    #[must_use]
    pub fn from_providers(
        static_credential: Option<StaticCredentialProvider>,
        signed: Option<SignedCredentialProvider>,
    ) -> Self {
        let mut verifier = Self::new();
        if let Some(provider) = static_credential {
            verifier = verifier.with_provider(provider);
        }
        if let Some(provider) = signed {
            verifier = verifier.with_provider(provider);
        }
        verifier
    }

    /// Number of enabled providers.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Verifies an admin request.
    ///
    /// # Errors
    /// [`AuthError::Forbidden`] if some provider recognised an authentic but unprivileged
    /// principal and none granted access, otherwise [`AuthError::Unauthorized`].
    pub fn verify(&self, request: &AdminRequest) -> Result<AdminIdentity, AuthError> {
        let mut denial = AuthError::Unauthorized;
        for provider in &self.providers {
            match provider.authenticate(request) {
                Ok(identity) => {
                    info!(
                        provider = provider.name(),
                        admin = %identity.label(),
                        "Admin authenticated"
                    );
                    return Ok(identity);
                }
                Err(AuthError::Forbidden) => denial = AuthError::Forbidden,
                Err(AuthError::Unauthorized) => {}
            }
        }
        warn!(?denial, "Admin access denied");
        Err(denial)
    }
}
