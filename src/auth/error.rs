//! Authentication error taxonomy.
//!
//! Every failure an auth operation can surface to a caller is a variant
//! here; handlers translate variants into wire results, never into panics.
//! "MFA required" is deliberately absent — it is a flow branch
//! ([`crate::auth::manager::AuthFlow::MfaRequired`]), not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("tenant is unknown or inactive")]
    TenantInvalid,

    #[error("authentication method not allowed for this tenant")]
    UnsupportedMethod,

    #[error("authentication provider is not configured")]
    ProviderUnavailable,

    #[error("invalid credentials")]
    CredentialsRejected,

    #[error("account is locked")]
    AccountLocked,

    #[error("invalid MFA code")]
    MfaInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("user is missing or inactive")]
    UserInactiveOrMissing,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable reason, used by the token verification
    /// endpoint to distinguish `expired` from `invalid`.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TenantInvalid => "tenant_invalid",
            Self::UnsupportedMethod => "unsupported_method",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::CredentialsRejected => "credentials_rejected",
            Self::AccountLocked => "account_locked",
            Self::MfaInvalid => "mfa_invalid",
            Self::TokenExpired => "expired",
            Self::TokenInvalid(_) => "invalid",
            Self::UserInactiveOrMissing => "user_inactive_or_missing",
            Self::Internal(_) => "internal",
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
