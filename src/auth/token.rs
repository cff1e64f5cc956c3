//! Signed token issuance and verification.
//!
//! Access and refresh tokens are HS256 JWTs sharing one symmetric
//! signing secret. The `typ` claim discriminates the two so a refresh
//! token can never be replayed as an access token (or vice versa);
//! role and group claims ride on access tokens only.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::config::AuthConfig;
use crate::auth::error::AuthError;
use crate::auth::models::UserProfile;
use crate::auth::rbac::Role;

/// Token-type discriminator carried in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenClaims {
    /// Subject — user id (UUID string).
    pub sub: String,
    pub tenant_id: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    pub typ: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

impl TokenClaims {
    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Issue a short-lived access token carrying role and group claims.
pub fn issue_access_token(user: &UserProfile, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = TokenClaims {
        sub: user.id.to_string(),
        tenant_id: user.tenant_id.clone(),
        iat: now,
        exp: now + config.access_token_ttl_seconds(),
        typ: TokenType::Access,
        roles: Some(user.roles.clone()),
        groups: Some(user.groups.clone()),
    };
    encode(&claims, config)
}

/// Issue a long-lived refresh token without authorization claims.
pub fn issue_refresh_token(user: &UserProfile, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = TokenClaims {
        sub: user.id.to_string(),
        tenant_id: user.tenant_id.clone(),
        iat: now,
        exp: now + config.refresh_token_ttl_seconds(),
        typ: TokenType::Refresh,
        roles: None,
        groups: None,
    };
    encode(&claims, config)
}

fn encode(claims: &TokenClaims, config: &AuthConfig) -> Result<String, AuthError> {
    let key = EncodingKey::from_secret(config.signing_secret());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| AuthError::Internal(format!("token encode: {e}")))
}

/// Decode and verify a token's signature and expiry.
///
/// Malformed input never panics; it maps to [`AuthError::TokenInvalid`],
/// while a valid-but-stale signature maps to [`AuthError::TokenExpired`].
pub fn decode_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    let key = DecodingKey::from_secret(config.signing_secret());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

/// SHA-256 hash of a raw refresh token, hex-encoded.
///
/// Sessions store only this value; the raw token never persists.
#[must_use]
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::mfa::MfaMethod;
    use crate::auth::provider::AuthMethod;
    use secrecy::SecretString;

    fn test_config() -> AuthConfig {
        AuthConfig::new(SecretString::from("unit-test-signing-secret"))
    }

    fn test_user() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            tenant_id: "default".to_string(),
            email: "a@x.com".to_string(),
            first_name: "A".to_string(),
            last_name: "X".to_string(),
            roles: vec![Role::Member],
            groups: vec!["auditors".to_string()],
            auth_method: AuthMethod::Local,
            password_hash: String::new(),
            mfa_enabled: false,
            mfa_methods: Vec::<MfaMethod>::new(),
            totp_secret: None,
            recovery_code_hashes: Vec::new(),
            failed_login_attempts: 0,
            account_locked: false,
            locked_until: None,
            is_active: true,
            password_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn access_token_roundtrip_carries_roles_and_groups() {
        let config = test_config();
        let user = test_user();
        let token = issue_access_token(&user, &config).unwrap();
        let claims = decode_token(&token, &config).unwrap();
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.tenant_id, "default");
        assert_eq!(claims.roles, Some(vec![Role::Member]));
        assert_eq!(claims.groups, Some(vec!["auditors".to_string()]));
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn refresh_token_has_no_authorization_claims() {
        let config = test_config();
        let token = issue_refresh_token(&test_user(), &config).unwrap();
        let claims = decode_token(&token, &config).unwrap();
        assert_eq!(claims.typ, TokenType::Refresh);
        assert!(claims.roles.is_none());
        assert!(claims.groups.is_none());
    }

    #[test]
    fn malformed_token_is_invalid_not_a_panic() {
        let config = test_config();
        let err = decode_token("definitely.not.a.jwt", &config).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
        let err = decode_token("", &config).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let config = test_config();
        let token = issue_access_token(&test_user(), &config).unwrap();
        let other = AuthConfig::new(SecretString::from("a-different-secret"));
        assert!(matches!(
            decode_token(&token, &other),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn expired_token_reports_expired() {
        let config = test_config().with_access_token_ttl_minutes(-5);
        let token = issue_access_token(&test_user(), &config).unwrap();
        assert!(matches!(
            decode_token(&token, &config),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn refresh_hash_is_stable_and_distinct() {
        assert_eq!(hash_refresh_token("abc"), hash_refresh_token("abc"));
        assert_ne!(hash_refresh_token("abc"), hash_refresh_token("abd"));
    }
}
