//! Domain models: users, tenants, sessions, and the wire-level
//! authentication result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::mfa::MfaMethod;
use crate::auth::provider::AuthMethod;
use crate::auth::rbac::Role;

/// A user identity scoped to a tenant.
///
/// Profiles are never deleted; deactivation flips `is_active`.
/// Invariant: `mfa_enabled` implies `mfa_methods` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub tenant_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
    pub groups: Vec<String>,
    pub auth_method: AuthMethod,
    /// Argon2id PHC hash; empty for SSO-provisioned users.
    pub password_hash: String,
    pub mfa_enabled: bool,
    pub mfa_methods: Vec<MfaMethod>,
    /// Base32 TOTP secret, present once TOTP is enrolled.
    pub totp_secret: Option<String>,
    /// SHA-256 hex digests of unused one-time recovery codes.
    pub recovery_code_hashes: Vec<String>,
    pub failed_login_attempts: u32,
    pub account_locked: bool,
    /// End of the active lockout window; `None` means no time-based
    /// expiry.
    pub locked_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub password_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Whether a lockout is in effect at `now`. A lock with an elapsed
    /// window no longer blocks logins; the flags are cleared on the
    /// next successful login.
    #[must_use]
    pub fn lock_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.account_locked && self.locked_until.map_or(true, |until| until > now)
    }
}

/// Fields required to register a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub tenant_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Raw password, hashed with Argon2id before storage.
    pub password: String,
    pub roles: Vec<Role>,
    pub groups: Vec<String>,
}

/// Per-tenant policy knobs with documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Consecutive provider failures before the account locks.
    pub max_failed_attempts: u32,
    pub lockout_duration_minutes: u32,
    pub session_timeout_minutes: u32,
    pub password_min_length: usize,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration_minutes: 15,
            session_timeout_minutes: 720,
            password_min_length: 12,
        }
    }
}

/// An isolated customer/organization namespace.
///
/// Identity (`id`) is immutable once created; settings are mutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfiguration {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub allowed_auth_methods: Vec<AuthMethod>,
    pub sso_settings: serde_json::Value,
    pub branding: serde_json::Value,
    pub settings: TenantSettings,
    pub resource_limits: HashMap<String, u64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TenantConfiguration {
    /// The tenant seeded at startup; local logins land here unless the
    /// request names another tenant.
    pub const DEFAULT_TENANT_ID: &'static str = "default";

    #[must_use]
    pub fn default_tenant() -> Self {
        Self {
            id: Self::DEFAULT_TENANT_ID.to_string(),
            name: "Default".to_string(),
            domain: "localhost".to_string(),
            allowed_auth_methods: vec![AuthMethod::Local],
            sso_settings: serde_json::Value::Null,
            branding: serde_json::Value::Null,
            settings: TenantSettings::default(),
            resource_limits: HashMap::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// An ephemeral login session.
///
/// Keyed by a random Ulid; at most one record per session id. Only the
/// SHA-256 hash of the refresh token is kept — the raw value goes to the
/// caller exactly once.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub tenant_id: String,
    pub refresh_token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Credentials bundle accepted by the authenticate operation.
///
/// `method` selects the provider; the remaining fields are
/// method-specific and optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Credentials {
    pub method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// LDAP bind name when it differs from the email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Raw SAML response or OIDC authorization code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
    /// MFA code supplied on the second round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_code: Option<String>,
}

/// Redacted user view embedded in successful authentication responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
    pub groups: Vec<String>,
    pub mfa_enabled: bool,
}

impl From<&UserProfile> for UserSummary {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id.to_string(),
            tenant_id: user.tenant_id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            roles: user.roles.clone(),
            groups: user.groups.clone(),
            mfa_enabled: user.mfa_enabled,
        }
    }
}

/// MFA challenge descriptor returned when a second factor is required.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MfaChallenge {
    pub method: MfaMethod,
    /// Human-readable prompt for the client to display.
    pub prompt: String,
}

/// Transient wire result of every auth operation; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub requires_mfa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_challenge: Option<MfaChallenge>,
}

impl AuthenticationResult {
    #[must_use]
    pub fn rejected(error: String) -> Self {
        Self {
            success: false,
            user: None,
            access_token: None,
            refresh_token: None,
            expires_in: None,
            error: Some(error),
            requires_mfa: false,
            mfa_challenge: None,
        }
    }

    #[must_use]
    pub fn mfa_required(challenge: MfaChallenge) -> Self {
        Self {
            success: false,
            user: None,
            access_token: None,
            refresh_token: None,
            expires_in: None,
            error: None,
            requires_mfa: true,
            mfa_challenge: Some(challenge),
        }
    }

    #[must_use]
    pub fn granted(
        user: UserSummary,
        access_token: String,
        refresh_token: String,
        expires_in: i64,
    ) -> Self {
        Self {
            success: true,
            user: Some(user),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            expires_in: Some(expires_in),
            error: None,
            requires_mfa: false,
            mfa_challenge: None,
        }
    }
}
