//! Authentication manager: orchestrates tenants, providers, MFA,
//! tokens, and sessions.
//!
//! Login state machine:
//! 1) Tenant lookup — unknown or inactive tenants reject with no side
//!    effects.
//! 2) Lockout gate — a locked account rejects before any provider is
//!    contacted, until the tenant's lockout window elapses.
//! 3) Provider dispatch — unsupported/unconfigured methods reject
//!    without provider contact; provider failures record a
//!    failed-login increment and reject.
//! 4) MFA branch — enabled MFA without a code yields a challenge and
//!    no tokens; an invalid code is a hard rejection.
//! 5) Grant — access + refresh tokens are issued, the failure counter
//!    resets, and a session is recorded under a fresh Ulid.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};
use ulid::Ulid;
use uuid::Uuid;

use crate::auth::config::AuthConfig;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::mfa::{hash_recovery_code, MfaMethod, MfaService, TotpEnrollment};
use crate::auth::models::{
    CreateUser, Credentials, MfaChallenge, Session, TenantConfiguration, UserProfile, UserSummary,
};
use crate::auth::password;
use crate::auth::provider::ProviderRegistry;
use crate::auth::rbac;
use crate::auth::store::{SessionStore, TenantStore, UserStore};
use crate::auth::token::{self, TokenClaims, TokenType};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

/// Normalize an email for lookup/uniqueness checks.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn valid_email(email_normalized: &str) -> bool {
    EMAIL_RE.is_match(email_normalized)
}

/// A successful grant: token pair plus the session it belongs to.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub user: UserSummary,
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
    pub session_id: String,
}

/// Outcome of an authenticate call that did not error.
#[derive(Debug, Clone)]
pub enum AuthFlow {
    Granted(TokenGrant),
    /// Second factor needed; no tokens were issued.
    MfaRequired(MfaChallenge),
}

/// The authentication manager. One instance per process, shared across
/// requests.
pub struct AuthManager {
    users: Arc<dyn UserStore>,
    tenants: Arc<dyn TenantStore>,
    sessions: Arc<dyn SessionStore>,
    providers: ProviderRegistry,
    mfa: MfaService,
    config: AuthConfig,
}

impl AuthManager {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        tenants: Arc<dyn TenantStore>,
        sessions: Arc<dyn SessionStore>,
        providers: ProviderRegistry,
        mfa: MfaService,
        config: AuthConfig,
    ) -> Self {
        Self {
            users,
            tenants,
            sessions,
            providers,
            mfa,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Seed the `"default"` tenant if it does not exist yet.
    pub async fn seed_default_tenant(&self) -> AuthResult<()> {
        if self
            .tenants
            .get(TenantConfiguration::DEFAULT_TENANT_ID)
            .await
            .is_none()
        {
            self.tenants
                .insert(TenantConfiguration::default_tenant())
                .await?;
        }
        Ok(())
    }

    pub async fn create_tenant(&self, tenant: TenantConfiguration) -> AuthResult<()> {
        self.tenants.insert(tenant).await
    }

    pub async fn get_tenant(&self, tenant_id: &str) -> Option<TenantConfiguration> {
        self.tenants.get(tenant_id).await
    }

    /// Register a local user in a tenant.
    pub async fn register_user(&self, input: CreateUser) -> AuthResult<UserProfile> {
        let tenant = self
            .tenants
            .get(&input.tenant_id)
            .await
            .filter(|t| t.is_active)
            .ok_or(AuthError::TenantInvalid)?;

        let email = normalize_email(&input.email);
        if !valid_email(&email) {
            return Err(AuthError::Internal("invalid email address".to_string()));
        }
        if input.password.len() < tenant.settings.password_min_length {
            return Err(AuthError::Internal(format!(
                "password must be at least {} characters",
                tenant.settings.password_min_length
            )));
        }

        let now = Utc::now();
        let user = UserProfile {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            email,
            first_name: input.first_name,
            last_name: input.last_name,
            roles: input.roles,
            groups: input.groups,
            auth_method: crate::auth::provider::AuthMethod::Local,
            password_hash: password::hash_password(&input.password)?,
            mfa_enabled: false,
            mfa_methods: Vec::new(),
            totp_secret: None,
            recovery_code_hashes: Vec::new(),
            failed_login_attempts: 0,
            account_locked: false,
            locked_until: None,
            is_active: true,
            password_expires_at: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        self.users.insert(user.clone()).await?;
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "user registered");
        Ok(user)
    }

    /// Authenticate a credentials bundle against a tenant.
    ///
    /// `tenant_id` defaults to the seeded `"default"` tenant.
    #[instrument(skip(self, credentials), fields(method = credentials.method.as_str()))]
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        tenant_id: Option<&str>,
    ) -> AuthResult<AuthFlow> {
        let tenant_id = tenant_id.unwrap_or(TenantConfiguration::DEFAULT_TENANT_ID);
        let tenant = self
            .tenants
            .get(tenant_id)
            .await
            .filter(|t| t.is_active)
            .ok_or(AuthError::TenantInvalid)?;

        let email = credentials.email.as_deref().map(normalize_email);

        // Lockout gate before any provider contact. An elapsed window
        // lets the attempt through; success then clears the flags.
        if let Some(email) = email.as_deref() {
            if let Some(user) = self.users.find_by_email(&tenant.id, email).await {
                if user.lock_in_effect(Utc::now()) {
                    warn!(tenant_id = %tenant.id, "login attempt on locked account");
                    return Err(AuthError::AccountLocked);
                }
            }
        }

        let provider = self.providers.dispatch(credentials.method, &tenant)?;

        let identity = match provider.authenticate(credentials, &tenant).await {
            Ok(identity) => identity,
            Err(err) => {
                if let Some(email) = email.as_deref() {
                    let settings = &tenant.settings;
                    if let Some(state) = self
                        .users
                        .record_failed_login(
                            &tenant.id,
                            email,
                            settings.max_failed_attempts,
                            settings.lockout_duration_minutes,
                        )
                        .await
                    {
                        if state.locked {
                            warn!(
                                tenant_id = %tenant.id,
                                attempts = state.attempts,
                                "account locked after repeated failures"
                            );
                        }
                    }
                }
                // Provider-level faults collapse into a generic rejection.
                return Err(match err {
                    AuthError::CredentialsRejected => AuthError::CredentialsRejected,
                    other => {
                        warn!(error = %other, "provider failure");
                        AuthError::CredentialsRejected
                    }
                });
            }
        };

        let user = self
            .users
            .find_by_email(&tenant.id, &normalize_email(&identity.email))
            .await
            .filter(|u| u.is_active)
            .ok_or(AuthError::UserInactiveOrMissing)?;

        // SSO identities bypass the email pre-check; re-check the lock.
        if user.lock_in_effect(Utc::now()) {
            return Err(AuthError::AccountLocked);
        }

        if user.mfa_enabled {
            match credentials.mfa_code.as_deref() {
                None => {
                    let challenge = self.mfa.challenge(&user).await?;
                    return Ok(AuthFlow::MfaRequired(challenge));
                }
                Some(code) => {
                    if !self.verify_mfa_code(&user, code).await? {
                        // Deliberately does not touch the failed-login
                        // counter; the lockout counts provider failures.
                        return Err(AuthError::MfaInvalid);
                    }
                }
            }
        }

        self.grant(&user).await.map(AuthFlow::Granted)
    }

    /// Decode and check a token's signature and expiry.
    pub fn verify_token(&self, raw: &str) -> AuthResult<TokenClaims> {
        token::decode_token(raw, &self.config)
    }

    /// Exchange a refresh token for a fresh token pair.
    ///
    /// Refresh tokens are rotated: the presented token's session is
    /// re-keyed to the new token, so replaying the old one fails.
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, raw_refresh: &str) -> AuthResult<TokenGrant> {
        let claims = token::decode_token(raw_refresh, &self.config)?;
        if claims.typ != TokenType::Refresh {
            return Err(AuthError::TokenInvalid(
                "not a refresh token".to_string(),
            ));
        }

        let session = self
            .sessions
            .find_by_refresh_hash(&token::hash_refresh_token(raw_refresh))
            .await
            .ok_or_else(|| {
                AuthError::TokenInvalid("refresh token not found or already used".to_string())
            })?;

        let user_id = claims.user_id().ok_or_else(|| {
            AuthError::TokenInvalid("malformed subject claim".to_string())
        })?;
        let user = self
            .users
            .get(user_id)
            .await
            .filter(|u| u.is_active)
            .ok_or(AuthError::UserInactiveOrMissing)?;

        let access_token = token::issue_access_token(&user, &self.config)?;
        let refresh_token = token::issue_refresh_token(&user, &self.config)?;
        self.sessions
            .rekey(&session.id, token::hash_refresh_token(&refresh_token))
            .await?;

        Ok(TokenGrant {
            user: UserSummary::from(&user),
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_seconds(),
            session_id: session.id,
        })
    }

    /// Union of role- and group-derived permissions for a resource.
    pub async fn get_user_permissions(
        &self,
        user_id: Uuid,
        resource: &str,
    ) -> AuthResult<HashSet<String>> {
        let user = self
            .users
            .get(user_id)
            .await
            .filter(|u| u.is_active)
            .ok_or(AuthError::UserInactiveOrMissing)?;
        Ok(rbac::permissions_for(&user, resource))
    }

    /// Drop a session; returns whether one existed.
    pub async fn logout(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).await
    }

    /// Enroll TOTP for a user and return the one-time enrollment
    /// material.
    pub async fn enroll_totp(&self, user_id: Uuid) -> AuthResult<TotpEnrollment> {
        let user = self
            .users
            .get(user_id)
            .await
            .filter(|u| u.is_active)
            .ok_or(AuthError::UserInactiveOrMissing)?;
        let (enrollment, recovery_hashes) = self.mfa.enroll_totp(&user.email)?;
        self.users
            .enable_totp(user.id, enrollment.secret.clone(), recovery_hashes)
            .await?;
        info!(user_id = %user.id, "TOTP enrolled");
        Ok(enrollment)
    }

    /// Mark SMS as an enabled second factor; delivery setup is owned by
    /// the external channel.
    pub async fn enroll_sms(&self, user_id: Uuid) -> AuthResult<()> {
        self.users.enable_sms(user_id).await
    }

    async fn verify_mfa_code(&self, user: &UserProfile, code: &str) -> AuthResult<bool> {
        if user.mfa_methods.contains(&MfaMethod::Totp) {
            if let Some(secret) = &user.totp_secret {
                if self.mfa.verify_totp(secret, &user.email, code)? {
                    return Ok(true);
                }
            }
        }
        if user.mfa_methods.contains(&MfaMethod::Sms)
            && self.mfa.verify_sms(user.id, code).await
        {
            return Ok(true);
        }
        // Recovery codes work for any enrolled method, once each.
        if self
            .users
            .consume_recovery_code(user.id, &hash_recovery_code(code))
            .await
        {
            return Ok(true);
        }
        Ok(false)
    }

    async fn grant(&self, user: &UserProfile) -> AuthResult<TokenGrant> {
        let access_token = token::issue_access_token(user, &self.config)?;
        let refresh_token = token::issue_refresh_token(user, &self.config)?;

        self.users.record_successful_login(user.id).await?;

        let now = Utc::now();
        let session = Session {
            id: Ulid::new().to_string(),
            user_id: user.id,
            tenant_id: user.tenant_id.clone(),
            refresh_token_hash: token::hash_refresh_token(&refresh_token),
            created_at: now,
            last_activity: now,
        };
        let session_id = session.id.clone();
        self.sessions.insert(session).await?;

        info!(user_id = %user.id, tenant_id = %user.tenant_id, "login granted");
        Ok(TokenGrant {
            user: UserSummary::from(user),
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_seconds(),
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }
}
