//! Registry traits for users, tenants, and sessions, plus the
//! in-memory implementations used by this deployment.
//!
//! The traits are the seam where a durable store plugs in; the
//! in-memory maps are a documented limitation, not a design goal.
//! All counter mutations happen inside the store's write lock so
//! concurrent logins cannot lose updates.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::mfa::MfaMethod;
use crate::auth::models::{Session, TenantConfiguration, UserProfile};

/// Outcome of recording a provider-level login failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedLoginState {
    pub attempts: u32,
    pub locked: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: UserProfile) -> AuthResult<()>;

    async fn get(&self, user_id: Uuid) -> Option<UserProfile>;

    async fn find_by_email(&self, tenant_id: &str, email: &str) -> Option<UserProfile>;

    /// Atomically increment the failed-login counter and lock the
    /// account for `lockout_minutes` once `threshold` consecutive
    /// failures are reached.
    ///
    /// Returns `None` when no user matches that tenant and email.
    async fn record_failed_login(
        &self,
        tenant_id: &str,
        email: &str,
        threshold: u32,
        lockout_minutes: u32,
    ) -> Option<FailedLoginState>;

    /// Reset the failure counter, unlock the account, and stamp
    /// `last_login`.
    async fn record_successful_login(&self, user_id: Uuid) -> AuthResult<()>;

    /// Store an enrolled TOTP secret plus hashed recovery codes and
    /// flip the MFA flags.
    async fn enable_totp(
        &self,
        user_id: Uuid,
        secret_base32: String,
        recovery_code_hashes: Vec<String>,
    ) -> AuthResult<()>;

    /// Mark SMS as an enabled MFA method.
    async fn enable_sms(&self, user_id: Uuid) -> AuthResult<()>;

    /// Consume a one-time recovery code; returns `true` when the hash
    /// matched an unused code.
    async fn consume_recovery_code(&self, user_id: Uuid, code_hash: &str) -> bool;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn insert(&self, tenant: TenantConfiguration) -> AuthResult<()>;

    async fn get(&self, tenant_id: &str) -> Option<TenantConfiguration>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> AuthResult<()>;

    async fn get(&self, session_id: &str) -> Option<Session>;

    async fn remove(&self, session_id: &str) -> bool;

    async fn find_by_refresh_hash(&self, refresh_token_hash: &str) -> Option<Session>;

    /// Replace the stored refresh-token hash for a session (rotation)
    /// and bump its activity timestamp.
    async fn rekey(&self, session_id: &str, refresh_token_hash: String) -> AuthResult<()>;
}

/// In-memory user registry. Email lookup is a linear scan, which is
/// acceptable at this scale.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_matches(user: &UserProfile, tenant_id: &str, email: &str) -> bool {
    user.tenant_id == tenant_id && user.email.eq_ignore_ascii_case(email)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: UserProfile) -> AuthResult<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| email_matches(existing, &user.tenant_id, &user.email))
        {
            return Err(AuthError::Internal(format!(
                "email already registered in tenant {}",
                user.tenant_id
            )));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Option<UserProfile> {
        self.users.read().await.get(&user_id).cloned()
    }

    async fn find_by_email(&self, tenant_id: &str, email: &str) -> Option<UserProfile> {
        self.users
            .read()
            .await
            .values()
            .find(|user| email_matches(user, tenant_id, email))
            .cloned()
    }

    async fn record_failed_login(
        &self,
        tenant_id: &str,
        email: &str,
        threshold: u32,
        lockout_minutes: u32,
    ) -> Option<FailedLoginState> {
        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|user| email_matches(user, tenant_id, email))?;
        user.failed_login_attempts += 1;
        let now = Utc::now();
        if user.failed_login_attempts >= threshold {
            user.account_locked = true;
            user.locked_until = Some(now + Duration::minutes(i64::from(lockout_minutes)));
        }
        user.updated_at = now;
        Some(FailedLoginState {
            attempts: user.failed_login_attempts,
            locked: user.account_locked,
        })
    }

    async fn record_successful_login(&self, user_id: Uuid) -> AuthResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or(AuthError::UserInactiveOrMissing)?;
        user.failed_login_attempts = 0;
        user.account_locked = false;
        user.locked_until = None;
        let now = Utc::now();
        user.last_login = Some(now);
        user.updated_at = now;
        Ok(())
    }

    async fn enable_totp(
        &self,
        user_id: Uuid,
        secret_base32: String,
        recovery_code_hashes: Vec<String>,
    ) -> AuthResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or(AuthError::UserInactiveOrMissing)?;
        user.totp_secret = Some(secret_base32);
        user.recovery_code_hashes = recovery_code_hashes;
        if !user.mfa_methods.contains(&MfaMethod::Totp) {
            user.mfa_methods.push(MfaMethod::Totp);
        }
        user.mfa_enabled = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn enable_sms(&self, user_id: Uuid) -> AuthResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or(AuthError::UserInactiveOrMissing)?;
        if !user.mfa_methods.contains(&MfaMethod::Sms) {
            user.mfa_methods.push(MfaMethod::Sms);
        }
        user.mfa_enabled = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn consume_recovery_code(&self, user_id: Uuid, code_hash: &str) -> bool {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&user_id) else {
            return false;
        };
        let before = user.recovery_code_hashes.len();
        user.recovery_code_hashes.retain(|hash| hash != code_hash);
        user.recovery_code_hashes.len() < before
    }
}

/// In-memory tenant registry.
#[derive(Default)]
pub struct MemoryTenantStore {
    tenants: RwLock<HashMap<String, TenantConfiguration>>,
}

impl MemoryTenantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn insert(&self, tenant: TenantConfiguration) -> AuthResult<()> {
        let mut tenants = self.tenants.write().await;
        if tenants.contains_key(&tenant.id) {
            return Err(AuthError::Internal(format!(
                "tenant {} already exists",
                tenant.id
            )));
        }
        tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    async fn get(&self, tenant_id: &str) -> Option<TenantConfiguration> {
        self.tenants.read().await.get(tenant_id).cloned()
    }
}

/// In-memory session registry, indexed by session id with a secondary
/// refresh-hash index for rotation lookups.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Session) -> AuthResult<()> {
        let mut sessions = self.sessions.write().await;
        // Ulid collisions do not happen in practice; guard anyway so the
        // "one record per session id" invariant cannot silently break.
        if sessions.contains_key(&session.id) {
            return Err(AuthError::Internal("session id collision".to_string()));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    async fn find_by_refresh_hash(&self, refresh_token_hash: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .values()
            .find(|session| session.refresh_token_hash == refresh_token_hash)
            .cloned()
    }

    async fn rekey(&self, session_id: &str, refresh_token_hash: String) -> AuthResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AuthError::TokenInvalid("session no longer exists".to_string()))?;
        session.refresh_token_hash = refresh_token_hash;
        session.last_activity = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::AuthMethod;
    use crate::auth::rbac::Role;

    fn sample_user(tenant_id: &str, email: &str) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            email: email.to_string(),
            first_name: "Sample".to_string(),
            last_name: "User".to_string(),
            roles: vec![Role::Member],
            groups: Vec::new(),
            auth_method: AuthMethod::Local,
            password_hash: String::new(),
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
        }
    }

    #[tokio::test]
    async fn duplicate_email_in_tenant_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert(sample_user("default", "a@x.com")).await.unwrap();
        assert!(store.insert(sample_user("default", "A@X.COM")).await.is_err());
        // Same email in another tenant is fine.
        store.insert(sample_user("acme", "a@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn failed_login_locks_at_threshold() {
        let store = MemoryUserStore::new();
        store.insert(sample_user("default", "a@x.com")).await.unwrap();

        for attempt in 1..=4u32 {
            let state = store
                .record_failed_login("default", "a@x.com", 5, 15)
                .await
                .unwrap();
            assert_eq!(state.attempts, attempt);
            assert!(!state.locked);
        }
        let state = store
            .record_failed_login("default", "a@x.com", 5, 15)
            .await
            .unwrap();
        assert_eq!(state.attempts, 5);
        assert!(state.locked);

        // The lock carries an expiry derived from the tenant's window.
        let user = store.find_by_email("default", "a@x.com").await.unwrap();
        let until = user.locked_until.unwrap();
        assert!(until > Utc::now());
        assert!(until <= Utc::now() + Duration::minutes(15));
        assert!(user.lock_in_effect(Utc::now()));
        // Once the window elapses the lock no longer applies.
        assert!(!user.lock_in_effect(Utc::now() + Duration::minutes(16)));
    }

    #[tokio::test]
    async fn successful_login_resets_lockout_state() {
        let store = MemoryUserStore::new();
        let user = sample_user("default", "a@x.com");
        let user_id = user.id;
        store.insert(user).await.unwrap();
        store
            .record_failed_login("default", "a@x.com", 1, 15)
            .await
            .unwrap();

        store.record_successful_login(user_id).await.unwrap();
        let user = store.get(user_id).await.unwrap();
        assert_eq!(user.failed_login_attempts, 0);
        assert!(!user.account_locked);
        assert!(user.locked_until.is_none());
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn concurrent_failures_do_not_lose_updates() {
        use std::sync::Arc;
        let store = Arc::new(MemoryUserStore::new());
        store.insert(sample_user("default", "a@x.com")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.record_failed_login("default", "a@x.com", 100, 15).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let user = store.find_by_email("default", "a@x.com").await.unwrap();
        assert_eq!(user.failed_login_attempts, 10);
    }

    #[tokio::test]
    async fn recovery_codes_are_single_use() {
        let store = MemoryUserStore::new();
        let mut user = sample_user("default", "a@x.com");
        user.recovery_code_hashes = vec!["hash-a".to_string(), "hash-b".to_string()];
        let user_id = user.id;
        store.insert(user).await.unwrap();

        assert!(store.consume_recovery_code(user_id, "hash-a").await);
        assert!(!store.consume_recovery_code(user_id, "hash-a").await);
        assert!(store.consume_recovery_code(user_id, "hash-b").await);
    }

    #[tokio::test]
    async fn session_rekey_replaces_refresh_hash() {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        store
            .insert(Session {
                id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
                user_id: Uuid::new_v4(),
                tenant_id: "default".to_string(),
                refresh_token_hash: "old-hash".to_string(),
                created_at: now,
                last_activity: now,
            })
            .await
            .unwrap();

        store
            .rekey("01ARZ3NDEKTSV4RRFFQ69G5FAV", "new-hash".to_string())
            .await
            .unwrap();
        assert!(store.find_by_refresh_hash("old-hash").await.is_none());
        assert!(store.find_by_refresh_hash("new-hash").await.is_some());
    }
}
