//! End-to-end authentication flows against the in-memory stores.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use totp_rs::{Algorithm, Secret, TOTP};

use claviger::auth::{
    AuthConfig, AuthError, AuthFlow, AuthManager, AuthMethod, CreateUser, CredentialProvider,
    Credentials, LocalProvider, LogSmsSender, MemorySessionStore, MemoryTenantStore,
    MemoryUserStore, MfaService, ProviderRegistry, Role, TenantConfiguration, UserStore,
};

struct Harness {
    manager: AuthManager,
    users: Arc<MemoryUserStore>,
}

fn harness_with_config(config: AuthConfig) -> Harness {
    let users = Arc::new(MemoryUserStore::new());
    let tenants = Arc::new(MemoryTenantStore::new());
    let sessions = Arc::new(MemorySessionStore::new());

    let providers = ProviderRegistry::new().with_provider(
        AuthMethod::Local,
        Arc::new(LocalProvider::new(users.clone())),
    );
    let mfa = MfaService::new(
        config.totp_issuer().to_string(),
        config.sms_code_ttl_seconds(),
        Arc::new(LogSmsSender),
    );

    let manager = AuthManager::new(
        users.clone(),
        tenants,
        sessions,
        providers,
        mfa,
        config,
    );
    Harness { manager, users }
}

fn harness() -> Harness {
    harness_with_config(AuthConfig::new(SecretString::from("integration-secret")))
}

async fn seeded_harness() -> Harness {
    let h = harness();
    h.manager.seed_default_tenant().await.unwrap();
    h
}

const PASSWORD: &str = "correct-horse-battery";

async fn register(h: &Harness, email: &str, roles: Vec<Role>) -> uuid::Uuid {
    let user = h
        .manager
        .register_user(CreateUser {
            tenant_id: "default".to_string(),
            email: email.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password: PASSWORD.to_string(),
            roles,
            groups: Vec::new(),
        })
        .await
        .unwrap();
    user.id
}

fn local_creds(email: &str, password: &str, mfa_code: Option<&str>) -> Credentials {
    Credentials {
        method: AuthMethod::Local,
        email: Some(email.to_string()),
        password: Some(password.to_string()),
        username: None,
        assertion: None,
        mfa_code: mfa_code.map(str::to_string),
    }
}

fn current_totp_code(secret_base32: &str) -> String {
    let secret = Secret::Encoded(secret_base32.to_string()).to_bytes().unwrap();
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret,
        Some("claviger".to_string()),
        "mfa@example.com".to_string(),
    )
    .unwrap();
    totp.generate_current().unwrap()
}

#[tokio::test]
async fn unknown_tenant_is_rejected_before_credentials() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let result = h
        .manager
        .authenticate(
            &local_creds("alice@example.com", PASSWORD, None),
            Some("no-such-tenant"),
        )
        .await;
    assert!(matches!(result, Err(AuthError::TenantInvalid)));
}

#[tokio::test]
async fn inactive_tenant_is_rejected() {
    let h = seeded_harness().await;
    let mut tenant = TenantConfiguration::default_tenant();
    tenant.id = "dormant".to_string();
    tenant.is_active = false;
    h.manager.create_tenant(tenant).await.unwrap();

    let result = h
        .manager
        .authenticate(
            &local_creds("alice@example.com", PASSWORD, None),
            Some("dormant"),
        )
        .await;
    assert!(matches!(result, Err(AuthError::TenantInvalid)));
}

#[tokio::test]
async fn password_login_without_mfa_grants_token_pair() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let flow = h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap();

    match flow {
        AuthFlow::Granted(grant) => {
            assert_eq!(grant.expires_in, 1800);
            assert!(!grant.session_id.is_empty());
            let claims = h.manager.verify_token(&grant.access_token).unwrap();
            assert_eq!(claims.tenant_id, "default");
            assert_eq!(claims.roles, Some(vec![Role::Member]));
        }
        AuthFlow::MfaRequired(_) => panic!("no MFA enrolled, expected a grant"),
    }
}

#[tokio::test]
async fn wrong_password_is_a_generic_rejection() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let err = h
        .manager
        .authenticate(&local_creds("alice@example.com", "wrong-password-x", None), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialsRejected));
    // Unknown user reads the same as a wrong password.
    let err = h
        .manager
        .authenticate(&local_creds("nobody@example.com", PASSWORD, None), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialsRejected));
}

#[tokio::test]
async fn fifth_failure_locks_and_sixth_attempt_never_reaches_provider() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    for _ in 0..5 {
        let err = h
            .manager
            .authenticate(&local_creds("alice@example.com", "wrong-password-x", None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CredentialsRejected));
    }

    // Locked now; even the correct password is refused up front.
    let err = h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked));
}

#[tokio::test]
async fn lockout_clears_after_tenant_window_elapses() {
    let h = seeded_harness().await;
    // Zero-minute window: the lock expires as soon as it is set, which
    // exercises the recovery path without waiting on wall-clock time.
    let mut tenant = TenantConfiguration::default_tenant();
    tenant.id = "short-fuse".to_string();
    tenant.settings.lockout_duration_minutes = 0;
    h.manager.create_tenant(tenant).await.unwrap();
    let user = h
        .manager
        .register_user(CreateUser {
            tenant_id: "short-fuse".to_string(),
            email: "alice@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password: PASSWORD.to_string(),
            roles: vec![Role::Member],
            groups: Vec::new(),
        })
        .await
        .unwrap();

    for _ in 0..5 {
        let _ = h
            .manager
            .authenticate(
                &local_creds("alice@example.com", "wrong-password-x", None),
                Some("short-fuse"),
            )
            .await;
    }
    let locked = h.users.get(user.id).await.unwrap();
    assert!(locked.account_locked);
    assert!(locked.locked_until.is_some());

    // The window has elapsed, so the correct password gets through and
    // clears the lockout state.
    let flow = h
        .manager
        .authenticate(
            &local_creds("alice@example.com", PASSWORD, None),
            Some("short-fuse"),
        )
        .await
        .unwrap();
    assert!(matches!(flow, AuthFlow::Granted(_)));

    let user = h.users.get(user.id).await.unwrap();
    assert!(!user.account_locked);
    assert!(user.locked_until.is_none());
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn padded_email_still_authenticates() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let flow = h
        .manager
        .authenticate(&local_creds(" Alice@Example.COM ", PASSWORD, None), None)
        .await
        .unwrap();
    assert!(matches!(flow, AuthFlow::Granted(_)));

    // The correct password through a padded email must not count as a
    // failure anywhere.
    let user = h
        .users
        .find_by_email("default", "alice@example.com")
        .await
        .unwrap();
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn successful_login_resets_failure_counter() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    for _ in 0..4 {
        let _ = h
            .manager
            .authenticate(&local_creds("alice@example.com", "wrong-password-x", None), None)
            .await;
    }
    let flow = h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap();
    assert!(matches!(flow, AuthFlow::Granted(_)));

    let user = h
        .users
        .find_by_email("default", "alice@example.com")
        .await
        .unwrap();
    assert_eq!(user.failed_login_attempts, 0);

    // Counter started over: four fresh failures still do not lock.
    for _ in 0..4 {
        let _ = h
            .manager
            .authenticate(&local_creds("alice@example.com", "wrong-password-x", None), None)
            .await;
    }
    let flow = h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap();
    assert!(matches!(flow, AuthFlow::Granted(_)));
}

#[tokio::test]
async fn totp_login_takes_two_round_trips() {
    let h = seeded_harness().await;
    let user_id = register(&h, "mfa@example.com", vec![Role::Member]).await;
    let enrollment = h.manager.enroll_totp(user_id).await.unwrap();

    // First round trip: correct password, no code -> challenge, no tokens.
    let flow = h
        .manager
        .authenticate(&local_creds("mfa@example.com", PASSWORD, None), None)
        .await
        .unwrap();
    match flow {
        AuthFlow::MfaRequired(challenge) => {
            assert!(!challenge.prompt.is_empty());
        }
        AuthFlow::Granted(_) => panic!("TOTP enrolled, expected a challenge"),
    }

    // Second round trip with the current code grants tokens.
    let code = current_totp_code(&enrollment.secret);
    let flow = h
        .manager
        .authenticate(&local_creds("mfa@example.com", PASSWORD, Some(&code)), None)
        .await
        .unwrap();
    assert!(matches!(flow, AuthFlow::Granted(_)));
}

#[tokio::test]
async fn invalid_mfa_code_rejects_without_touching_failure_counter() {
    let h = seeded_harness().await;
    let user_id = register(&h, "mfa@example.com", vec![Role::Member]).await;
    h.manager.enroll_totp(user_id).await.unwrap();

    let err = h
        .manager
        .authenticate(&local_creds("mfa@example.com", PASSWORD, Some("000000")), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MfaInvalid));

    // The lockout counter tracks provider failures only.
    let user = h.users.get(user_id).await.unwrap();
    assert_eq!(user.failed_login_attempts, 0);
    assert!(!user.account_locked);
}

#[tokio::test]
async fn recovery_code_satisfies_mfa_once() {
    let h = seeded_harness().await;
    let user_id = register(&h, "mfa@example.com", vec![Role::Member]).await;
    let enrollment = h.manager.enroll_totp(user_id).await.unwrap();
    let recovery = enrollment.recovery_codes[0].clone();

    let flow = h
        .manager
        .authenticate(
            &local_creds("mfa@example.com", PASSWORD, Some(&recovery)),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(flow, AuthFlow::Granted(_)));

    // Single use: the same code is dead on the second attempt.
    let err = h
        .manager
        .authenticate(
            &local_creds("mfa@example.com", PASSWORD, Some(&recovery)),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MfaInvalid));
}

#[tokio::test]
async fn refresh_rotates_and_old_token_is_dead() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let grant = match h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap()
    {
        AuthFlow::Granted(grant) => grant,
        AuthFlow::MfaRequired(_) => panic!("expected a grant"),
    };

    let rotated = h
        .manager
        .refresh_access_token(&grant.refresh_token)
        .await
        .unwrap();
    assert_eq!(rotated.session_id, grant.session_id);
    assert_ne!(rotated.refresh_token, grant.refresh_token);

    // Replaying the pre-rotation token fails.
    let err = h
        .manager
        .refresh_access_token(&grant.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenInvalid(_)));

    // The rotated token still works.
    assert!(h
        .manager
        .refresh_access_token(&rotated.refresh_token)
        .await
        .is_ok());
}

#[tokio::test]
async fn access_token_is_not_accepted_for_refresh() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let grant = match h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap()
    {
        AuthFlow::Granted(grant) => grant,
        AuthFlow::MfaRequired(_) => panic!("expected a grant"),
    };

    let err = h
        .manager
        .refresh_access_token(&grant.access_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenInvalid(_)));
}

#[tokio::test]
async fn expired_access_token_verifies_as_expired() {
    let config = AuthConfig::new(SecretString::from("integration-secret"))
        .with_access_token_ttl_minutes(-5);
    let h = harness_with_config(config);
    h.manager.seed_default_tenant().await.unwrap();
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let grant = match h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap()
    {
        AuthFlow::Granted(grant) => grant,
        AuthFlow::MfaRequired(_) => panic!("expected a grant"),
    };

    assert!(matches!(
        h.manager.verify_token(&grant.access_token),
        Err(AuthError::TokenExpired)
    ));
}

#[tokio::test]
async fn logout_removes_the_session() {
    let h = seeded_harness().await;
    register(&h, "alice@example.com", vec![Role::Member]).await;

    let grant = match h
        .manager
        .authenticate(&local_creds("alice@example.com", PASSWORD, None), None)
        .await
        .unwrap()
    {
        AuthFlow::Granted(grant) => grant,
        AuthFlow::MfaRequired(_) => panic!("expected a grant"),
    };

    assert!(h.manager.logout(&grant.session_id).await);
    assert!(!h.manager.logout(&grant.session_id).await);
    // The session is gone, so its refresh token no longer rotates.
    assert!(h
        .manager
        .refresh_access_token(&grant.refresh_token)
        .await
        .is_err());
}

#[tokio::test]
async fn permissions_follow_roles() {
    let h = seeded_harness().await;
    let admin = register(&h, "admin@example.com", vec![Role::SuperAdmin]).await;
    let guest = register(&h, "guest@example.com", vec![Role::Guest]).await;

    let perms = h
        .manager
        .get_user_permissions(admin, "conversation")
        .await
        .unwrap();
    assert!(perms.contains("*"));

    let perms = h
        .manager
        .get_user_permissions(guest, "conversation")
        .await
        .unwrap();
    assert_eq!(perms.len(), 1);
    assert!(perms.contains("conversation:read"));

    let perms = h
        .manager
        .get_user_permissions(guest, "billing")
        .await
        .unwrap();
    assert!(perms.is_empty());
}

/// Provider double asserting a fixed SSO identity.
struct StaticIdentityProvider {
    email: String,
}

#[async_trait]
impl CredentialProvider for StaticIdentityProvider {
    async fn authenticate(
        &self,
        _credentials: &Credentials,
        _tenant: &TenantConfiguration,
    ) -> Result<claviger::auth::provider::ProviderIdentity, AuthError> {
        Ok(claviger::auth::provider::ProviderIdentity {
            email: self.email.clone(),
            display_name: None,
        })
    }
}

#[tokio::test]
async fn sso_identity_without_registered_user_is_rejected() {
    let users = Arc::new(MemoryUserStore::new());
    let tenants = Arc::new(MemoryTenantStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let providers = ProviderRegistry::new().with_provider(
        AuthMethod::Saml,
        Arc::new(StaticIdentityProvider {
            email: "stranger@example.com".to_string(),
        }),
    );
    let config = AuthConfig::new(SecretString::from("integration-secret"));
    let mfa = MfaService::new(
        config.totp_issuer().to_string(),
        config.sms_code_ttl_seconds(),
        Arc::new(LogSmsSender),
    );
    let manager = AuthManager::new(users, tenants, sessions, providers, mfa, config);

    let mut tenant = TenantConfiguration::default_tenant();
    tenant.allowed_auth_methods = vec![AuthMethod::Saml];
    manager.create_tenant(tenant).await.unwrap();

    let creds = Credentials {
        method: AuthMethod::Saml,
        email: None,
        password: None,
        username: None,
        assertion: Some("saml-response".to_string()),
        mfa_code: None,
    };
    // The provider vouched for an identity, but no profile exists and
    // none is fabricated.
    let err = manager.authenticate(&creds, None).await.unwrap_err();
    assert!(matches!(err, AuthError::UserInactiveOrMissing));
}

#[tokio::test]
async fn method_outside_tenant_allowlist_is_rejected() {
    let h = seeded_harness().await;
    let creds = Credentials {
        method: AuthMethod::Saml,
        email: None,
        password: None,
        username: None,
        assertion: Some("saml-response".to_string()),
        mfa_code: None,
    };
    let err = h.manager.authenticate(&creds, None).await.unwrap_err();
    assert!(matches!(err, AuthError::UnsupportedMethod));
}
