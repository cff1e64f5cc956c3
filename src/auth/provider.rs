//! Credential providers and dispatch.
//!
//! Providers form a closed set of named methods. A deployment registers
//! only the providers it has credentials for; dispatching to an
//! unregistered method fails with `ProviderUnavailable` before any
//! network or store access. SAML/OIDC/LDAP are external protocol
//! integrations that plug in behind [`CredentialProvider`]; this crate
//! ships a real implementation only for the local password method.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::models::{Credentials, TenantConfiguration};
use crate::auth::password;
use crate::auth::store::UserStore;

/// Closed set of authentication methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Local,
    Saml,
    Oidc,
    Ldap,
}

impl AuthMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Saml => "saml",
            Self::Oidc => "oidc",
            Self::Ldap => "ldap",
        }
    }
}

/// Identity asserted by a provider after a successful credential check.
///
/// The manager resolves this against the user registry; providers never
/// fabricate user profiles.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub email: String,
    pub display_name: Option<String>,
}

/// One credential-checking strategy.
///
/// Implementations perform their own I/O (LDAP bind, SAML assertion
/// validation, ...) and must translate every failure into an
/// [`AuthError`]; the manager treats any error as a rejected login.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authenticate(
        &self,
        credentials: &Credentials,
        tenant: &TenantConfiguration,
    ) -> AuthResult<ProviderIdentity>;
}

/// Registry of configured providers, keyed by method.
///
/// Construction is the capability check: a method absent from the map
/// is unconfigured for this deployment.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<AuthMethod, Arc<dyn CredentialProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(
        mut self,
        method: AuthMethod,
        provider: Arc<dyn CredentialProvider>,
    ) -> Self {
        self.providers.insert(method, provider);
        self
    }

    #[must_use]
    pub fn configured(&self, method: AuthMethod) -> bool {
        self.providers.contains_key(&method)
    }

    /// Resolve the provider for `method`, checking the tenant's allowed
    /// set first. Neither failure contacts a provider.
    pub fn dispatch(
        &self,
        method: AuthMethod,
        tenant: &TenantConfiguration,
    ) -> AuthResult<Arc<dyn CredentialProvider>> {
        if !tenant.allowed_auth_methods.contains(&method) {
            return Err(AuthError::UnsupportedMethod);
        }
        self.providers
            .get(&method)
            .cloned()
            .ok_or(AuthError::ProviderUnavailable)
    }
}

/// Local email/password provider backed by the user registry.
pub struct LocalProvider {
    users: Arc<dyn UserStore>,
}

impl LocalProvider {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CredentialProvider for LocalProvider {
    async fn authenticate(
        &self,
        credentials: &Credentials,
        tenant: &TenantConfiguration,
    ) -> AuthResult<ProviderIdentity> {
        // Trim to match the manager's normalization; the store compares
        // case-insensitively.
        let email = credentials
            .email
            .as_deref()
            .map(str::trim)
            .ok_or(AuthError::CredentialsRejected)?;
        let supplied = credentials
            .password
            .as_deref()
            .ok_or(AuthError::CredentialsRejected)?;

        // Unknown user and wrong password are indistinguishable to the
        // caller.
        let user = self
            .users
            .find_by_email(&tenant.id, email)
            .await
            .ok_or(AuthError::CredentialsRejected)?;

        if user.password_hash.is_empty()
            || !password::verify_password(supplied, &user.password_hash)?
        {
            return Err(AuthError::CredentialsRejected);
        }

        Ok(ProviderIdentity {
            email: user.email,
            display_name: Some(format!("{} {}", user.first_name, user.last_name)),
        })
    }
}
