//! Multi-provider authentication: tenants, credential providers, MFA,
//! tokens, sessions, and permissions.

pub mod config;
pub mod error;
pub mod manager;
pub mod mfa;
pub mod models;
pub mod password;
pub mod provider;
pub mod rbac;
pub mod store;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use manager::{AuthFlow, AuthManager, TokenGrant};
pub use mfa::{LogSmsSender, MfaMethod, MfaService, SmsSender};
pub use models::{
    AuthenticationResult, CreateUser, Credentials, MfaChallenge, TenantConfiguration, UserProfile,
    UserSummary,
};
pub use provider::{AuthMethod, CredentialProvider, LocalProvider, ProviderRegistry};
pub use rbac::Role;
pub use store::{
    MemorySessionStore, MemoryTenantStore, MemoryUserStore, SessionStore, TenantStore, UserStore,
};
