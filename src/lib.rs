//! # Claviger (Multi-tenant Authentication Service)
//!
//! `claviger` owns the authentication lifecycle for a multi-tenant
//! deployment: credential-provider dispatch, MFA challenge/response,
//! signed access/refresh tokens, sessions, lockout, and role/group
//! permission computation.
//!
//! ## Tenant Model
//!
//! Tenants are isolated namespaces sharing one deployment. Each tenant
//! carries its own allowed authentication methods and policy settings
//! (lockout threshold, password policy, session timeout). A `"default"`
//! tenant is seeded at startup.
//!
//! ## Authentication
//!
//! Providers form a closed set (`local`, `saml`, `oidc`, `ldap`); only
//! the providers a deployment is configured for are constructed. The
//! local provider verifies Argon2id password hashes; SSO/LDAP providers
//! are external protocol integrations plugged in behind the
//! `CredentialProvider` trait.
//!
//! ## Tokens & Sessions
//!
//! Access and refresh tokens are HS256 JWTs discriminated by a `typ`
//! claim. Refresh tokens rotate on use: the session registry re-keys to
//! the newly issued token and the consumed one is rejected on replay.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
