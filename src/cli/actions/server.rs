use crate::api;
use crate::auth::{
    AuthConfig, AuthManager, AuthMethod, LocalProvider, LogSmsSender, MemorySessionStore,
    MemoryTenantStore, MemoryUserStore, MfaService, ProviderRegistry,
};
use crate::cli::actions::Action;
use anyhow::Result;
use std::sync::Arc;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            signing_secret,
            access_token_ttl_minutes,
            refresh_token_ttl_days,
            totp_issuer,
        } => {
            let config = AuthConfig::new(signing_secret)
                .with_access_token_ttl_minutes(access_token_ttl_minutes)
                .with_refresh_token_ttl_days(refresh_token_ttl_days)
                .with_totp_issuer(totp_issuer);

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

            let manager = Arc::new(AuthManager::new(
                users, tenants, sessions, providers, mfa, config,
            ));
            manager.seed_default_tenant().await?;

            api::serve(port, manager).await?;
        }
    }

    Ok(())
}
