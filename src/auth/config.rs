//! Auth configuration: signing secret, token lifetimes, MFA settings.

use secrecy::{ExposeSecret, SecretString};

const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;
const DEFAULT_SMS_CODE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_TOTP_ISSUER: &str = "claviger";

/// Configuration for token issuance and MFA.
///
/// Built once at startup from CLI/env arguments and shared read-only.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_secret: SecretString,
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
    sms_code_ttl_seconds: i64,
    totp_issuer: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_secret: SecretString) -> Self {
        Self {
            signing_secret,
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            sms_code_ttl_seconds: DEFAULT_SMS_CODE_TTL_SECONDS,
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    pub(crate) fn signing_secret(&self) -> &[u8] {
        self.signing_secret.expose_secret().as_bytes()
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_minutes * 60
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_days * 24 * 60 * 60
    }

    #[must_use]
    pub fn sms_code_ttl_seconds(&self) -> i64 {
        self.sms_code_ttl_seconds
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_lifetimes() {
        let config = AuthConfig::new(SecretString::from("test-secret"));
        assert_eq!(config.access_token_ttl_seconds(), 1800);
        assert_eq!(config.refresh_token_ttl_seconds(), 30 * 24 * 3600);
        assert_eq!(config.sms_code_ttl_seconds(), 300);
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new(SecretString::from("test-secret"))
            .with_access_token_ttl_minutes(5)
            .with_refresh_token_ttl_days(1)
            .with_totp_issuer("example".to_string());
        assert_eq!(config.access_token_ttl_seconds(), 300);
        assert_eq!(config.refresh_token_ttl_seconds(), 86_400);
        assert_eq!(config.totp_issuer(), "example");
    }
}
