//! Multi-factor authentication: TOTP enrollment/verification, SMS
//! challenges, and one-time recovery codes.
//!
//! Flow overview:
//! 1) Enrollment stores a TOTP secret (plus recovery codes) or marks
//!    SMS as enabled.
//! 2) At login, a challenge descriptor is produced from the user's
//!    enabled method; SMS challenges also dispatch a code through the
//!    external [`SmsSender`] channel.
//! 3) Verification checks the supplied code against the time-windowed
//!    TOTP algorithm or the stored, unexpired SMS code (consumed on
//!    match — a code never verifies twice).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::models::{MfaChallenge, UserProfile};

const RECOVERY_CODE_COUNT: usize = 10;
const RECOVERY_CODE_BYTES: usize = 8;
const SMS_CODE_DIGITS: u32 = 6;

/// Closed set of supported second factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MfaMethod {
    Totp,
    Sms,
}

/// External SMS delivery channel. The wire protocol to the gateway is
/// out of scope; deployments plug in a real client here.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_code(&self, user: &UserProfile, code: &str) -> AuthResult<()>;
}

/// Development sender that logs instead of delivering.
#[derive(Clone, Debug, Default)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_code(&self, user: &UserProfile, _code: &str) -> AuthResult<()> {
        info!(user_id = %user.id, "SMS code generated (log-only sender, not delivered)");
        Ok(())
    }
}

/// Result of a TOTP enrollment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TotpEnrollment {
    /// Base32 secret for manual entry.
    pub secret: String,
    /// `otpauth://` provisioning URI binding secret, account and issuer.
    pub otpauth_uri: String,
    /// One-time recovery codes; shown to the user exactly once.
    pub recovery_codes: Vec<String>,
}

struct PendingSmsCode {
    code: String,
    expires_at: DateTime<Utc>,
}

/// MFA engine: owns the TOTP parameters, pending SMS codes, and the
/// delivery channel.
pub struct MfaService {
    issuer: String,
    sms_code_ttl: Duration,
    sms_sender: std::sync::Arc<dyn SmsSender>,
    pending_sms: RwLock<HashMap<Uuid, PendingSmsCode>>,
}

impl MfaService {
    #[must_use]
    pub fn new(
        issuer: String,
        sms_code_ttl_seconds: i64,
        sms_sender: std::sync::Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            issuer,
            sms_code_ttl: Duration::seconds(sms_code_ttl_seconds),
            sms_sender,
            pending_sms: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a fresh TOTP enrollment for `email`: random secret,
    /// provisioning URI, and recovery codes.
    ///
    /// The caller persists the secret and the *hashes* of the recovery
    /// codes; the plaintext codes leave this function exactly once.
    pub fn enroll_totp(&self, email: &str) -> AuthResult<(TotpEnrollment, Vec<String>)> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("secret generation: {e}")))?;

        let totp = self.totp_for(secret_bytes, email)?;
        let otpauth_uri = totp.get_url();
        let secret_base32 = totp.get_secret_base32();

        let recovery_codes = generate_recovery_codes();
        let recovery_hashes = recovery_codes.iter().map(|c| hash_recovery_code(c)).collect();

        Ok((
            TotpEnrollment {
                secret: secret_base32,
                otpauth_uri,
                recovery_codes,
            },
            recovery_hashes,
        ))
    }

    /// Verify a TOTP code against a stored base32 secret using the
    /// RFC 6238 time-windowed check.
    pub fn verify_totp(&self, secret_base32: &str, email: &str, code: &str) -> AuthResult<bool> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("stored secret: {e}")))?;
        let totp = self.totp_for(secret_bytes, email)?;
        Ok(totp.check_current(code).unwrap_or(false))
    }

    /// Produce the challenge for the user's enabled method. SMS
    /// challenges generate, store, and dispatch a fresh code.
    pub async fn challenge(&self, user: &UserProfile) -> AuthResult<MfaChallenge> {
        match user.mfa_methods.first() {
            Some(MfaMethod::Totp) => Ok(MfaChallenge {
                method: MfaMethod::Totp,
                prompt: "Enter the code from your authenticator app".to_string(),
            }),
            Some(MfaMethod::Sms) => {
                let code = generate_sms_code();
                self.pending_sms.write().await.insert(
                    user.id,
                    PendingSmsCode {
                        code: code.clone(),
                        expires_at: Utc::now() + self.sms_code_ttl,
                    },
                );
                self.sms_sender.send_code(user, &code).await?;
                Ok(MfaChallenge {
                    method: MfaMethod::Sms,
                    prompt: "Enter the code sent to your phone".to_string(),
                })
            }
            // mfa_enabled without a method violates the profile
            // invariant; surface it instead of silently passing.
            None => Err(AuthError::Internal(
                "MFA enabled but no method enrolled".to_string(),
            )),
        }
    }

    /// Match a code against the pending SMS challenge for this user.
    /// The stored code is consumed on success and dropped on expiry.
    pub async fn verify_sms(&self, user_id: Uuid, code: &str) -> bool {
        let mut pending = self.pending_sms.write().await;
        match pending.get(&user_id) {
            Some(entry) if entry.expires_at <= Utc::now() => {
                pending.remove(&user_id);
                false
            }
            Some(entry) if entry.code == code => {
                pending.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    fn totp_for(&self, secret_bytes: Vec<u8>, email: &str) -> AuthResult<TOTP> {
        TOTP::new(
            Algorithm::SHA1, // RFC 6238 default
            6,
            1,
            30,
            secret_bytes,
            Some(self.issuer.clone()),
            email.to_string(),
        )
        .map_err(|e| AuthError::Internal(format!("TOTP init: {e}")))
    }
}

fn generate_sms_code() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    let value = u32::from_be_bytes(bytes) % 10u32.pow(SMS_CODE_DIGITS);
    format!("{value:06}")
}

fn generate_recovery_codes() -> Vec<String> {
    (0..RECOVERY_CODE_COUNT)
        .map(|_| {
            let mut bytes = [0u8; RECOVERY_CODE_BYTES];
            OsRng.fill_bytes(&mut bytes);
            hex::encode(bytes)
        })
        .collect()
}

/// SHA-256 hex digest of a recovery code; only hashes are stored.
#[must_use]
pub fn hash_recovery_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
