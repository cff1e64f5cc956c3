//! MFA enrollment endpoints.
//!
//! Enrollment requires an authenticated session (a valid access
//! token); challenge verification itself happens on the second
//! `/v1/auth/token` round trip carrying `mfa_code`.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;

use super::principal::require_access;
use crate::auth::mfa::TotpEnrollment;
use crate::auth::{AuthError, AuthManager};

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/totp/enroll",
    responses(
        (status = 200, description = "TOTP enrolled; secret and recovery codes returned once", body = TotpEnrollment),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "mfa"
)]
pub async fn totp_enroll(
    headers: HeaderMap,
    manager: Extension<Arc<AuthManager>>,
) -> axum::response::Response {
    let principal = match require_access(&headers, &manager) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match manager.enroll_totp(principal.user_id).await {
        Ok(enrollment) => (StatusCode::OK, Json(enrollment)).into_response(),
        Err(AuthError::UserInactiveOrMissing) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to enroll TOTP: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/sms/enroll",
    responses(
        (status = 202, description = "SMS factor enabled; delivery setup is external"),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "mfa"
)]
pub async fn sms_enroll(
    headers: HeaderMap,
    manager: Extension<Arc<AuthManager>>,
) -> axum::response::Response {
    let principal = match require_access(&headers, &manager) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match manager.enroll_sms(principal.user_id).await {
        // Accepted, not OK: the delivery channel is provisioned
        // out-of-band.
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(AuthError::UserInactiveOrMissing) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to enroll SMS: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
