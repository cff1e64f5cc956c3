//! Token issuance, refresh, verification, and logout endpoints.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::principal::require_access;
use crate::auth::manager::AuthFlow;
use crate::auth::token::TokenClaims;
use crate::auth::{AuthError, AuthManager, AuthenticationResult, Credentials};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenRequest {
    /// Defaults to the seeded `default` tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(flatten)]
    pub credentials: Credentials,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyResponse {
    pub valid: bool,
    /// `expired` or `invalid` when not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<TokenClaims>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutRequest {
    pub session_id: String,
}

fn rejection(err: &AuthError) -> (StatusCode, Json<AuthenticationResult>) {
    let status = match err {
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("auth operation failed: {err}");
    }
    (status, Json(AuthenticationResult::rejected(err.to_string())))
}

#[utoipa::path(
    post,
    path = "/v1/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Tokens issued or MFA challenge returned", body = AuthenticationResult),
        (status = 401, description = "Authentication rejected", body = AuthenticationResult)
    ),
    tag = "auth"
)]
pub async fn token(
    manager: Extension<Arc<AuthManager>>,
    Json(request): Json<TokenRequest>,
) -> impl IntoResponse {
    match manager
        .authenticate(&request.credentials, request.tenant_id.as_deref())
        .await
    {
        Ok(AuthFlow::Granted(grant)) => (
            StatusCode::OK,
            Json(AuthenticationResult::granted(
                grant.user,
                grant.access_token,
                grant.refresh_token,
                grant.expires_in,
            )),
        ),
        Ok(AuthFlow::MfaRequired(challenge)) => {
            (StatusCode::OK, Json(AuthenticationResult::mfa_required(challenge)))
        }
        Err(err) => rejection(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = AuthenticationResult),
        (status = 401, description = "Refresh rejected", body = AuthenticationResult)
    ),
    tag = "auth"
)]
pub async fn refresh(
    manager: Extension<Arc<AuthManager>>,
    Json(request): Json<RefreshRequest>,
) -> impl IntoResponse {
    match manager.refresh_access_token(&request.refresh_token).await {
        Ok(grant) => (
            StatusCode::OK,
            Json(AuthenticationResult::granted(
                grant.user,
                grant.access_token,
                grant.refresh_token,
                grant.expires_in,
            )),
        ),
        Err(err) => rejection(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification outcome", body = VerifyResponse)
    ),
    tag = "auth"
)]
pub async fn verify(
    manager: Extension<Arc<AuthManager>>,
    Json(request): Json<VerifyRequest>,
) -> impl IntoResponse {
    // Malformed input is a negative outcome, never a fault.
    let response = match manager.verify_token(&request.token) {
        Ok(claims) => VerifyResponse {
            valid: true,
            reason: None,
            claims: Some(claims),
        },
        Err(err) => VerifyResponse {
            valid: false,
            reason: Some(err.reason().to_string()),
            claims: None,
        },
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    manager: Extension<Arc<AuthManager>>,
    Json(request): Json<LogoutRequest>,
) -> impl IntoResponse {
    // Always 204: logout of an unknown session leaks nothing.
    manager.logout(&request.session_id).await;
    StatusCode::NO_CONTENT
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PermissionsResponse {
    pub resource: String,
    pub permissions: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/v1/auth/permissions/{resource}",
    params(
        ("resource" = String, Path, description = "Resource family to query")
    ),
    responses(
        (status = 200, description = "Effective permissions", body = PermissionsResponse),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "auth"
)]
pub async fn permissions(
    headers: HeaderMap,
    manager: Extension<Arc<AuthManager>>,
    Path(resource): Path<String>,
) -> axum::response::Response {
    let principal = match require_access(&headers, &manager) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    match manager.get_user_permissions(principal.user_id, &resource).await {
        Ok(permissions) => {
            // Sets have no meaningful order; sort for stable responses.
            let mut permissions: Vec<String> = permissions.into_iter().collect();
            permissions.sort();
            (StatusCode::OK, Json(PermissionsResponse { resource, permissions }))
                .into_response()
        }
        Err(AuthError::UserInactiveOrMissing) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to compute permissions: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::AuthMethod;

    #[test]
    fn token_request_flattens_credentials() {
        let request: TokenRequest = serde_json::from_str(
            r#"{"tenant_id": "default", "method": "local", "email": "a@x.com", "password": "pw"}"#,
        )
        .expect("valid token request");
        assert_eq!(request.tenant_id.as_deref(), Some("default"));
        assert_eq!(request.credentials.method, AuthMethod::Local);
        assert_eq!(request.credentials.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn verify_response_omits_empty_fields() {
        let response = VerifyResponse {
            valid: true,
            reason: None,
            claims: None,
        };
        let value = serde_json::to_value(&response).expect("serializable");
        assert_eq!(value, serde_json::json!({"valid": true}));
    }
}
