//! User registration endpoint.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::{AuthError, AuthManager, CreateUser, Role, UserSummary};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    /// Defaults to the seeded `default` tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserSummary),
        (status = 400, description = "Invalid email or weak password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "users"
)]
pub async fn register(
    manager: Extension<Arc<AuthManager>>,
    Json(request): Json<RegisterRequest>,
) -> axum::response::Response {
    let input = CreateUser {
        tenant_id: request
            .tenant_id
            .unwrap_or_else(|| crate::auth::TenantConfiguration::DEFAULT_TENANT_ID.to_string()),
        email: request.email,
        first_name: request.first_name,
        last_name: request.last_name,
        password: request.password,
        // Self-registration always lands at member level.
        roles: vec![Role::Member],
        groups: Vec::new(),
    };

    match manager.register_user(input).await {
        Ok(user) => (StatusCode::CREATED, Json(UserSummary::from(&user))).into_response(),
        Err(AuthError::TenantInvalid) => StatusCode::BAD_REQUEST.into_response(),
        Err(AuthError::Internal(msg)) if msg.contains("already registered") => {
            StatusCode::CONFLICT.into_response()
        }
        Err(AuthError::Internal(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(err) => {
            error!("Failed to register user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
