//! Tenant administration endpoints.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::principal::require_access;
use crate::auth::models::TenantSettings;
use crate::auth::{AuthManager, AuthMethod, TenantConfiguration};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateTenantRequest {
    pub id: String,
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub allowed_auth_methods: Vec<AuthMethod>,
}

/// Creating a tenant requires a tenant-level grant on the caller's
/// access token.
async fn may_manage_tenants(manager: &Arc<AuthManager>, headers: &HeaderMap) -> Result<(), StatusCode> {
    let principal = require_access(headers, manager)?;
    let permissions = manager
        .get_user_permissions(principal.user_id, "tenant")
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let allowed = permissions.contains("*")
        || permissions.contains("tenant:*")
        || permissions.contains("tenant:create");
    if allowed {
        Ok(())
    } else {
        // 404 would hide the route; this is an admin API, 403 is fine.
        Err(StatusCode::FORBIDDEN)
    }
}

#[utoipa::path(
    post,
    path = "/v1/tenants",
    request_body = CreateTenantRequest,
    responses(
        (status = 201, description = "Tenant created"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Caller lacks tenant grants"),
        (status = 409, description = "Tenant id already exists")
    ),
    tag = "tenants"
)]
pub async fn create(
    headers: HeaderMap,
    manager: Extension<Arc<AuthManager>>,
    Json(request): Json<CreateTenantRequest>,
) -> axum::response::Response {
    if let Err(status) = may_manage_tenants(&manager, &headers).await {
        return status.into_response();
    }

    let allowed_auth_methods = if request.allowed_auth_methods.is_empty() {
        vec![AuthMethod::Local]
    } else {
        request.allowed_auth_methods
    };

    let tenant = TenantConfiguration {
        id: request.id,
        name: request.name,
        domain: request.domain,
        allowed_auth_methods,
        sso_settings: serde_json::Value::Null,
        branding: serde_json::Value::Null,
        settings: TenantSettings::default(),
        resource_limits: HashMap::new(),
        is_active: true,
        created_at: Utc::now(),
    };

    match manager.create_tenant(tenant).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => {
            error!("Failed to create tenant: {err}");
            StatusCode::CONFLICT.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/tenants/{id}",
    params(
        ("id" = String, Path, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Tenant configuration", body = Object),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Unknown tenant")
    ),
    tag = "tenants"
)]
pub async fn get(
    headers: HeaderMap,
    manager: Extension<Arc<AuthManager>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(status) = may_manage_tenants(&manager, &headers).await {
        return status.into_response();
    }
    match manager.get_tenant(&id).await {
        Some(tenant) => (StatusCode::OK, Json(tenant)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
