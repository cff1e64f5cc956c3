//! `OpenAPI` document for the HTTP surface.

use utoipa::OpenApi;

use crate::api::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::token,
        handlers::auth::refresh,
        handlers::auth::verify,
        handlers::auth::logout,
        handlers::auth::permissions,
        handlers::mfa::totp_enroll,
        handlers::mfa::sms_enroll,
        handlers::tenants::create,
        handlers::tenants::get,
        handlers::users::register,
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Token issuance, refresh and verification"),
        (name = "mfa", description = "Second-factor enrollment"),
        (name = "tenants", description = "Tenant administration"),
        (name = "users", description = "User registration")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
