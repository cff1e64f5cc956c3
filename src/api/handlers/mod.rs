pub mod auth;
pub mod health;
pub mod mfa;
pub mod principal;
pub mod tenants;
pub mod users;

use axum::response::IntoResponse;

// axum handler for the undocumented root route
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
