//! Router assembly and the HTTP server entry point.

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthManager;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the application router with all routes and layers wired.
#[must_use]
pub fn router(manager: Arc<AuthManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health::health))
        .route("/v1/auth/token", post(handlers::auth::token))
        .route("/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/v1/auth/verify", post(handlers::auth::verify))
        .route("/v1/auth/logout", post(handlers::auth::logout))
        .route(
            "/v1/auth/permissions/:resource",
            get(handlers::auth::permissions),
        )
        .route("/v1/auth/mfa/totp/enroll", post(handlers::mfa::totp_enroll))
        .route("/v1/auth/mfa/sms/enroll", post(handlers::mfa::sms_enroll))
        .route("/v1/tenants", post(handlers::tenants::create))
        .route("/v1/tenants/:id", get(handlers::tenants::get))
        .route("/v1/users", post(handlers::users::register))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(manager)),
        )
}

/// Start the server.
/// # Errors
/// Return error if failed to bind or serve
pub async fn serve(port: u16, manager: Arc<AuthManager>) -> Result<()> {
    let app = router(manager);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
