//! Bearer-token principal extraction for protected endpoints.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::token::{TokenClaims, TokenType};
use crate::auth::AuthManager;

/// A verified access-token principal.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub tenant_id: String,
    pub claims: TokenClaims,
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Require a valid, unexpired access token. Refresh tokens are not
/// accepted here.
pub(crate) fn require_access(
    headers: &HeaderMap,
    manager: &Arc<AuthManager>,
) -> Result<Principal, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = manager
        .verify_token(&token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    if claims.typ != TokenType::Access {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let user_id = claims.user_id().ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Principal {
        user_id,
        tenant_id: claims.tenant_id.clone(),
        claims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extract_bearer_token_parses_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn extract_bearer_token_rejects_other_schemes_and_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert!(extract_bearer_token(&headers).is_none());
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_none());
    }
}
