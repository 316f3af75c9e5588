//! Authentication for the portal API.
//!
//! Students are identified by the session token issued at login. Admin routes
//! are guarded by a pre-shared key compared in constant time.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::Identity;
use crate::AppState;

/// Header name for the admin API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Alternative header carrying a student session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// The signed-in student, resolved from the request's session token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))?;

        let session = match state.repo.get_session(&token).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::warn!("Unknown session token");
                return Err(AppError::Unauthorized("Not logged in".to_string()));
            }
            Err(e) => {
                tracing::error!("Session lookup failed: {}", e);
                return Err(AppError::Unauthorized("Not logged in".to_string()));
            }
        };

        if !session.is_valid_at(Utc::now()) {
            tracing::warn!(student_id = %session.student_id, "Session expired");
            return Err(AppError::Unauthorized("Session expired".to_string()));
        }

        Ok(CurrentUser(Identity {
            student_id: session.student_id,
        }))
    }
}

/// Session token from `Authorization: Bearer` or the session header.
fn session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers)
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .filter(|t| !t.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| bearer_token(request.headers()));

    match provided {
        Some(key) if constant_time_compare(&key, &expected) => next.run(request).await,
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing or invalid API key"),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn guarded(psk: Option<&str>) -> Router {
        let psk = psk.map(str::to_string);
        Router::new()
            .route("/admin", get(|| async { "ok" }))
            .layer(middleware::from_fn(move |req, next| {
                psk_auth_layer(psk.clone(), req, next)
            }))
    }

    async fn status_for(router: Router, headers: &[(&str, &str)]) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/admin");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
        assert!(!constant_time_compare("short", "much-longer-key"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(SESSION_HEADER, "from-header".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));

        headers.insert(header::AUTHORIZATION, "Bearer from-bearer".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("from-bearer"));
    }

    #[tokio::test]
    async fn test_psk_layer() {
        assert_eq!(status_for(guarded(None), &[]).await, StatusCode::OK);
        assert_eq!(
            status_for(guarded(Some("secret")), &[]).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(guarded(Some("secret")), &[(API_KEY_HEADER, "wrong")]).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(guarded(Some("secret")), &[(API_KEY_HEADER, "secret")]).await,
            StatusCode::OK
        );
        assert_eq!(
            status_for(guarded(Some("secret")), &[("authorization", "Bearer secret")]).await,
            StatusCode::OK
        );
    }
}
