//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::error::HttpError;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let auth_session_id = session_id_from(req.headers())
        .ok_or_else(|| HttpError::unauthorized("Could not validate credentials"))?;

    let user_id = state
        .identity
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            debug!("Rejected auth session: {}", e);
            HttpError::unauthorized("Could not validate credentials")
        })?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Reads the session id out of the `Cookie` header.
pub fn session_id_from(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix(prefix.as_str()).map(str::to_string))
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc123; x=1"));
        assert_eq!(session_id_from(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_or_empty_session_is_none() {
        let mut headers = HeaderMap::new();
        assert!(session_id_from(&headers).is_none());
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert!(session_id_from(&headers).is_none());
    }
}
