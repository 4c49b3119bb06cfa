use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, CredentialError},
    state::AppState,
};

/// Name of the cookie carrying the session credential.
pub const CREDENTIAL_COOKIE: &str = "jwt";

/// Extracts the credential from the cookie, falling back to a bearer header.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
///
/// # Returns
///
/// An `Option` containing the raw credential if one was presented.
fn extract_credential(cookies: &Cookies, request: &Request<Body>) -> Option<String> {
    if let Some(cookie) = cookies.get(CREDENTIAL_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// A middleware that requires a valid credential for a live session.
///
/// On success the caller's `AuthSession` is attached to the request
/// extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking authentication...");

    let Some(token) = extract_credential(&cookies, &request) else {
        tracing::warn!("❌ No credential presented");
        return AppError::CredentialInvalid(CredentialError::Malformed).into_response();
    };

    let session = match state.auth.authenticate(&token).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    tracing::debug!("✅ User authenticated: {}", session.user_id);

    request.extensions_mut().insert(session);

    next.run(request).await
}
