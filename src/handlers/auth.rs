use axum::{
    extract::{ConnectInfo, State},
    http::{header, Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    crypto::token::IssuedToken,
    error::Result,
    middleware_layer::auth::CREDENTIAL_COOKIE,
    models::session::{AuthSession, DeviceClass, SessionRecord},
    state::AppState,
};

/// The request payload for user registration.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// The request payload for user login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// Returned when a credential is handed out.
#[derive(Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
    /// Seconds until the credential expires.
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user_id: i64,
}

/// Creates the credential cookie. Its max-age matches the credential TTL.
fn credential_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(CREDENTIAL_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");
    cookie
}

fn hand_out(state: &AppState, cookies: &Cookies, issued: IssuedToken) -> TokenResponse {
    let expires_in = state.auth.issuer().ttl().num_seconds();
    cookies.add(credential_cookie(
        issued.token.clone(),
        expires_in,
        state.config.secure_cookies,
    ));

    TokenResponse {
        success: true,
        token: issued.token,
        expires_in,
    }
}

/// First `X-Forwarded-For` hop, then the peer address, then `unknown`.
fn client_origin(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    tracing::info!("📝 Register attempt for: {}", payload.email);

    let user = state
        .auth
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    let response = RegisterResponse {
        success: true,
        message: "Registration successful. Welcome!".to_string(),
        user_id: user.id,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    extensions: Extensions,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", payload.email);

    let device_class = DeviceClass::from_user_agent(
        headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok()),
    );
    let origin = client_origin(&headers, &extensions);

    let issued = state
        .auth
        .login(&payload.email, &payload.password, device_class, origin)
        .await?;

    let response = hand_out(&state, &cookies, issued);
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Rotates the caller's credential.
#[axum::debug_handler]
pub async fn refresh(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    cookies: Cookies,
) -> Result<Response> {
    let issued = state.auth.refresh(session).await?;
    let response = hand_out(&state, &cookies, issued);
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", session.user_id);

    state.auth.logout(session).await?;

    let mut cookie = Cookie::new(CREDENTIAL_COOKIE, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookies.remove(cookie);

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Lists the caller's live sessions, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<Vec<SessionRecord>>> {
    Ok(Json(state.auth.sessions(session.user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn origin_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 2], 4000))));

        assert_eq!(client_origin(&headers, &extensions), "203.0.113.7");
        assert_eq!(client_origin(&HeaderMap::new(), &extensions), "10.0.0.2");
        assert_eq!(client_origin(&HeaderMap::new(), &Extensions::new()), "unknown");
    }
}
