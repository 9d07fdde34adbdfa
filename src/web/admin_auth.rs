//! Admin login and logout: password check plus a signed session cookie.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tracing::warn;

use super::{client_ip, AppState};

/// Login attempts: 10 per caller per 10 minutes.
const LOGIN_WINDOW: Duration = Duration::from_secs(600);
const LOGIN_MAX_REQUESTS: u32 = 10;

/// Cookie lifetime matches the token TTL (24 hours).
const COOKIE_MAX_AGE_SECS: u32 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    password: String,
}

/// POST /api/admin/login
///
/// Accepts a form-encoded body only; the admin page posts a plain form.
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let ip = client_ip(
        &headers,
        connect_info.as_ref(),
        state.config.trust_proxy_headers,
    );
    if !state
        .limiter
        .allow("admin-login", ip.as_deref(), LOGIN_WINDOW, LOGIN_MAX_REQUESTS)
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Too many login attempts").into_response();
    }

    let expected = state.config.admin_password.trim();
    if expected.len() < 12 || expected.to_lowercase().contains("changeme") {
        // Fail closed for this operation only; the rest of the site keeps
        // serving.
        warn!("Admin password is missing or a placeholder; refusing login");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Server misconfigured").into_response();
    }

    let password = form.password.trim();
    if password.is_empty() || password != expected {
        warn!(ip = ip.as_deref().unwrap_or("unknown"), "Failed admin login");
        return Redirect::to("/admin?status=auth").into_response();
    }

    let Some(token) = state.session_keys.issue() else {
        warn!("Session secret too weak to issue a token");
        return Redirect::to("/admin?status=error").into_response();
    };

    let cookie = format!(
        "admin_session={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={COOKIE_MAX_AGE_SECS}"
    );
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to("/admin?status=ok"),
    )
        .into_response()
}

/// POST /api/admin/logout
pub async fn logout() -> Response {
    let cookie = "admin_session=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0";
    (
        AppendHeaders([(header::SET_COOKIE, cookie.to_string())]),
        Redirect::to("/admin?status=logout"),
    )
        .into_response()
}
