//! Guestbook submission, public listing, and admin moderation actions.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::Deserialize;
use tracing::{error, warn};

use super::{client_ip, cookie_value, AppState};
use crate::db::{self, EntryPatch, EntryStatus, GuestbookConfig};
use crate::moderation::{Disposition, RejectReason, SubmissionForm};

/// Admin actions share one window: 30 per caller per minute.
const ADMIN_WINDOW: Duration = Duration::from_secs(60);
const ADMIN_MAX_REQUESTS: u32 = 30;

/// Hard caps on the banned-terms textarea, enforced before parsing.
const MAX_BANNED_RAW_LEN: usize = 10_000;
const MAX_BANNED_TERMS: usize = 1_000;

fn guestbook_redirect(status: &str) -> Redirect {
    Redirect::to(&format!("/guestbook/?status={status}"))
}

fn admin_redirect(status: &str) -> Redirect {
    Redirect::to(&format!("/admin/guestbook/?status={status}"))
}

// ========== Public routes ==========

#[derive(Debug, Deserialize)]
pub struct SubmitFormData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    website: String,
    #[serde(default, rename = "referredBy")]
    referred_by: String,
    #[serde(default, rename = "from")]
    from_location: String,
    #[serde(default)]
    comments: String,
    /// Honeypot: hidden field real users never fill.
    #[serde(default)]
    company: String,
    #[serde(default, rename = "g-recaptcha-response")]
    captcha_token: String,
}

/// POST /api/guestbook/submit
pub async fn submit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<SubmitFormData>,
) -> Response {
    let ip = client_ip(
        &headers,
        connect_info.as_ref(),
        state.config.trust_proxy_headers,
    );

    let submission = SubmissionForm {
        name: form.name,
        website: form.website,
        referred_by: form.referred_by,
        from_location: form.from_location,
        comments: form.comments,
        honeypot: form.company,
        captcha_token: form.captcha_token,
    };

    match state
        .pipeline
        .evaluate(&state.db, &submission, ip.as_deref())
        .await
    {
        Ok(Disposition::Accepted { status, .. }) => match status {
            EntryStatus::Pending => guestbook_redirect("pending").into_response(),
            _ => guestbook_redirect("ok").into_response(),
        },
        Ok(Disposition::Discarded) => StatusCode::NO_CONTENT.into_response(),
        Ok(Disposition::Rejected(reason)) => match reason {
            RejectReason::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response()
            }
            RejectReason::ValidationFailed => guestbook_redirect("error").into_response(),
            RejectReason::CaptchaFailed => guestbook_redirect("captcha").into_response(),
            RejectReason::Banned => guestbook_redirect("banned").into_response(),
        },
        Err(e) => {
            error!("Failed to store guestbook entry: {e:#}");
            guestbook_redirect("error").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/guestbook - approved, non-private entries, newest first.
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let limit = query.limit.clamp(1, 200);
    match db::list_approved_desc(state.db.pool(), limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            error!("Failed to list guestbook entries: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ========== Admin routes ==========

#[derive(Debug, Deserialize)]
pub struct AdminForm {
    #[serde(default)]
    action: String,
    record: Option<i64>,

    // Entry edit fields
    #[serde(default)]
    name: String,
    #[serde(default)]
    website: String,
    #[serde(default, rename = "referredBy")]
    referred_by: String,
    #[serde(default, rename = "from")]
    from_location: String,
    #[serde(default)]
    comments: String,
    #[serde(default, rename = "privateMessage")]
    private_message: String,

    // Config fields
    #[serde(rename = "maxLinks")]
    max_links: Option<i64>,
    #[serde(rename = "maxCommentLength")]
    max_comment_length: Option<i64>,
    #[serde(rename = "maxFieldLength")]
    max_field_length: Option<i64>,
    #[serde(default, rename = "requireModeration")]
    require_moderation: String,
    #[serde(default, rename = "bannedTerms")]
    banned_terms: String,
}

/// POST /api/guestbook/admin
pub async fn admin_action(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<AdminForm>,
) -> Response {
    let token = cookie_value(&headers, "admin_session").unwrap_or_default();
    if !state.session_keys.verify(token) {
        warn!("Admin action with missing or invalid session token");
        return Redirect::to("/admin?status=auth").into_response();
    }

    let ip = client_ip(
        &headers,
        connect_info.as_ref(),
        state.config.trust_proxy_headers,
    );
    if !state
        .limiter
        .allow("admin-actions", ip.as_deref(), ADMIN_WINDOW, ADMIN_MAX_REQUESTS)
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
    }

    let result = match form.action.as_str() {
        "approve" => set_status(&state, form.record, EntryStatus::Approved).await,
        "reject" => set_status(&state, form.record, EntryStatus::Rejected).await,
        "delete" => delete(&state, form.record).await,
        "update" => update(&state, &form).await,
        "update-config" => update_config(&state, &form).await,
        other => {
            warn!(action = other, "Unknown admin action");
            Err(())
        }
    };

    match result {
        Ok(()) => admin_redirect("ok").into_response(),
        Err(()) => admin_redirect("error").into_response(),
    }
}

async fn set_status(state: &AppState, record: Option<i64>, status: EntryStatus) -> Result<(), ()> {
    let record = record.ok_or(())?;
    match db::set_entry_status(state.db.pool(), record, status.as_str()).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(()),
        Err(e) => {
            error!(record, "Failed to set entry status: {e:#}");
            Err(())
        }
    }
}

async fn delete(state: &AppState, record: Option<i64>) -> Result<(), ()> {
    let record = record.ok_or(())?;
    match db::delete_entry(state.db.pool(), record).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(()),
        Err(e) => {
            error!(record, "Failed to delete entry: {e:#}");
            Err(())
        }
    }
}

async fn update(state: &AppState, form: &AdminForm) -> Result<(), ()> {
    let record = form.record.ok_or(())?;
    let patch = EntryPatch {
        name: sanitize(&form.name),
        website: sanitize(&form.website),
        referred_by: sanitize(&form.referred_by),
        from_location: sanitize(&form.from_location),
        comments: form.comments.trim().to_string(),
        private_message: form.private_message == "on",
    };

    match db::update_entry_fields(state.db.pool(), record, &patch).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(()),
        Err(e) => {
            error!(record, "Failed to update entry: {e:#}");
            Err(())
        }
    }
}

async fn update_config(state: &AppState, form: &AdminForm) -> Result<(), ()> {
    if form.banned_terms.len() > MAX_BANNED_RAW_LEN {
        return Err(());
    }
    let banned_terms: Vec<String> = form
        .banned_terms
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect();
    if banned_terms.len() > MAX_BANNED_TERMS {
        return Err(());
    }

    let defaults = GuestbookConfig::default();
    let config = GuestbookConfig {
        max_links: form.max_links.unwrap_or(defaults.max_links),
        max_comment_length: form
            .max_comment_length
            .unwrap_or(defaults.max_comment_length),
        max_field_length: form.max_field_length.unwrap_or(defaults.max_field_length),
        banned_terms,
        require_moderation: form.require_moderation == "on",
    };

    match db::update_config(state.db.pool(), &config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Failed to update guestbook config: {e:#}");
            Err(())
        }
    }
}

/// Same normalization the pipeline applies to submitted fields.
fn sanitize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
