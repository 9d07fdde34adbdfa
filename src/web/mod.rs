mod admin_auth;
mod feeds;
mod guestbook;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::article_images::ArticleImageResolver;
use crate::auth::SessionKeys;
use crate::config::Config;
use crate::db::Database;
use crate::feeds::FeedAggregator;
use crate::moderation::captcha::RecaptchaVerifier;
use crate::moderation::classifier::OpenAiModerationClassifier;
use crate::moderation::ModerationPipeline;
use crate::net::BoundedFetcher;
use crate::rate_limit::RateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub pipeline: Arc<ModerationPipeline>,
    pub feeds: Arc<FeedAggregator>,
    pub images: Arc<ArticleImageResolver>,
    pub session_keys: SessionKeys,
}

impl AppState {
    /// Wire up the production component graph from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be built.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let config = Arc::new(config);

        let fetcher = BoundedFetcher::new(config.allow_private_hosts)
            .context("Failed to build outbound fetcher")?;
        let verify_client = reqwest::Client::new();

        let limiter = Arc::new(RateLimiter::new());
        let captcha = Arc::new(RecaptchaVerifier::new(
            verify_client.clone(),
            config.recaptcha_verify_url.clone(),
            config.recaptcha_secret_key.clone(),
        ));
        let classifier = Arc::new(OpenAiModerationClassifier::new(
            verify_client,
            config.openai_moderation_url.clone(),
            config.openai_api_key.clone(),
        ));
        let pipeline = Arc::new(ModerationPipeline::new(
            Arc::clone(&limiter),
            captcha,
            classifier,
        ));

        let session_keys = SessionKeys::new(config.admin_session_secret.clone());

        Ok(Self {
            db,
            feeds: Arc::new(FeedAggregator::new(fetcher.clone(), config.feed_cache_ttl)),
            images: Arc::new(ArticleImageResolver::new(fetcher)),
            config,
            limiter,
            pipeline,
            session_keys,
        })
    }
}

/// Create the router with all routes.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/guestbook", get(guestbook::list_entries))
        .route("/api/guestbook/submit", post(guestbook::submit))
        .route("/api/guestbook/admin", post(guestbook::admin_action))
        .route("/api/admin/login", post(admin_auth::login))
        .route("/api/admin/logout", post(admin_auth::logout))
        .route("/api/feeds", get(feeds::feed_items))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Web server error")?;

    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

/// Best-effort caller address, fed to every rate-limit check.
///
/// `X-Forwarded-For` is client-forgeable, so it is honored only when the
/// deployment declares a trusted proxy in front (otherwise a caller could
/// rotate the header to mint a fresh limiter key per request). Without a
/// trusted header the socket peer is used. `None` (anonymous) callers share
/// one rate-limit counter.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> Option<String> {
    let forwarded = if trust_proxy_headers {
        headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    } else {
        None
    };

    forwarded.or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

/// Pull a named cookie out of the Cookie header.
pub(crate) fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|cookie| {
        let cookie = cookie.trim();
        cookie.strip_prefix(name)?.strip_prefix('=')
    })
}
