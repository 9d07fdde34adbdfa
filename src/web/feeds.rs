//! Aggregated feed items as JSON.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::feeds::FetchOptions;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    max_items: Option<usize>,
    /// Inclusive range bounds, `YYYY-MM-DD`.
    start: Option<String>,
    end: Option<String>,
    source: Option<String>,
    /// When set, missing preview images are resolved from the articles.
    #[serde(default)]
    images: bool,
}

/// GET /api/feeds
pub async fn feed_items(State(state): State<AppState>, Query(query): Query<FeedQuery>) -> Response {
    let options = FetchOptions {
        max_items: query.max_items,
        start_date: query.start,
        end_date: query.end,
        source_label: query.source,
    };

    let items = state.feeds.fetch_all(&state.config.feed_urls, &options).await;

    let items = if query.images {
        state.images.attach_images(items).await
    } else {
        items
    };

    Json(items).into_response()
}
