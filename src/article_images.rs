//! Opportunistic preview-image lookup for article URLs.
//!
//! Fetches a page, pulls the first recognized preview-image meta tag, and
//! caches the result for the life of the process. This is an enrichment, not
//! a correctness path: every failure mode caches and returns `None`.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use tracing::debug;
use url::Url;

use crate::constants::MAX_ARTICLE_BYTES;
use crate::feeds::FeedItem;
use crate::net::BoundedFetcher;

/// Meta keys recognized as preview images, in priority order.
const META_KEYS: [&str; 3] = ["og:image", "twitter:image", "twitter:image:src"];

/// Short budget: a preview image is not worth a slow page load.
const ARTICLE_FETCH_TIMEOUT: Duration = Duration::from_secs(4);

/// Resolves article URLs to preview-image URLs with process-lifetime caching.
///
/// og:image content rarely changes, so entries have no TTL; a failed lookup
/// caches `None` to avoid repeating an expensive fetch (negative caching).
pub struct ArticleImageResolver {
    fetcher: BoundedFetcher,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl ArticleImageResolver {
    #[must_use]
    pub fn new(fetcher: BoundedFetcher) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the preview image for a page, fetching on cache miss.
    pub async fn resolve(&self, url: &str) -> Option<String> {
        {
            let cache = self.cache.lock().expect("image cache lock poisoned");
            if let Some(cached) = cache.get(url) {
                return cached.clone();
            }
        }

        let image = self.lookup(url).await;

        let mut cache = self.cache.lock().expect("image cache lock poisoned");
        cache.insert(url.to_string(), image.clone());
        image
    }

    /// Fill in missing images on feed items, leaving existing ones alone.
    pub async fn attach_images(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        let mut out = Vec::with_capacity(items.len());
        for mut item in items {
            if item.image.is_none() {
                item.image = self.resolve(&item.url).await;
            }
            out.push(item);
        }
        out
    }

    async fn lookup(&self, url: &str) -> Option<String> {
        let html = match self
            .fetcher
            .fetch_text(url, MAX_ARTICLE_BYTES, ARTICLE_FETCH_TIMEOUT)
            .await
        {
            Ok(html) => html,
            Err(e) => {
                debug!(url, error = %e, "Article fetch failed, caching negative result");
                return None;
            }
        };

        extract_meta_image(&html).map(|image| absolutize(&image, url))
    }
}

static META_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"<meta\s+[^>]*>")
        .case_insensitive(true)
        .build()
        .expect("static meta pattern")
});

// Attr patterns run once per meta tag; compiled once, keyed by name.
static ATTR_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    ["property", "name", "content"]
        .into_iter()
        .map(|name| (name, attr_regex(name)))
        .collect()
});

fn attr_regex(name: &str) -> Regex {
    RegexBuilder::new(&format!(
        r#"{}\s*=\s*["']([^"']+)["']"#,
        regex::escape(name)
    ))
    .case_insensitive(true)
    .build()
    .expect("static attr pattern")
}

/// Scan `<meta>` tags for the recognized preview-image keys, in priority
/// order rather than document order.
fn extract_meta_image(html: &str) -> Option<String> {
    let tags: Vec<&str> = META_TAG_RE.find_iter(html).map(|m| m.as_str()).collect();

    for key in META_KEYS {
        for tag in &tags {
            let tag_key = get_attr(tag, "property")
                .or_else(|| get_attr(tag, "name"))
                .unwrap_or_default()
                .to_lowercase();
            if tag_key != key {
                continue;
            }
            if let Some(content) = get_attr(tag, "content") {
                return Some(content);
            }
        }
    }

    None
}

fn get_attr(tag: &str, name: &str) -> Option<String> {
    ATTR_PATTERNS
        .get(name)?
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolve a possibly-relative image URL against the page it came from.
fn absolutize(value: &str, base: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(value))
        .map_or_else(|_| value.to_string(), |u| u.to_string())
}
