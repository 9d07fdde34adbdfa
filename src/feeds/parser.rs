//! Tolerant pattern-based RSS/Atom item extraction.
//!
//! Deliberately not a spec-compliant XML parser: feeds in the wild are
//! frequently malformed, and a bounded regex extractor degrades per-item
//! instead of rejecting the whole document.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::{Regex, RegexBuilder};

use crate::feeds::FeedItem;
use crate::net::is_http_url;

/// Extract feed items from raw RSS or Atom XML.
///
/// Items missing a title, or whose link is not an http(s) URL, are dropped.
#[must_use]
pub fn parse_items(xml: &str, fallback_source: Option<&str>) -> Vec<FeedItem> {
    let mut blocks = find_blocks(xml, "item");
    if blocks.is_empty() {
        blocks = find_blocks(xml, "entry");
    }

    blocks
        .into_iter()
        .filter_map(|block| parse_block(block, fallback_source))
        .collect()
}

fn parse_block(block: &str, fallback_source: Option<&str>) -> Option<FeedItem> {
    let title = get_tag(block, "title")?;
    if title.is_empty() {
        return None;
    }

    let link = get_tag(block, "link")
        .filter(|l| !l.is_empty())
        .or_else(|| first_tag(block, "link").and_then(|tag| get_attr(&tag, "href")))
        .or_else(|| get_tag(block, "guid"))?;
    let link = link.trim().to_string();
    if !is_http_url(&link) {
        return None;
    }

    let pub_date = get_tag(block, "pubDate")
        .or_else(|| get_tag(block, "updated"))
        .or_else(|| get_tag(block, "published"));

    let source = get_tag(block, "source")
        .or_else(|| get_tag(block, "author"))
        .or_else(|| fallback_source.map(ToString::to_string));

    let image = first_tag(block, "media:content")
        .and_then(|tag| get_attr(&tag, "url"))
        .or_else(|| first_tag(block, "media:thumbnail").and_then(|tag| get_attr(&tag, "url")))
        .or_else(|| first_tag(block, "enclosure").and_then(|tag| get_attr(&tag, "url")));

    Some(FeedItem {
        title,
        url: link,
        date_text: format_date(pub_date.as_deref()),
        source,
        image,
    })
}

// Patterns run once per item block, so they are compiled once up front,
// keyed by the fixed tag/attribute names the extractor looks for.

static BLOCK_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    ["item", "entry"]
        .into_iter()
        .map(|tag| (tag, block_regex(tag)))
        .collect()
});

static TAG_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    [
        "title",
        "link",
        "guid",
        "pubDate",
        "updated",
        "published",
        "source",
        "author",
    ]
    .into_iter()
    .map(|tag| (tag, inner_tag_regex(tag)))
    .collect()
});

static OPEN_TAG_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    ["link", "media:content", "media:thumbnail", "enclosure"]
        .into_iter()
        .map(|tag| (tag, open_tag_regex(tag)))
        .collect()
});

static ATTR_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    ["href", "url"]
        .into_iter()
        .map(|name| (name, attr_regex(name)))
        .collect()
});

static CDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"<!\[CDATA\[(.*?)\]\]>")
        .dot_matches_new_line(true)
        .build()
        .expect("static cdata pattern")
});

fn block_regex(tag: &str) -> Regex {
    RegexBuilder::new(&format!("<{0}.*?</{0}>", regex::escape(tag)))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("static block pattern")
}

fn inner_tag_regex(tag: &str) -> Regex {
    RegexBuilder::new(&format!("<{0}[^>]*>(.*?)</{0}>", regex::escape(tag)))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("static tag pattern")
}

fn open_tag_regex(tag: &str) -> Regex {
    RegexBuilder::new(&format!("<{}[^>]*>", regex::escape(tag)))
        .case_insensitive(true)
        .build()
        .expect("static open-tag pattern")
}

fn attr_regex(name: &str) -> Regex {
    RegexBuilder::new(&format!(
        r#"{}\s*=\s*["']([^"']+)["']"#,
        regex::escape(name)
    ))
    .case_insensitive(true)
    .build()
    .expect("static attr pattern")
}

/// Find `<tag ...> ... </tag>` blocks, non-greedy, case-insensitive.
fn find_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    BLOCK_PATTERNS
        .get(tag)
        .map(|re| re.find_iter(xml).map(|m| m.as_str()).collect())
        .unwrap_or_default()
}

/// Inner text of the first `<tag>...</tag>` pair, CDATA unwrapped and trimmed.
fn get_tag(block: &str, tag: &str) -> Option<String> {
    TAG_PATTERNS
        .get(tag)?
        .captures(block)
        .map(|caps| strip_cdata(caps.get(1).map_or("", |m| m.as_str())))
}

/// The first opening `<tag ...>` element, attributes included.
fn first_tag(block: &str, tag: &str) -> Option<String> {
    OPEN_TAG_PATTERNS
        .get(tag)?
        .find(block)
        .map(|m| m.as_str().to_string())
}

/// A quoted attribute value out of a raw tag string.
fn get_attr(tag: &str, name: &str) -> Option<String> {
    ATTR_PATTERNS
        .get(name)?
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn strip_cdata(value: &str) -> String {
    CDATA_RE.replace_all(value, "$1").trim().to_string()
}

/// Normalize a feed timestamp to display text, `"Unknown date"` on failure.
#[must_use]
pub fn format_date(value: Option<&str>) -> String {
    value
        .and_then(parse_feed_date)
        .map_or_else(|| "Unknown date".to_string(), display_date)
}

fn display_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Parse the timestamp formats feeds actually use: RFC 2822 (RSS pubDate),
/// RFC 3339 (Atom updated/published), and a couple of date-only fallbacks.
fn parse_feed_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    NaiveDate::parse_from_str(value, "%b %d, %Y").ok()
}

/// Re-parse a display date string for range filtering. Items whose original
/// date failed to parse ("Unknown date") yield `None` and are dropped by an
/// active filter.
#[must_use]
pub fn parse_display_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%b %d, %Y").ok()
}

/// Parse a caller-supplied range bound (`YYYY-MM-DD` or display format).
#[must_use]
pub fn parse_bound_date(value: &str) -> Option<NaiveDate> {
    parse_feed_date(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example News</title>
    <item>
      <title><![CDATA[First Story]]></title>
      <link>https://news.example.com/first</link>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <source>Example Wire</source>
      <media:thumbnail url="https://cdn.example.com/thumb.jpg" />
    </item>
    <item>
      <link>https://news.example.com/untitled</link>
      <pubDate>Tue, 02 Jan 2024 12:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Bad Link</title>
      <link>javascript:alert(1)</link>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <entry>
    <title>Atom Post</title>
    <link href="https://blog.example.com/atom-post" />
    <updated>2024-03-05T09:30:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_drops_invalid_items() {
        let items = parse_items(RSS_SAMPLE, None);

        // The untitled item and the non-http link are discarded.
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "First Story");
        assert_eq!(item.url, "https://news.example.com/first");
        assert_eq!(item.date_text, "Jan 1, 2024");
        assert_eq!(item.source.as_deref(), Some("Example Wire"));
        assert_eq!(
            item.image.as_deref(),
            Some("https://cdn.example.com/thumb.jpg")
        );
    }

    #[test]
    fn test_parse_atom_entry_link_href() {
        let items = parse_items(ATOM_SAMPLE, Some("Example Blog"));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://blog.example.com/atom-post");
        assert_eq!(items[0].date_text, "Mar 5, 2024");
        assert_eq!(items[0].source.as_deref(), Some("Example Blog"));
    }

    #[test]
    fn test_guid_fallback_link() {
        let xml = r"<item><title>Guid Only</title><guid>https://news.example.com/guid</guid></item>";
        let items = parse_items(xml, None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://news.example.com/guid");
        assert_eq!(items[0].date_text, "Unknown date");
    }

    #[test]
    fn test_enclosure_image() {
        let xml = concat!(
            "<item><title>With Enclosure</title>",
            "<link>https://news.example.com/e</link>",
            r#"<enclosure url="https://cdn.example.com/pic.png" type="image/png"/>"#,
            "</item>"
        );
        let items = parse_items(xml, None);
        assert_eq!(
            items[0].image.as_deref(),
            Some("https://cdn.example.com/pic.png")
        );
    }

    #[test]
    fn test_strip_cdata() {
        assert_eq!(strip_cdata("<![CDATA[hello]]>"), "hello");
        assert_eq!(strip_cdata("  plain  "), "plain");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(
            format_date(Some("Mon, 01 Jan 2024 12:00:00 +0000")),
            "Jan 1, 2024"
        );
        assert_eq!(format_date(Some("2024-03-05T09:30:00Z")), "Mar 5, 2024");
        assert_eq!(format_date(Some("not a date")), "Unknown date");
        assert_eq!(format_date(None), "Unknown date");
    }

    #[test]
    fn test_parse_display_date_roundtrip() {
        let display = format_date(Some("Mon, 01 Jan 2024 12:00:00 +0000"));
        let parsed = parse_display_date(&display).unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(parse_display_date("Unknown date").is_none());
    }
}
