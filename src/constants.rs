//! Shared constants used across the application.

/// User agent string sent with outbound feed and article fetches.
///
/// Some feed hosts reject requests without a browser-looking agent string,
/// so this keeps the Mozilla prefix while still identifying the service.
pub const OUTBOUND_USER_AGENT: &str = "Mozilla/5.0 (compatible; guestbook-guard/0.1)";

/// Ceiling on fetched feed document size (1 MiB).
pub const MAX_FEED_BYTES: u64 = 1024 * 1024;

/// Ceiling on article HTML fetched for preview-image extraction (512 KiB).
pub const MAX_ARTICLE_BYTES: u64 = 512 * 1024;
