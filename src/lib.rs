//! Guestbook Guard library.
//!
//! The server-side safety layer for a small community site: SSRF-validated
//! outbound fetching, feed aggregation, rate limiting, submission
//! moderation, and stateless admin sessions.

pub mod article_images;
pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod feeds;
pub mod moderation;
pub mod net;
pub mod rate_limit;
pub mod web;
