//! Multi-stage submission moderation.
//!
//! A submission passes through ordered stages, short-circuiting on the first
//! rejection: rate check, honeypot, field validation, CAPTCHA, banned-term
//! scan, then risk scoring. Scoring never hard-fails; moderation uncertainty
//! routes the entry to human review instead of blocking it.

pub mod captcha;
pub mod classifier;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::db::{self, Database, EntryStatus, GuestbookConfig, NewEntry};
use crate::moderation::captcha::CaptchaVerifier;
use crate::moderation::classifier::ContentClassifier;
use crate::rate_limit::RateLimiter;

/// Submission rate limit: 5 per caller per minute.
const SUBMIT_WINDOW: Duration = Duration::from_secs(60);
const SUBMIT_MAX_REQUESTS: u32 = 5;

/// Raw submission fields as received from the form.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub name: String,
    pub website: String,
    pub referred_by: String,
    pub from_location: String,
    pub comments: String,
    /// Hidden field legitimate clients leave empty.
    pub honeypot: String,
    pub captcha_token: String,
}

/// Why a submission was rejected with a user-visible outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooManyRequests,
    ValidationFailed,
    CaptchaFailed,
    Banned,
}

/// Final disposition of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Entry was stored with the given record number and status.
    Accepted { record: i64, status: EntryStatus },
    /// Honeypot tripped: respond as if accepted, store nothing. Automated
    /// abusers get no signal that they were detected.
    Discarded,
    Rejected(RejectReason),
}

/// The moderation pipeline and its collaborators.
pub struct ModerationPipeline {
    limiter: Arc<RateLimiter>,
    captcha: Arc<dyn CaptchaVerifier>,
    classifier: Arc<dyn ContentClassifier>,
}

impl ModerationPipeline {
    #[must_use]
    pub fn new(
        limiter: Arc<RateLimiter>,
        captcha: Arc<dyn CaptchaVerifier>,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Self {
        Self {
            limiter,
            captcha,
            classifier,
        }
    }

    /// Evaluate a submission and, when it survives every stage, store it.
    ///
    /// # Errors
    ///
    /// Returns an error only when the storage layer fails; every moderation
    /// signal maps to a [`Disposition`] instead.
    pub async fn evaluate(
        &self,
        database: &Database,
        form: &SubmissionForm,
        client_ip: Option<&str>,
    ) -> Result<Disposition> {
        // Stage 1: rate check.
        if !self
            .limiter
            .allow("guestbook-submit", client_ip, SUBMIT_WINDOW, SUBMIT_MAX_REQUESTS)
        {
            debug!(ip = client_ip.unwrap_or("unknown"), "Submission rate limited");
            return Ok(Disposition::Rejected(RejectReason::TooManyRequests));
        }

        // Stage 2: honeypot.
        if !form.honeypot.trim().is_empty() {
            info!("Honeypot tripped, discarding submission silently");
            return Ok(Disposition::Discarded);
        }

        let config = db::load_config(database.pool()).await?;

        // Stage 3: required fields and length bounds.
        let name = sanitize(&form.name);
        let website = sanitize(&form.website);
        let referred_by = sanitize(&form.referred_by);
        let from_location = sanitize(&form.from_location);
        let comments = form.comments.trim().to_string();

        if name.is_empty() || comments.is_empty() {
            return Ok(Disposition::Rejected(RejectReason::ValidationFailed));
        }
        let max_field = usize::try_from(config.max_field_length).unwrap_or(usize::MAX);
        if [&name, &website, &referred_by, &from_location]
            .iter()
            .any(|field| field.len() > max_field)
        {
            return Ok(Disposition::Rejected(RejectReason::ValidationFailed));
        }
        if comments.len() > usize::try_from(config.max_comment_length).unwrap_or(usize::MAX) {
            return Ok(Disposition::Rejected(RejectReason::ValidationFailed));
        }

        // Stage 4: CAPTCHA.
        let captcha = self.captcha.verify(&form.captcha_token, client_ip).await;
        if !captcha.ok {
            debug!(reason = captcha.reason.as_deref().unwrap_or(""), "CAPTCHA failed");
            return Ok(Disposition::Rejected(RejectReason::CaptchaFailed));
        }

        // Stage 5: banned terms. Hard reject, nothing is stored.
        let combined = format!("{name}\n{website}\n{referred_by}\n{from_location}\n{comments}");
        if matches_banned_term(&combined, &config.banned_terms) {
            warn!("Submission matched a banned term");
            return Ok(Disposition::Rejected(RejectReason::Banned));
        }

        // Stage 6: risk scoring. An unreachable classifier is a risk signal,
        // not a pass.
        let link_count = count_links(&format!("{website} {comments}"));
        let classification = self.classifier.classify(&combined).await;
        let requires_review = config.require_moderation
            || link_count > link_budget(&config)
            || classification.flagged
            || !classification.available;

        // Stage 7: disposition and storage.
        let status = if requires_review {
            EntryStatus::Pending
        } else {
            EntryStatus::Approved
        };
        let record = db::next_record_number(database.pool()).await?;

        let entry = NewEntry {
            record,
            name,
            website,
            referred_by,
            from_location,
            comments,
            private_message: false,
            flagged: requires_review,
            status,
        };
        db::insert_entry(database.pool(), &entry).await?;

        info!(record, status = status.as_str(), link_count, "Guestbook entry stored");
        Ok(Disposition::Accepted { record, status })
    }
}

fn link_budget(config: &GuestbookConfig) -> usize {
    usize::try_from(config.max_links).unwrap_or(0)
}

/// Trim and collapse internal whitespace runs to single spaces.
fn sanitize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count link-like tokens: `http://`, `https://`, and bare `www.`.
fn count_links(text: &str) -> usize {
    let re = Regex::new(r"(?i)https?://|www\.").expect("static link pattern");
    re.find_iter(text).count()
}

/// Case-insensitive substring scan over the configured banned terms.
fn matches_banned_term(text: &str, terms: &[String]) -> bool {
    let lower = text.to_lowercase();
    terms
        .iter()
        .filter(|term| !term.is_empty())
        .any(|term| lower.contains(&term.to_lowercase()))
}
