//! Integration tests for the guestbook submission pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use guestbook_guard::db::{self, Database, EntryStatus, GuestbookConfig, NewEntry};
use guestbook_guard::moderation::captcha::{CaptchaOutcome, CaptchaVerifier};
use guestbook_guard::moderation::classifier::{Classification, ContentClassifier};
use guestbook_guard::moderation::{
    Disposition, ModerationPipeline, RejectReason, SubmissionForm,
};
use guestbook_guard::rate_limit::RateLimiter;
use tempfile::TempDir;

// ========== Test doubles ==========

struct PassingCaptcha;

#[async_trait]
impl CaptchaVerifier for PassingCaptcha {
    async fn verify(&self, _token: &str, _remote_ip: Option<&str>) -> CaptchaOutcome {
        CaptchaOutcome {
            ok: true,
            reason: None,
        }
    }
}

struct FailingCaptcha;

#[async_trait]
impl CaptchaVerifier for FailingCaptcha {
    async fn verify(&self, _token: &str, _remote_ip: Option<&str>) -> CaptchaOutcome {
        CaptchaOutcome {
            ok: false,
            reason: Some("invalid-input-response".to_string()),
        }
    }
}

struct CleanClassifier;

#[async_trait]
impl ContentClassifier for CleanClassifier {
    async fn classify(&self, _text: &str) -> Classification {
        Classification {
            available: true,
            flagged: false,
        }
    }
}

struct FlaggingClassifier;

#[async_trait]
impl ContentClassifier for FlaggingClassifier {
    async fn classify(&self, _text: &str) -> Classification {
        Classification {
            available: true,
            flagged: true,
        }
    }
}

struct UnavailableClassifier;

#[async_trait]
impl ContentClassifier for UnavailableClassifier {
    async fn classify(&self, _text: &str) -> Classification {
        Classification {
            available: false,
            flagged: false,
        }
    }
}

// ========== Helpers ==========

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn pipeline(
    captcha: impl CaptchaVerifier + 'static,
    classifier: impl ContentClassifier + 'static,
) -> ModerationPipeline {
    ModerationPipeline::new(
        Arc::new(RateLimiter::new()),
        Arc::new(captcha),
        Arc::new(classifier),
    )
}

fn valid_form() -> SubmissionForm {
    SubmissionForm {
        name: "Alice".to_string(),
        website: String::new(),
        referred_by: "a friend".to_string(),
        from_location: "Minneapolis".to_string(),
        comments: "Lovely site, brings back memories.".to_string(),
        honeypot: String::new(),
        captcha_token: "token".to_string(),
    }
}

// ========== Tests ==========

#[tokio::test]
async fn test_clean_submission_is_approved_with_record_one() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("1.2.3.4"))
        .await
        .unwrap();

    assert_eq!(
        disposition,
        Disposition::Accepted {
            record: 1,
            status: EntryStatus::Approved
        }
    );

    let entries = db::list_entries_desc(db.pool(), 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record, 1);
    assert_eq!(entries[0].status, "approved");
    assert!(!entries[0].flagged);
}

#[tokio::test]
async fn test_record_numbers_increment_from_max() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    // Pre-existing entry with a high record number.
    let seed = NewEntry {
        record: 41,
        name: "Seed".to_string(),
        website: String::new(),
        referred_by: String::new(),
        from_location: String::new(),
        comments: "first".to_string(),
        private_message: false,
        flagged: false,
        status: EntryStatus::Approved,
    };
    db::insert_entry(db.pool(), &seed).await.unwrap();

    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("1.2.3.4"))
        .await
        .unwrap();

    assert!(matches!(
        disposition,
        Disposition::Accepted { record: 42, .. }
    ));
}

#[tokio::test]
async fn test_next_record_number_defaults_to_one() {
    let (db, _tmp) = setup_db().await;
    assert_eq!(db::next_record_number(db.pool()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_too_many_links_routes_to_review() {
    let (db, _tmp) = setup_db().await;
    // CAPTCHA and classification both pass clean; links alone trip review.
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    let mut form = valid_form();
    form.comments =
        "see https://a.example https://b.example and https://c.example".to_string();

    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.4"))
        .await
        .unwrap();

    assert_eq!(
        disposition,
        Disposition::Accepted {
            record: 1,
            status: EntryStatus::Pending
        }
    );

    let entries = db::list_entries_desc(db.pool(), 10).await.unwrap();
    assert!(entries[0].flagged);
}

#[tokio::test]
async fn test_honeypot_discards_without_storing() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    let mut form = valid_form();
    form.honeypot = "Acme Corp".to_string();

    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.4"))
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Discarded);
    assert!(db::list_entries_desc(db.pool(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_banned_term_rejects_without_storing() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    let config = GuestbookConfig {
        banned_terms: vec!["casino".to_string()],
        ..GuestbookConfig::default()
    };
    db::update_config(db.pool(), &config).await.unwrap();

    let mut form = valid_form();
    form.comments = "Visit my CASINO for prizes".to_string();

    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.4"))
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Rejected(RejectReason::Banned));
    assert!(db::list_entries_desc(db.pool(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_banned_term_matches_any_field() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    let config = GuestbookConfig {
        banned_terms: vec!["spamword".to_string()],
        ..GuestbookConfig::default()
    };
    db::update_config(db.pool(), &config).await.unwrap();

    // The term hides inside the referred-by field, embedded in a longer word.
    let mut form = valid_form();
    form.referred_by = "SuperSpamWordsmith".to_string();

    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.4"))
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Rejected(RejectReason::Banned));
}

#[tokio::test]
async fn test_missing_required_fields() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    let mut form = valid_form();
    form.name = "   ".to_string();
    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        Disposition::Rejected(RejectReason::ValidationFailed)
    );

    let mut form = valid_form();
    form.comments = String::new();
    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.5"))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        Disposition::Rejected(RejectReason::ValidationFailed)
    );
}

#[tokio::test]
async fn test_oversized_fields_fail_validation() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    // Default max_field_length is 120.
    let mut form = valid_form();
    form.name = "x".repeat(121);
    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        Disposition::Rejected(RejectReason::ValidationFailed)
    );

    // Default max_comment_length is 800.
    let mut form = valid_form();
    form.comments = "y".repeat(801);
    let disposition = pipeline
        .evaluate(&db, &form, Some("1.2.3.5"))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        Disposition::Rejected(RejectReason::ValidationFailed)
    );
}

#[tokio::test]
async fn test_captcha_failure_rejects() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(FailingCaptcha, CleanClassifier);

    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("1.2.3.4"))
        .await
        .unwrap();

    assert_eq!(
        disposition,
        Disposition::Rejected(RejectReason::CaptchaFailed)
    );
    assert!(db::list_entries_desc(db.pool(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_flagged_content_routes_to_review() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, FlaggingClassifier);

    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("1.2.3.4"))
        .await
        .unwrap();

    assert!(matches!(
        disposition,
        Disposition::Accepted {
            status: EntryStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unavailable_classifier_routes_to_review() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, UnavailableClassifier);

    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("1.2.3.4"))
        .await
        .unwrap();

    // Unreachable classifier is a risk signal, not a pass.
    assert!(matches!(
        disposition,
        Disposition::Accepted {
            status: EntryStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_require_moderation_override() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    let config = GuestbookConfig {
        require_moderation: true,
        ..GuestbookConfig::default()
    };
    db::update_config(db.pool(), &config).await.unwrap();

    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("1.2.3.4"))
        .await
        .unwrap();

    assert!(matches!(
        disposition,
        Disposition::Accepted {
            status: EntryStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_submission_rate_limit() {
    let (db, _tmp) = setup_db().await;
    let pipeline = pipeline(PassingCaptcha, CleanClassifier);

    for _ in 0..5 {
        let disposition = pipeline
            .evaluate(&db, &valid_form(), Some("7.7.7.7"))
            .await
            .unwrap();
        assert!(matches!(disposition, Disposition::Accepted { .. }));
    }

    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("7.7.7.7"))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        Disposition::Rejected(RejectReason::TooManyRequests)
    );

    // A different caller is unaffected.
    let disposition = pipeline
        .evaluate(&db, &valid_form(), Some("8.8.8.8"))
        .await
        .unwrap();
    assert!(matches!(disposition, Disposition::Accepted { .. }));
}
