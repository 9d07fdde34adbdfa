use serde::{Deserialize, Serialize};

/// Review state of a guestbook entry.
///
/// Lifecycle: `pending -> approved | rejected` via explicit admin action, or
/// `approved` directly at creation when moderation found no risk signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
}

impl EntryStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A stored guestbook entry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GuestbookEntry {
    pub id: i64,
    /// Monotonic display number, assigned as max existing + 1.
    pub record: i64,
    pub name: String,
    pub website: String,
    pub referred_by: String,
    pub from_location: String,
    pub comments: String,
    pub private_message: bool,
    pub flagged: bool,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a new entry, produced by the moderation pipeline.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub record: i64,
    pub name: String,
    pub website: String,
    pub referred_by: String,
    pub from_location: String,
    pub comments: String,
    pub private_message: bool,
    pub flagged: bool,
    pub status: EntryStatus,
}

/// Editable fields of an existing entry (admin `update` action).
#[derive(Debug, Clone)]
pub struct EntryPatch {
    pub name: String,
    pub website: String,
    pub referred_by: String,
    pub from_location: String,
    pub comments: String,
    pub private_message: bool,
}

/// Moderation policy, stored as a singleton row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestbookConfig {
    pub max_links: i64,
    pub max_comment_length: i64,
    pub max_field_length: i64,
    /// Ordered list, matched case-insensitively as substrings.
    pub banned_terms: Vec<String>,
    /// Global override: route every submission to review.
    pub require_moderation: bool,
}

impl Default for GuestbookConfig {
    fn default() -> Self {
        Self {
            max_links: 2,
            max_comment_length: 800,
            max_field_length: 120,
            banned_terms: Vec::new(),
            require_moderation: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_status_roundtrip() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Approved,
            EntryStatus::Rejected,
        ] {
            assert_eq!(EntryStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(EntryStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_default_config() {
        let config = GuestbookConfig::default();
        assert_eq!(config.max_links, 2);
        assert_eq!(config.max_comment_length, 800);
        assert_eq!(config.max_field_length, 120);
        assert!(config.banned_terms.is_empty());
        assert!(!config.require_moderation);
    }
}
