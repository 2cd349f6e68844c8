//! Contact records — the core data model for outbound delivery state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of a contact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    /// Imported, never successfully reached.
    Pending,
    /// At least one successful send.
    Active,
    /// Failed the format or existence check.
    Invalid,
    /// Three failed send attempts — excluded from future sends.
    Blocked,
}

/// A phone-addressable recipient with delivery status and history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    /// Canonical `+`-prefixed phone number — unique key in the store.
    pub phone: String,
    /// Organization/display name used for personalization.
    pub name: Option<String>,
    /// Provenance tag, e.g. the import file the contact came from.
    pub source: Option<String>,
    pub added_at: DateTime<Utc>,
    /// Set on every send attempt. A contact carrying this marker is skipped
    /// by resume-mode eligibility until an explicit reset.
    pub last_sent: Option<DateTime<Utc>>,
    pub status: ContactStatus,
    /// Send attempts against this contact, success or failure.
    pub sent_count: u32,
}

impl Contact {
    pub fn new(phone: String, name: Option<String>, source: Option<String>) -> Self {
        Self {
            phone,
            name,
            source,
            added_at: Utc::now(),
            last_sent: None,
            status: ContactStatus::Pending,
            sent_count: 0,
        }
    }
}

/// Normalize a raw phone string into canonical `+`-prefixed form.
///
/// Strips everything except digits and `+`; a leading national trunk `8` is
/// rewritten to the `+7` country code; otherwise bare digits get a `+`.
pub fn normalize_phone(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();

    if let Some(rest) = cleaned.strip_prefix('8') {
        format!("+7{rest}")
    } else if !cleaned.starts_with('+') {
        format!("+{cleaned}")
    } else {
        cleaned
    }
}

/// Structural check: `+` followed by 10–15 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    match phone.strip_prefix('+') {
        Some(digits) => {
            (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Country-aware mobile heuristic — rejects landline-length numbers.
///
/// Kazakh (`77...`) and Russian (`79...`) mobiles are exactly 11 digits;
/// everything else passes at 10–15 digits. Format only, not carrier lookup.
pub fn is_valid_mobile(phone: &str) -> bool {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("77") || digits.starts_with("79") {
        digits.len() == 11
    } else {
        (10..=15).contains(&digits.len())
    }
}
