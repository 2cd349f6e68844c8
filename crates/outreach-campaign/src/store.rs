//! Durable contact store — file-based persistence, sole owner of every
//! delivery-state transition.
//!
//! Contacts and stats are saved as pretty-printed JSON, written through on
//! every mutation. A crash between operations loses at most the in-flight
//! operation, never previously committed state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use outreach_core::config::SendingLimits;

use crate::contact::{self, Contact, ContactStatus};
use crate::stats::SendingStats;

/// Why a contact could not be added.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddError {
    #[error("contact limit reached: {0}")]
    CapacityExceeded(usize),
    #[error("invalid phone number: {0}")]
    InvalidFormat(String),
    #[error("number {0} already exists")]
    Duplicate(String),
}

/// Result of a bulk line import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: usize,
    pub errors: Vec<String>,
}

/// Per-status contact counts for reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCounts {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub blocked: usize,
    pub invalid: usize,
}

/// The contact collection plus its stats ledger.
///
/// Insertion order is send order; a phone-keyed index makes duplicate checks
/// and outcome lookups O(1). The store is the only code that mutates contact
/// status.
pub struct ContactStore {
    dir: PathBuf,
    contacts: Vec<Contact>,
    /// Normalized phone -> position in `contacts`.
    index: HashMap<String, usize>,
    stats: SendingStats,
    limits: SendingLimits,
}

impl ContactStore {
    /// Open (or create) the store under the given data directory.
    pub fn open(dir: &Path, limits: SendingLimits) -> Self {
        std::fs::create_dir_all(dir).ok();

        let contacts = load_json::<Vec<Contact>>(&dir.join("contacts.json")).unwrap_or_default();
        let mut stats =
            load_json::<SendingStats>(&dir.join("stats.json")).unwrap_or_else(SendingStats::new);

        let index = build_index(&contacts);
        let rolled = stats.roll_over_if_new_day();

        let store = Self { dir: dir.to_path_buf(), contacts, index, stats, limits };
        if rolled {
            store.save_stats();
        }
        if !store.contacts.is_empty() {
            tracing::info!("📱 Loaded {} contacts", store.contacts.len());
        }
        store
    }

    // ─── Mutations ────────────────────────────────────────

    /// Add one contact. The phone is normalized before validation, so every
    /// spelling of the same number collides with the first.
    pub fn add(
        &mut self,
        raw_phone: &str,
        name: Option<String>,
        source: Option<String>,
    ) -> Result<&Contact, AddError> {
        if self.contacts.len() >= self.limits.max_contacts {
            return Err(AddError::CapacityExceeded(self.limits.max_contacts));
        }

        let phone = contact::normalize_phone(raw_phone);
        if !contact::is_valid_phone(&phone) {
            return Err(AddError::InvalidFormat(raw_phone.trim().to_string()));
        }
        if self.index.contains_key(&phone) {
            return Err(AddError::Duplicate(phone));
        }

        let pos = self.contacts.len();
        let c = Contact::new(phone.clone(), name, source);
        self.index.insert(phone, pos);
        self.contacts.push(c);
        self.save_contacts();

        Ok(&self.contacts[pos])
    }

    /// Import `phone[,name]` / `phone;name` lines. Blank lines are skipped;
    /// per-line failures are collected without aborting the batch.
    pub fn import_lines<'a, I>(&mut self, lines: I, source: Option<&str>) -> ImportReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = ImportReport::default();

        for (i, line) in lines.into_iter().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (phone, name) = match line.split_once([',', ';']) {
                Some((p, n)) => {
                    let n = n.trim();
                    (p.trim(), if n.is_empty() { None } else { Some(n.to_string()) })
                }
                None => (line, None),
            };

            match self.add(phone, name, source.map(String::from)) {
                Ok(_) => report.added += 1,
                Err(e) => report.errors.push(format!("line {}: {e}", i + 1)),
            }
        }

        if report.added > 0 || !report.errors.is_empty() {
            tracing::info!(
                "📁 Import from {}: added {}, errors {}",
                source.unwrap_or("(inline)"),
                report.added,
                report.errors.len()
            );
        }
        report
    }

    /// Record the outcome of one send attempt.
    ///
    /// Success promotes to `Active` and bumps the daily/total counters; a
    /// third failed attempt demotes to `Blocked`. Either way the contact now
    /// carries a `last_sent` marker and is excluded from resume-mode
    /// eligibility.
    pub fn record_outcome(&mut self, phone: &str, success: bool) {
        self.stats.roll_over_if_new_day();

        if let Some(&pos) = self.index.get(phone) {
            let c = &mut self.contacts[pos];
            c.last_sent = Some(Utc::now());
            c.sent_count += 1;

            if success {
                c.status = ContactStatus::Active;
                self.stats.record_sent();
            } else if c.sent_count >= 3 {
                // Three strikes: repeated failures mean an unreachable
                // recipient, not a transient error.
                c.status = ContactStatus::Blocked;
            }
        }

        self.stats.last_batch_time = Some(Utc::now());
        self.save_contacts();
        self.save_stats();
    }

    /// Mark one contact as structurally invalid.
    pub fn mark_invalid(&mut self, phone: &str) {
        if let Some(&pos) = self.index.get(phone) {
            self.contacts[pos].status = ContactStatus::Invalid;
            self.save_contacts();
        }
    }

    /// Remove every contact with the given status. Returns the removed count.
    pub fn prune_by_status(&mut self, status: ContactStatus) -> usize {
        let before = self.contacts.len();
        self.contacts.retain(|c| c.status != status);
        let removed = before - self.contacts.len();

        if removed > 0 {
            self.index = build_index(&self.contacts);
            self.save_contacts();
            tracing::info!("🧹 Removed {removed} {status:?} contacts");
        }
        removed
    }

    /// Remove every contact. Returns the removed count.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.contacts.len();
        self.contacts.clear();
        self.index.clear();
        self.save_contacts();
        removed
    }

    /// Clear `last_sent`/`sent_count` on every contact for a fresh campaign
    /// pass. Returns how many contacts were reset.
    pub fn reset_sent_markers(&mut self) -> usize {
        let mut reset = 0;
        for c in &mut self.contacts {
            if c.last_sent.is_some() || c.sent_count > 0 {
                c.last_sent = None;
                c.sent_count = 0;
                reset += 1;
            }
        }
        if reset > 0 {
            self.save_contacts();
        }
        reset
    }

    /// Administrative override: zero today's counter.
    pub fn reset_daily_counter(&mut self) {
        self.stats.sent_today = 0;
        self.save_stats();
    }

    /// Administrative override: force today's counter to a specific value.
    pub fn set_daily_counter(&mut self, value: u32) {
        self.stats.sent_today = value;
        self.save_stats();
    }

    /// Apply the lazy daily rollover; persists when the day changed.
    pub fn roll_over_day(&mut self) {
        if self.stats.roll_over_if_new_day() {
            self.save_stats();
        }
    }

    // ─── Queries ──────────────────────────────────────────

    /// Contacts eligible for a manual send: pending or active, in store
    /// order, truncated to `min(limit, batch cap)`.
    pub fn eligible(&self, limit: Option<usize>) -> Vec<Contact> {
        let cap = limit.unwrap_or(self.limits.batch_size).min(self.limits.batch_size);
        self.contacts
            .iter()
            .filter(|c| sendable(c))
            .take(cap)
            .cloned()
            .collect()
    }

    /// Resume-mode eligibility: pending or active AND never attempted in the
    /// current campaign cycle (`last_sent` unset). Used by the automatic
    /// campaign so stop/restart never re-sends.
    pub fn eligible_unsent(&self, limit: usize) -> Vec<Contact> {
        self.contacts
            .iter()
            .filter(|c| sendable(c) && c.last_sent.is_none())
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, phone: &str) -> Option<&Contact> {
        self.index.get(phone).map(|&pos| &self.contacts[pos])
    }

    pub fn all(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts { total: self.contacts.len(), ..Default::default() };
        for c in &self.contacts {
            match c.status {
                ContactStatus::Active => counts.active += 1,
                ContactStatus::Pending => counts.pending += 1,
                ContactStatus::Blocked => counts.blocked += 1,
                ContactStatus::Invalid => counts.invalid += 1,
            }
        }
        counts
    }

    pub fn stats(&self) -> &SendingStats {
        &self.stats
    }

    pub fn limits(&self) -> &SendingLimits {
        &self.limits
    }

    // ─── Persistence ──────────────────────────────────────

    fn save_contacts(&self) {
        save_json(&self.dir.join("contacts.json"), &self.contacts);
    }

    fn save_stats(&self) {
        save_json(&self.dir.join("stats.json"), &self.stats);
    }
}

fn sendable(c: &Contact) -> bool {
    matches!(c.status, ContactStatus::Pending | ContactStatus::Active)
}

fn build_index(contacts: &[Contact]) -> HashMap<String, usize> {
    contacts
        .iter()
        .enumerate()
        .map(|(i, c)| (c.phone.clone(), i))
        .collect()
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(json) => match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("⚠️ Failed to parse {}: {e}", path.display());
                None
            }
        },
        Err(e) => {
            tracing::warn!("⚠️ Failed to read {}: {e}", path.display());
            None
        }
    }
}

/// Write-through save. Disk errors are logged, not propagated: in-memory
/// state stays authoritative for the rest of the session.
fn save_json<T: serde::Serialize>(path: &Path, value: &T) {
    let result = serde_json::to_string_pretty(value)
        .map_err(|e| format!("serialize error: {e}"))
        .and_then(|json| {
            std::fs::write(path, json).map_err(|e| format!("write error: {e}"))
        });
    if let Err(e) = result {
        tracing::warn!("⚠️ Failed to save {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(name: &str) -> (ContactStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("outreach-test-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        let store = ContactStore::open(&dir, SendingLimits::default());
        (store, dir)
    }

    #[test]
    fn test_add_and_duplicate() {
        let (mut store, dir) = test_store("add-dup");

        store.add("+77012345678", Some("Acme".into()), None).unwrap();
        // Every spelling normalizing to the same number is a duplicate
        for raw in ["+7 (701) 234-56-78", "87012345678", "77012345678"] {
            assert_eq!(
                store.add(raw, None, None),
                Err(AddError::Duplicate("+77012345678".into()))
            );
        }
        assert_eq!(store.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_add_invalid_format() {
        let (mut store, dir) = test_store("add-invalid");
        assert!(matches!(store.add("12345", None, None), Err(AddError::InvalidFormat(_))));
        assert!(store.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_capacity_limit() {
        let dir = std::env::temp_dir().join("outreach-test-capacity");
        std::fs::remove_dir_all(&dir).ok();
        let limits = SendingLimits { max_contacts: 2, ..SendingLimits::default() };
        let mut store = ContactStore::open(&dir, limits);

        store.add("+77012345601", None, None).unwrap();
        store.add("+77012345602", None, None).unwrap();
        assert_eq!(store.add("+77012345603", None, None), Err(AddError::CapacityExceeded(2)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_import_lines() {
        let (mut store, dir) = test_store("import");

        let lines = "
+77012345601,Acme
+77012345602;Globex Corp
not-a-number

+77012345601,Duplicate Of First
"
        .lines();

        let report = store.import_lines(lines, Some("numbers.txt"));
        assert_eq!(report.added, 2);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(store.get("+77012345602").unwrap().name.as_deref(), Some("Globex Corp"));
        assert_eq!(store.get("+77012345601").unwrap().source.as_deref(), Some("numbers.txt"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_record_outcome_success() {
        let (mut store, dir) = test_store("outcome-ok");
        store.add("+77012345678", None, None).unwrap();

        store.record_outcome("+77012345678", true);

        let c = store.get("+77012345678").unwrap();
        assert_eq!(c.status, ContactStatus::Active);
        assert_eq!(c.sent_count, 1);
        assert!(c.last_sent.is_some());
        assert_eq!(store.stats().sent_today, 1);
        assert_eq!(store.stats().total_sent, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_three_strikes_blocks() {
        let (mut store, dir) = test_store("strikes");
        store.add("+77012345678", None, None).unwrap();

        store.record_outcome("+77012345678", false);
        store.record_outcome("+77012345678", false);
        assert_eq!(store.get("+77012345678").unwrap().status, ContactStatus::Pending);

        store.record_outcome("+77012345678", false);
        assert_eq!(store.get("+77012345678").unwrap().status, ContactStatus::Blocked);
        // Blocked contacts drop out of eligibility
        assert!(store.eligible(None).is_empty());
        // Failures never touch the success counters
        assert_eq!(store.stats().sent_today, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_eligible_respects_batch_cap() {
        let dir = std::env::temp_dir().join("outreach-test-cap");
        std::fs::remove_dir_all(&dir).ok();
        let limits = SendingLimits { batch_size: 3, ..SendingLimits::default() };
        let mut store = ContactStore::open(&dir, limits);
        for i in 0..5 {
            store.add(&format!("+7701234560{i}"), None, None).unwrap();
        }

        assert_eq!(store.eligible(None).len(), 3);
        assert_eq!(store.eligible(Some(2)).len(), 2);
        // Requests above the cap are clamped to it
        assert_eq!(store.eligible(Some(100)).len(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_eligible_unsent_skips_attempted() {
        let (mut store, dir) = test_store("unsent");
        store.add("+77012345601", None, None).unwrap();
        store.add("+77012345602", None, None).unwrap();
        store.record_outcome("+77012345601", true);

        let unsent = store.eligible_unsent(usize::MAX);
        assert_eq!(unsent.len(), 1);
        assert_eq!(unsent[0].phone, "+77012345602");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reset_sent_markers_restores_eligibility() {
        let (mut store, dir) = test_store("reset");
        store.add("+77012345601", None, None).unwrap();
        store.add("+77012345602", None, None).unwrap();
        store.record_outcome("+77012345601", true);
        store.record_outcome("+77012345602", true);
        assert!(store.eligible_unsent(usize::MAX).is_empty());

        let reset = store.reset_sent_markers();
        assert_eq!(reset, 2);
        // The full active/pending set is eligible again
        assert_eq!(store.eligible_unsent(usize::MAX).len(), 2);
        assert_eq!(store.get("+77012345601").unwrap().sent_count, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_prune_and_clear() {
        let (mut store, dir) = test_store("prune");
        store.add("+77012345601", None, None).unwrap();
        store.add("+77012345602", None, None).unwrap();
        store.add("+77012345603", None, None).unwrap();
        store.mark_invalid("+77012345602");

        assert_eq!(store.prune_by_status(ContactStatus::Invalid), 1);
        assert_eq!(store.len(), 2);
        // Index is rebuilt after a prune
        assert!(store.get("+77012345603").is_some());
        assert_eq!(store.clear_all(), 2);
        assert!(store.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = std::env::temp_dir().join("outreach-test-roundtrip");
        std::fs::remove_dir_all(&dir).ok();

        {
            let mut store = ContactStore::open(&dir, SendingLimits::default());
            store.add("+77012345601", Some("Acme".into()), Some("list.txt".into())).unwrap();
            store.add("+77012345602", None, None).unwrap();
            store.record_outcome("+77012345601", true);
            store.record_outcome("+77012345602", false);
        }

        let reloaded = ContactStore::open(&dir, SendingLimits::default());
        assert_eq!(reloaded.len(), 2);
        let a = reloaded.get("+77012345601").unwrap();
        assert_eq!(a.status, ContactStatus::Active);
        assert_eq!(a.name.as_deref(), Some("Acme"));
        assert_eq!(a.sent_count, 1);
        assert!(a.last_sent.is_some());
        let b = reloaded.get("+77012345602").unwrap();
        assert_eq!(b.status, ContactStatus::Pending);
        assert_eq!(reloaded.stats().sent_today, 1);
        assert_eq!(reloaded.stats().total_sent, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_counter_overrides() {
        let (mut store, dir) = test_store("counters");
        store.set_daily_counter(42);
        assert_eq!(store.stats().sent_today, 42);
        store.reset_daily_counter();
        assert_eq!(store.stats().sent_today, 0);
        std::fs::remove_dir_all(&dir).ok();
    }
}
