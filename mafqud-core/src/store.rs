use crate::report::{Gender, Match, MatchStatus, PairKey, Report, ReportId, ReportKind};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Report not found: {0}")]
    ReportNotFound(ReportId),
    #[error("Match not found: {0}")]
    MatchNotFound(Uuid),
    #[error("Persistence conflict: {0}")]
    Conflict(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Read-only access to reports. Reports are owned and mutated by an external
/// system; this crate never creates or changes one.
pub trait ReportStore: Send + Sync {
    /// Active reports of the given kind that are gender-compatible with
    /// `gender`: equal genders pass, and an unknown gender on either side
    /// never excludes a candidate. At most `limit` reports are returned;
    /// ordering is the store's choice.
    fn find_active_candidates(
        &self,
        kind: ReportKind,
        gender: Gender,
        limit: usize,
    ) -> Result<Vec<Report>, StoreError>;

    fn get(&self, id: ReportId) -> Result<Option<Report>, StoreError>;

    /// All active reports, capped at `limit`. Used by the rescan driver.
    fn list_active(&self, limit: usize) -> Result<Vec<Report>, StoreError>;
}

/// Persistence for match rows, keyed by the unordered report pair.
pub trait MatchStore: Send + Sync {
    /// Atomic insert-if-absent, else update score. The unordered pair
    /// (new, old) is the key, so two concurrent writers can never produce
    /// two rows for the same pair. An existing row keeps its status,
    /// orientation and creation time; only the score is refreshed.
    /// Returns the row and whether it was newly created.
    fn upsert_pending(
        &self,
        report_new_id: ReportId,
        report_old_id: ReportId,
        score: u8,
    ) -> Result<(Match, bool), StoreError>;

    /// Record which side of the match received the notification
    fn mark_notified(&self, id: Uuid, notified: ReportId) -> Result<(), StoreError>;

    /// All matches touching the given report. Used by rescan and admin
    /// tooling, not by the matching algorithm itself.
    fn list_for_report(&self, id: ReportId) -> Result<Vec<Match>, StoreError>;
}

/// True when two genders are compatible for candidate selection
pub fn gender_compatible(a: Gender, b: Gender) -> bool {
    a == Gender::Unknown || b == Gender::Unknown || a == b
}

/// In-memory report store for tests and the CLI fixture loader
#[derive(Default)]
pub struct InMemoryReportStore {
    reports: RwLock<Vec<Report>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reports(reports: Vec<Report>) -> Self {
        Self {
            reports: RwLock::new(reports),
        }
    }

    pub fn insert(&self, report: Report) {
        self.reports
            .write()
            .expect("report store lock poisoned")
            .push(report);
    }
}

impl ReportStore for InMemoryReportStore {
    fn find_active_candidates(
        &self,
        kind: ReportKind,
        gender: Gender,
        limit: usize,
    ) -> Result<Vec<Report>, StoreError> {
        let reports = self.reports.read().expect("report store lock poisoned");
        Ok(reports
            .iter()
            .filter(|r| r.kind == kind && r.is_active() && gender_compatible(r.gender, gender))
            .take(limit)
            .cloned()
            .collect())
    }

    fn get(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        let reports = self.reports.read().expect("report store lock poisoned");
        Ok(reports.iter().find(|r| r.id == id).cloned())
    }

    fn list_active(&self, limit: usize) -> Result<Vec<Report>, StoreError> {
        let reports = self.reports.read().expect("report store lock poisoned");
        Ok(reports
            .iter()
            .filter(|r| r.is_active())
            .take(limit)
            .cloned()
            .collect())
    }
}

/// In-memory match store. The single mutex makes each upsert atomic with
/// respect to the pair key, matching the contract a SQL backend would meet
/// with a unique constraint on the normalized pair.
#[derive(Default)]
pub struct InMemoryMatchStore {
    matches: Mutex<HashMap<PairKey, Match>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.matches.lock().expect("match store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_pair(&self, a: ReportId, b: ReportId) -> Option<Match> {
        let matches = self.matches.lock().expect("match store lock poisoned");
        matches.get(&PairKey::new(a, b)).cloned()
    }
}

impl MatchStore for InMemoryMatchStore {
    fn upsert_pending(
        &self,
        report_new_id: ReportId,
        report_old_id: ReportId,
        score: u8,
    ) -> Result<(Match, bool), StoreError> {
        let mut matches = self.matches.lock().expect("match store lock poisoned");
        let key = PairKey::new(report_new_id, report_old_id);

        if let Some(existing) = matches.get_mut(&key) {
            existing.similarity_score = score;
            return Ok((existing.clone(), false));
        }

        let row = Match {
            id: Uuid::new_v4(),
            report_new_id,
            report_old_id,
            similarity_score: score,
            status: MatchStatus::Pending,
            notified_report_id: None,
            created_at: Utc::now(),
            rejected_at: None,
            rejected_by: None,
        };
        matches.insert(key, row.clone());
        Ok((row, true))
    }

    fn mark_notified(&self, id: Uuid, notified: ReportId) -> Result<(), StoreError> {
        let mut matches = self.matches.lock().expect("match store lock poisoned");
        let row = matches
            .values_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::MatchNotFound(id))?;
        row.notified_report_id = Some(notified);
        Ok(())
    }

    fn list_for_report(&self, id: ReportId) -> Result<Vec<Match>, StoreError> {
        let matches = self.matches.lock().expect("match store lock poisoned");
        Ok(matches
            .values()
            .filter(|m| m.pair_key().contains(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportStatus;

    fn report(kind: ReportKind, status: ReportStatus, gender: Gender) -> Report {
        Report {
            id: Uuid::new_v4(),
            kind,
            status,
            name: "test".to_string(),
            age: None,
            gender,
            location: None,
            images: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_gender_compatibility() {
        assert!(gender_compatible(Gender::Male, Gender::Male));
        assert!(!gender_compatible(Gender::Male, Gender::Female));
        assert!(gender_compatible(Gender::Unknown, Gender::Female));
        assert!(gender_compatible(Gender::Male, Gender::Unknown));
        assert!(gender_compatible(Gender::Unknown, Gender::Unknown));
    }

    #[test]
    fn test_candidate_filtering() {
        let store = InMemoryReportStore::new();
        store.insert(report(ReportKind::Found, ReportStatus::Active, Gender::Male));
        store.insert(report(ReportKind::Found, ReportStatus::Resolved, Gender::Male));
        store.insert(report(ReportKind::Found, ReportStatus::Active, Gender::Female));
        store.insert(report(ReportKind::Found, ReportStatus::Active, Gender::Unknown));
        store.insert(report(ReportKind::Lost, ReportStatus::Active, Gender::Male));

        let found = store
            .find_active_candidates(ReportKind::Found, Gender::Male, 100)
            .unwrap();
        // Male and Unknown pass; Female and non-active excluded
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.kind == ReportKind::Found && r.is_active()));
    }

    #[test]
    fn test_candidate_cap() {
        let store = InMemoryReportStore::new();
        for _ in 0..10 {
            store.insert(report(ReportKind::Found, ReportStatus::Active, Gender::Male));
        }
        let found = store
            .find_active_candidates(ReportKind::Found, Gender::Male, 3)
            .unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let store = InMemoryMatchStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (row, created) = store.upsert_pending(a, b, 70).unwrap();
        assert!(created);
        assert_eq!(row.similarity_score, 70);
        assert_eq!(row.status, MatchStatus::Pending);

        // Rescan from the other side: same pair, refreshed score, same row
        let (updated, created) = store.upsert_pending(b, a, 75).unwrap();
        assert!(!created);
        assert_eq!(updated.id, row.id);
        assert_eq!(updated.similarity_score, 75);
        assert_eq!(updated.status, MatchStatus::Pending);
        assert_eq!(updated.report_new_id, a);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_upserts_keep_one_row() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryMatchStore::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let (new_id, old_id) = if i % 2 == 0 { (a, b) } else { (b, a) };
                    store.upsert_pending(new_id, old_id, 50 + i as u8).unwrap()
                })
            })
            .collect();

        let created_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|(_, created)| *created)
            .count();

        assert_eq!(created_count, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_list_for_report() {
        let store = InMemoryMatchStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        store.upsert_pending(a, b, 60).unwrap();
        store.upsert_pending(a, c, 50).unwrap();
        store.upsert_pending(b, c, 45).unwrap();

        assert_eq!(store.list_for_report(a).unwrap().len(), 2);
        assert_eq!(store.list_for_report(Uuid::new_v4()).unwrap().len(), 0);
    }

    #[test]
    fn test_mark_notified() {
        let store = InMemoryMatchStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (row, _) = store.upsert_pending(a, b, 80).unwrap();

        store.mark_notified(row.id, b).unwrap();
        assert_eq!(store.get_pair(a, b).unwrap().notified_report_id, Some(b));
    }
}
