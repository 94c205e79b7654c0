use crate::config::{ConfigError, MatchSettings};
use crate::face::FaceResolver;
use crate::notify::{NotificationDispatcher, ReportSummary};
use crate::report::{Match, Report, ReportId};
use crate::score::{metadata_score, total_score};
use crate::store::{MatchStore, ReportStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error("Report store unreachable: {0}")]
    Store(#[from] StoreError),
}

/// Why a candidate above the display threshold was not persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Cut by the max-matches-per-report cap
    Capped,
    /// Candidate disappeared from the report store mid-run
    Vanished,
    /// Candidate was deactivated mid-run
    Deactivated,
}

/// Per-candidate result of one matching run
#[derive(Debug)]
pub enum Outcome {
    Matched {
        row: Match,
        created: bool,
        notified: bool,
    },
    BelowThreshold,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug)]
pub struct CandidateOutcome {
    pub candidate_id: ReportId,
    pub score: u8,
    pub outcome: Outcome,
}

/// Result of one matching run. Partial success is normal: some candidates
/// may have failed or been skipped while others produced matches.
#[derive(Debug, Default)]
pub struct MatchRun {
    pub outcomes: Vec<CandidateOutcome>,
}

impl MatchRun {
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Matched { row, .. } => Some(row),
            _ => None,
        })
    }

    pub fn created_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Matched { created: true, .. }))
            .count()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RescanStats {
    pub reports_scanned: usize,
    pub matches_created: usize,
    pub failures: usize,
}

/// Orchestrates candidate selection, concurrent scoring, threshold and cap
/// handling, exactly-once match persistence and one-way notification.
pub struct MatchEngine {
    reports: Arc<dyn ReportStore>,
    matches: Arc<dyn MatchStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    faces: Option<FaceResolver>,
}

impl MatchEngine {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        matches: Arc<dyn MatchStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        faces: Option<FaceResolver>,
    ) -> Self {
        Self {
            reports,
            matches,
            dispatcher,
            faces,
        }
    }

    /// Run matching for one report against all eligible counterpart reports.
    ///
    /// Settings are a per-run snapshot: they are validated once here and
    /// never re-read mid-batch. A missing or inactive triggering report
    /// yields an empty run, not an error; only an unreachable report store
    /// fails the run as a whole.
    pub fn run_for_report(
        &self,
        report_id: ReportId,
        settings: &MatchSettings,
    ) -> Result<MatchRun, EngineError> {
        settings.validate()?;

        let report = match self.reports.get(report_id)? {
            Some(r) => r,
            None => {
                log::warn!("Report not found, skipping run: {}", report_id);
                return Ok(MatchRun::default());
            }
        };

        if !report.is_active() {
            log::debug!("Report {} is not active, skipping run", report_id);
            return Ok(MatchRun::default());
        }

        let candidates = self.reports.find_active_candidates(
            report.kind.opposite(),
            report.gender,
            settings.max_candidates_scanned,
        )?;
        log::debug!(
            "Scanning {} candidates for report {}",
            candidates.len(),
            report_id
        );

        let mut scored = self.score_candidates(&report, candidates, settings);

        // Highest score first; ties go to the most recently created
        // candidate, favoring users who just reported.
        scored.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
        });

        let mut run = MatchRun::default();
        let mut kept = 0usize;

        for (candidate, score) in scored {
            if score < settings.display_threshold {
                run.outcomes.push(CandidateOutcome {
                    candidate_id: candidate.id,
                    score,
                    outcome: Outcome::BelowThreshold,
                });
                continue;
            }

            if kept >= settings.max_matches_per_report {
                run.outcomes.push(CandidateOutcome {
                    candidate_id: candidate.id,
                    score,
                    outcome: Outcome::Skipped(SkipReason::Capped),
                });
                continue;
            }
            kept += 1;

            let outcome = self.persist_and_notify(&report, &candidate, score, settings);
            run.outcomes.push(CandidateOutcome {
                candidate_id: candidate.id,
                score,
                outcome,
            });
        }

        log::info!(
            "Run for report {}: {} candidates scored, {} matches created",
            report_id,
            run.outcomes.len(),
            run.created_count()
        );
        Ok(run)
    }

    /// Re-run matching for every active report. Existing match rows get
    /// refreshed scores; pairs that became eligible since the last pass get
    /// fresh rows. Per-report failures are logged and do not stop the batch.
    pub fn rescan_all(&self, settings: &MatchSettings) -> Result<RescanStats, EngineError> {
        settings.validate()?;

        let active = self.reports.list_active(settings.max_candidates_scanned)?;
        log::info!("Rescanning {} active reports", active.len());

        let mut stats = RescanStats::default();
        for report in active {
            match self.run_for_report(report.id, settings) {
                Ok(run) => {
                    stats.reports_scanned += 1;
                    stats.matches_created += run.created_count();
                }
                Err(e) => {
                    stats.failures += 1;
                    log::error!("Rescan failed for report {}: {}", report.id, e);
                }
            }
        }

        log::info!(
            "Rescan done: {} reports, {} new matches, {} failures",
            stats.reports_scanned,
            stats.matches_created,
            stats.failures
        );
        Ok(stats)
    }

    /// Score every candidate on a bounded worker pool. Candidate scores are
    /// independent, so order of computation does not matter; results are
    /// re-assembled by index.
    fn score_candidates(
        &self,
        report: &Report,
        candidates: Vec<Report>,
        settings: &MatchSettings,
    ) -> Vec<(Report, u8)> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let workers = settings.scoring_workers.min(candidates.len());
        if workers <= 1 {
            return candidates
                .into_iter()
                .map(|c| {
                    let score = self.score_pair(report, &c, settings);
                    (c, score)
                })
                .collect();
        }

        let next = AtomicUsize::new(0);
        let scores = Mutex::new(vec![0u8; candidates.len()]);

        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    if i >= candidates.len() {
                        break;
                    }
                    let score = self.score_pair(report, &candidates[i], settings);
                    scores.lock().expect("score buffer lock poisoned")[i] = score;
                });
            }
        });

        let scores = scores.into_inner().expect("score buffer lock poisoned");
        candidates.into_iter().zip(scores).collect()
    }

    /// Total score for one pair. A face resolver failure only degrades this
    /// pair to its metadata score; it never aborts the run.
    fn score_pair(&self, report: &Report, candidate: &Report, settings: &MatchSettings) -> u8 {
        let metadata = metadata_score(report, candidate);

        let face = if settings.use_face_recognition {
            self.faces
                .as_ref()
                .and_then(|f| f.compare_reports(report, candidate, settings.face_api_timeout()))
        } else {
            None
        };

        total_score(metadata, face, settings)
    }

    fn persist_and_notify(
        &self,
        report: &Report,
        candidate: &Report,
        score: u8,
        settings: &MatchSettings,
    ) -> Outcome {
        // The candidate set was snapshotted at the start of the run; an
        // external writer may have removed or resolved this one since.
        match self.reports.get(candidate.id) {
            Ok(Some(current)) if current.is_active() => {}
            Ok(Some(_)) => {
                log::debug!("Candidate {} deactivated mid-run, skipping", candidate.id);
                return Outcome::Skipped(SkipReason::Deactivated);
            }
            Ok(None) => {
                log::debug!("Candidate {} vanished mid-run, skipping", candidate.id);
                return Outcome::Skipped(SkipReason::Vanished);
            }
            Err(e) => return Outcome::Failed(e.to_string()),
        }

        // Atomic upsert keyed by the unordered pair; one retry on conflict
        let upserted = self
            .matches
            .upsert_pending(report.id, candidate.id, score)
            .or_else(|e| {
                log::warn!(
                    "Match upsert failed for pair ({}, {}), retrying once: {}",
                    report.id,
                    candidate.id,
                    e
                );
                self.matches.upsert_pending(report.id, candidate.id, score)
            });

        let (row, created) = match upserted {
            Ok(r) => r,
            Err(e) => {
                log::error!(
                    "Match upsert failed for pair ({}, {}): {}",
                    report.id,
                    candidate.id,
                    e
                );
                return Outcome::Failed(e.to_string());
            }
        };

        let mut notified = false;
        if created && score >= settings.notify_threshold {
            // One-directional: only the older, waiting party is alerted.
            // The newer report's submitter just acted and already knows.
            let (older, newer) = if report.created_at <= candidate.created_at {
                (report, candidate)
            } else {
                (candidate, report)
            };

            self.dispatcher
                .notify(older.id, &ReportSummary::of(newer), score);
            notified = true;

            if let Err(e) = self.matches.mark_notified(row.id, older.id) {
                log::warn!("Failed to record notified side on match {}: {}", row.id, e);
            }

            log::info!(
                "Match {} created with score {}, notified report {}",
                row.id,
                score,
                older.id
            );
        } else if created {
            log::info!("Match {} created with score {}", row.id, score);
        } else {
            log::debug!("Match {} rescored to {}", row.id, score);
        }

        Outcome::Matched {
            row,
            created,
            notified,
        }
    }
}
