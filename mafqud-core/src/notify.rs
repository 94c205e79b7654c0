use crate::report::{Report, ReportId, ReportKind};

/// What the alerted party gets to see about the counterpart report
#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub report_id: ReportId,
    pub kind: ReportKind,
    pub name: String,
}

impl ReportSummary {
    pub fn of(report: &Report) -> Self {
        Self {
            report_id: report.id,
            kind: report.kind,
            name: report.name.clone(),
        }
    }
}

/// One-way alert delivery. Fire-and-forget from the engine's viewpoint;
/// delivery guarantees are the dispatcher's concern.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, report_id: ReportId, counterpart: &ReportSummary, score: u8);
}

/// Dispatcher that only logs; the CLI default
#[derive(Default)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn notify(&self, report_id: ReportId, counterpart: &ReportSummary, score: u8) {
        log::info!(
            "Notifying report {} of potential match with {} ({:?}, score {})",
            report_id,
            counterpart.report_id,
            counterpart.kind,
            score
        );
    }
}
