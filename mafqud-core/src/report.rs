use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque report identifier
pub type ReportId = Uuid;

/// Reference to an uploaded photo (URL or storage key); image bytes are
/// managed by an external media service
pub type ImageRef = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Lost,
    Found,
}

impl ReportKind {
    /// The kind a counterpart report must have
    pub fn opposite(self) -> Self {
        match self {
            ReportKind::Lost => ReportKind::Found,
            ReportKind::Found => ReportKind::Lost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Active,
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// WGS84 coordinates of where the person was last seen / found
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A lost-person or found-person report. Owned and mutated by the external
/// report store; this crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub kind: ReportKind,
    pub status: ReportStatus,
    pub name: String,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default = "default_gender")]
    pub gender: Gender,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    pub created_at: DateTime<Utc>,
}

fn default_gender() -> Gender {
    Gender::Unknown
}

impl Report {
    pub fn is_active(&self) -> bool {
        self.status == ReportStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Rejected,
}

/// Normalized unordered pair of report ids. Persistence is keyed by this, so
/// at most one match row can exist per report pair no matter which side
/// triggered discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey(ReportId, ReportId);

impl PairKey {
    pub fn new(a: ReportId, b: ReportId) -> Self {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }

    pub fn contains(&self, id: ReportId) -> bool {
        self.0 == id || self.1 == id
    }
}

/// A persisted, scored pairing between two reports.
///
/// `report_new_id` is the report being processed when the match was first
/// discovered; `report_old_id` the counterpart already on file. Status
/// transitions (rejection) are driven by external admin workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub report_new_id: ReportId,
    pub report_old_id: ReportId,
    pub similarity_score: u8,
    pub status: MatchStatus,
    pub notified_report_id: Option<ReportId>,
    pub created_at: DateTime<Utc>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
}

impl Match {
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.report_new_id, self.report_old_id)
    }

    pub fn is_pending(&self) -> bool {
        self.status == MatchStatus::Pending
    }
}
