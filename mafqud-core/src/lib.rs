pub mod cache;
pub mod config;
pub mod engine;
pub mod face;
pub mod notify;
pub mod report;
pub mod rescan;
pub mod score;
pub mod store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),
    #[error("Face error: {0}")]
    Face(#[from] face::FaceError),
    #[error("Storage error: {0}")]
    Store(#[from] store::StoreError),
    #[error("Engine error: {0}")]
    Engine(#[from] engine::EngineError),
}

pub use config::{MatchSettings, MissingFacePolicy};
pub use engine::{CandidateOutcome, MatchEngine, MatchRun, Outcome, RescanStats, SkipReason};
pub use report::{Gender, Match, MatchStatus, Report, ReportKind, ReportStatus};
pub use rescan::RescanScheduler;
