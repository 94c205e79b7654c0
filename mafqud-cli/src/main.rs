use clap::{Parser, Subcommand};
use mafqud_core::engine::{MatchEngine, Outcome, SkipReason};
use mafqud_core::notify::LogDispatcher;
use mafqud_core::report::Report;
use mafqud_core::rescan::RescanScheduler;
use mafqud_core::score;
use mafqud_core::store::{InMemoryMatchStore, InMemoryReportStore, ReportStore};
use mafqud_core::MatchSettings;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mafqud")]
#[command(about = "Lost-and-found report matching engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one matching pass for a report
    Scan {
        /// JSON file with the report set
        #[arg(long)]
        reports: PathBuf,
        /// Report to match against the rest
        #[arg(long)]
        report_id: Uuid,
    },
    /// Re-run matching for every active report, once or on an interval
    Rescan {
        /// JSON file with the report set
        #[arg(long)]
        reports: PathBuf,
        /// Run a single batch instead of the periodic loop
        #[arg(long)]
        once: bool,
    },
    /// Explain the metadata sub-scores for one report pair
    Score {
        /// JSON file with the report set
        #[arg(long)]
        reports: PathBuf,
        id_a: Uuid,
        id_b: Uuid,
    },
    /// Show effective settings
    Config {
        /// Validate settings
        #[arg(long)]
        validate: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    match cli.command {
        Commands::Scan { reports, report_id } => cmd_scan(reports, report_id),
        Commands::Rescan { reports, once } => cmd_rescan(reports, once),
        Commands::Score { reports, id_a, id_b } => cmd_score(reports, id_a, id_b),
        Commands::Config { validate } => cmd_config(validate),
    }
}

fn load_reports(path: &PathBuf) -> anyhow::Result<Vec<Report>> {
    let contents = std::fs::read_to_string(path)?;
    let reports: Vec<Report> = serde_json::from_str(&contents)?;
    Ok(reports)
}

fn build_engine(reports: Vec<Report>) -> (Arc<MatchEngine>, Arc<InMemoryMatchStore>) {
    let report_store = Arc::new(InMemoryReportStore::with_reports(reports));
    let match_store = Arc::new(InMemoryMatchStore::new());
    let engine = Arc::new(MatchEngine::new(
        report_store,
        match_store.clone(),
        Arc::new(LogDispatcher),
        None,
    ));
    (engine, match_store)
}

fn cmd_scan(reports_path: PathBuf, report_id: Uuid) -> anyhow::Result<()> {
    let settings = MatchSettings::load()?;
    let reports = load_reports(&reports_path)?;
    println!("Loaded {} reports from {}", reports.len(), reports_path.display());

    let (engine, _) = build_engine(reports);
    let run = engine.run_for_report(report_id, &settings)?;

    if run.outcomes.is_empty() {
        println!("No candidates for report {}", report_id);
        return Ok(());
    }

    println!("\n{} candidates scored:", run.outcomes.len());
    for outcome in &run.outcomes {
        let status = match &outcome.outcome {
            Outcome::Matched { created: true, notified: true, .. } => {
                "match created, notification sent".to_string()
            }
            Outcome::Matched { created: true, .. } => "match created".to_string(),
            Outcome::Matched { .. } => "match rescored".to_string(),
            Outcome::BelowThreshold => "below display threshold".to_string(),
            Outcome::Skipped(SkipReason::Capped) => "cut by match cap".to_string(),
            Outcome::Skipped(reason) => format!("skipped ({:?})", reason),
            Outcome::Failed(e) => format!("failed: {}", e),
        };
        println!("  {}  score {:>3}  {}", outcome.candidate_id, outcome.score, status);
    }

    println!("\n✓ {} matches created", run.created_count());
    Ok(())
}

fn cmd_rescan(reports_path: PathBuf, once: bool) -> anyhow::Result<()> {
    let settings = MatchSettings::load()?;
    let reports = load_reports(&reports_path)?;
    let (engine, _) = build_engine(reports);

    if once {
        let stats = engine.rescan_all(&settings)?;
        println!(
            "✓ Rescanned {} reports, {} new matches, {} failures",
            stats.reports_scanned, stats.matches_created, stats.failures
        );
        return Ok(());
    }

    println!(
        "Starting rescan loop (every {}s), Ctrl-C to exit",
        settings.rescan_interval_seconds
    );
    let _scheduler = RescanScheduler::start(engine, || {
        MatchSettings::load().unwrap_or_default()
    });

    loop {
        std::thread::park();
    }
}

fn cmd_score(reports_path: PathBuf, id_a: Uuid, id_b: Uuid) -> anyhow::Result<()> {
    let reports = load_reports(&reports_path)?;
    let store = InMemoryReportStore::with_reports(reports);

    let a = store
        .get(id_a)?
        .ok_or_else(|| anyhow::anyhow!("Report not found: {}", id_a))?;
    let b = store
        .get(id_b)?
        .ok_or_else(|| anyhow::anyhow!("Report not found: {}", id_b))?;

    let breakdown = score::metadata_breakdown(&a, &b);
    println!("Comparing {} ({:?}) with {} ({:?})", a.name, a.kind, b.name, b.kind);
    println!("  gender:   {:>3}  (weight 0.40)", breakdown.gender);
    println!("  age:      {:>3}  (weight 0.35)", breakdown.age);
    println!("  location: {:>3}  (weight 0.25)", breakdown.location);
    if let (Some(la), Some(lb)) = (a.location, b.location) {
        println!("  distance: {:.2} km", score::haversine_km(la, lb));
    }
    println!("  metadata score: {}", breakdown.total);

    Ok(())
}

fn cmd_config(validate: bool) -> anyhow::Result<()> {
    let settings = MatchSettings::load()?;

    println!("Effective settings:");
    println!("  display_threshold:        {}", settings.display_threshold);
    println!("  notify_threshold:         {}", settings.notify_threshold);
    println!("  use_face_recognition:     {}", settings.use_face_recognition);
    println!("  max_matches_per_report:   {}", settings.max_matches_per_report);
    println!("  max_candidates_scanned:   {}", settings.max_candidates_scanned);
    println!("  face_api_timeout_seconds: {}", settings.face_api_timeout_seconds);
    println!("  missing_face_policy:      {:?}", settings.missing_face_policy);
    println!("  scoring_workers:          {}", settings.scoring_workers);
    println!("  rescan_interval_seconds:  {}", settings.rescan_interval_seconds);

    if validate {
        settings.validate()?;
        println!("\n✓ Settings are valid");
    }

    Ok(())
}
