use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use pipeline_tracker::config::AppConfig;
use pipeline_tracker::error::AppError;
use pipeline_tracker::telemetry;
use pipeline_tracker::workflows::pipeline::{
    CandidateId, IngestReport, IngestRequest, JobMatchIngestor, MailDropFile, OpeningsCsvFile,
    RecordSet, ReconciliationEngine, RunSummary, StateStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "Applicant Pipeline Tracker",
    about = "Track job application pipelines and reconcile inbox activity into the tracker store",
    version
)]
struct Cli {
    /// Override the configured tracker store path
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import job-discovery results as newly discovered applications
    Ingest(IngestArgs),
    /// Run one inbox reconciliation pass against the tracker store
    Reconcile(ReconcileArgs),
    /// Print the tracked applications and their current statuses
    Status,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Candidate the openings are ingested for
    #[arg(long)]
    candidate: String,
    /// Role filter applied to the openings export
    #[arg(long)]
    role: String,
    /// Location filter applied to the openings export
    #[arg(long, default_value = "")]
    location: String,
    /// Restrict to specific companies (repeatable)
    #[arg(long = "company")]
    companies: Vec<String>,
    /// Opaque compliance tags stamped onto new records (repeatable)
    #[arg(long = "compliance-tag")]
    compliance_tags: Vec<String>,
    /// CSV export of job-discovery results
    #[arg(long)]
    openings_csv: PathBuf,
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    /// JSON maildrop file written by the mail connector
    #[arg(long)]
    maildrop: PathBuf,
    /// Only consider mail received after this point (YYYY-MM-DD or RFC 3339;
    /// defaults to seven days ago)
    #[arg(long, value_parser = parse_since)]
    since: Option<DateTime<Utc>>,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(store) = cli.store {
        config.store.path = store;
    }
    telemetry::init(config.environment, &config.telemetry)?;

    let store = StateStore::new(config.store.path.clone());

    match cli.command {
        Command::Ingest(args) => run_ingest(&config, &store, args),
        Command::Reconcile(args) => run_reconcile(&config, store, args),
        Command::Status => run_status(&store),
    }
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(stamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD or RFC 3339 ({err})"))
}

fn run_ingest(config: &AppConfig, store: &StateStore, args: IngestArgs) -> Result<(), AppError> {
    let board = Arc::new(OpeningsCsvFile::new(args.openings_csv));
    let ingestor = JobMatchIngestor::new(board, config.sources.timeout);
    let request = IngestRequest {
        candidate_id: CandidateId(args.candidate),
        role: args.role,
        location: args.location,
        companies: args.companies,
        compliance_tags: args.compliance_tags,
    };

    let report = ingestor.ingest(store, &request, Utc::now())?;
    render_ingest_report(&report);
    Ok(())
}

fn run_reconcile(config: &AppConfig, store: StateStore, args: ReconcileArgs) -> Result<(), AppError> {
    let since = args
        .since
        .unwrap_or_else(|| Utc::now() - ChronoDuration::days(7));
    let mail = Arc::new(MailDropFile::new(args.maildrop));
    let engine = ReconciliationEngine::new(store, mail, config.sources.timeout);

    info!(%since, "starting reconciliation pass");
    let summary = engine.run(since)?;
    render_run_summary(&summary);
    Ok(())
}

fn run_status(store: &StateStore) -> Result<(), AppError> {
    let records = store.load()?;
    render_status(&records);
    Ok(())
}

fn render_ingest_report(report: &IngestReport) {
    if report.added.is_empty() {
        println!("No new openings; {} already tracked", report.already_tracked);
        return;
    }

    println!("Added {} application(s)", report.added.len());
    for key in &report.added {
        println!(
            "- {} | {} | {} | {}",
            key.candidate_id, key.company, key.role, key.application_link
        );
    }
    if report.already_tracked > 0 {
        println!("{} opening(s) were already tracked", report.already_tracked);
    }
}

fn render_run_summary(summary: &RunSummary) {
    println!("Reconciliation pass complete");
    println!(
        "Messages: {} total ({} interview, {} schedule, {} receipt, {} other)",
        summary.messages_seen(),
        summary.interview_requests,
        summary.schedule_requests,
        summary.receipts,
        summary.other
    );

    if summary.applied.is_empty() {
        println!("\nApplied updates: none");
    } else {
        println!("\nApplied updates");
        for update in &summary.applied {
            println!(
                "- {} | {} | {} | {} -> {}",
                update.candidate_id, update.company, update.role, update.from, update.to
            );
        }
    }

    if !summary.skipped.is_empty() {
        println!("\nSkipped transitions");
        for skipped in &summary.skipped {
            println!(
                "- {} | {} | {} | {} -> {} ({})",
                skipped.candidate_id,
                skipped.company,
                skipped.role,
                skipped.from,
                skipped.requested,
                skipped.reason
            );
        }
    }

    if !summary.unmatched.is_empty() {
        println!("\nUnmatched messages");
        for unmatched in &summary.unmatched {
            println!(
                "- {} | from {} | {} ({})",
                unmatched.candidate_id,
                unmatched.sender,
                unmatched.subject,
                unmatched.kind.label()
            );
        }
    }
}

fn render_status(records: &RecordSet) {
    if records.is_empty() {
        println!("Tracker is empty");
        return;
    }

    println!("Tracked applications: {}", records.len());
    for record in records.iter() {
        let submitted = match record.date_submitted {
            Some(date) => format!(", submitted {date}"),
            None => String::new(),
        };
        println!(
            "- {} | {} | {} | {}{} | updated {}",
            record.candidate_id,
            record.company,
            record.role,
            record.status,
            submitted,
            record.last_updated.format("%Y-%m-%d %H:%M")
        );
    }
}
