use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use scene_grader::{
    AssignmentStore, CatalogFilter, GradeSink, GraderConfig, HttpGradeSink, LogGradeSink,
    ProcessSupervisor, Report, SceneCatalog, ScoringPolicy, TestRunner, TomlAssignmentStore,
};

/// Grade a candidate simulator against the oracle for one theme/milestone
#[derive(Debug, Parser)]
#[command(name = "scene-grader", version, about)]
struct Args {
    /// Candidate simulator binary
    candidate: PathBuf,

    theme: u32,

    milestone: u32,

    /// Also run extra credit scenes
    #[arg(long)]
    extra: bool,

    /// Assignment store (TOML). Defaults to $GRADER_ASSIGNMENT_STORE or ./files/assignments.toml
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Write the report as JSON to FILE
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Skip scene directories or `<dir>/<file>` names
    #[arg(long, value_name = "NAME")]
    exclude: Vec<String>,

    /// Only run scenes in these directories or with these `<dir>/<file>` names
    #[arg(long, value_name = "NAME")]
    only: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // RUST_LOG may come from .env
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scene_grader=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = GraderConfig::from_env();

    let sink: Box<dyn GradeSink> = match HttpGradeSink::from_config(&config)? {
        Some(http) => Box::new(http),
        None => {
            warn!("GRADER_AUTOGRADE_URL is not set, the grade will only be logged");
            Box::new(LogGradeSink)
        }
    };

    let store_path = args.store.clone().unwrap_or_else(|| {
        std::env::var("GRADER_ASSIGNMENT_STORE")
            .unwrap_or_else(|_| "./files/assignments.toml".into())
            .into()
    });
    let store = TomlAssignmentStore::from_file(&store_path, config.late_window)
        .with_context(|| format!("Failed to load assignments from {}", store_path.display()))?;

    // Due dates are stored in local time
    let now = Utc::now();
    let local_now = (now - config.due_date_utc_offset).naive_utc();
    let assignments = store.assignments(args.theme, args.milestone, local_now)?;

    let Some(assignment) = assignments.into_iter().next() else {
        info!(
            "No assignment for theme {} milestone {} is accepting submissions",
            args.theme, args.milestone
        );
        return Ok(ExitCode::SUCCESS);
    };
    info!("Grading {}", assignment);

    let mut filter = CatalogFilter::default().exclude(args.exclude.iter().cloned());
    if !args.only.is_empty() {
        filter = filter.include(args.only.iter().cloned());
    }
    let tests = SceneCatalog::new(&config.scene_extension)
        .with_filter(filter)
        .for_assignment(&assignment)
        .context("Failed to resolve scene catalog")?;

    let runner = TestRunner::new(ProcessSupervisor::from_config(&config), config.clone());
    let mode = assignment.mode(args.extra);
    let policy = ScoringPolicy::from_config(&config);

    let outcomes = match runner
        .run_all(&tests, &args.candidate, &assignment.oracle_path, mode)
        .await
    {
        Ok(outcomes) => outcomes,
        Err(aborted) => {
            if !aborted.outcomes.is_empty() {
                let score =
                    policy.score_for(mode.is_contest, &aborted.outcomes, assignment.due_date, now);
                Report::new(assignment.name(), mode.is_contest, &aborted.outcomes, score).log();
            }
            error!("Grading aborted: {:#}", anyhow::Error::from(aborted.source));
            return Ok(ExitCode::FAILURE);
        }
    };

    let score = policy.score_for(mode.is_contest, &outcomes, assignment.due_date, now);
    let report = Report::new(assignment.name(), mode.is_contest, &outcomes, score);
    report.log();

    if let Some(path) = &args.json {
        let json = report.to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    match sink.deliver(&report).await {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => {
            warn!("Grade was not accepted");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("Failed to deliver grade: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
