use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codejudge_core::{
    CodeJudgeConfig, GradeReport, Language, PersistenceOutcome, SubmissionRequest, VerdictStatus,
};
use codejudge_pipeline::{CancellationToken, Orchestrator, VerdictSink};
use codejudge_store::{SqliteSubmissionStore, StoredSubmission};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codejudge")]
#[command(about = "Grade a code submission with a synthesized test driver", long_about = None)]
struct Cli {
    /// JSON config file (defaults to $CODEJUDGE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trial-run a solution, or grade and store it with --problem-id and --user
    Grade {
        /// Source file holding the solution
        file: PathBuf,

        /// Language (python, javascript, cpp, java); inferred from the extension if omitted
        #[arg(short, long)]
        language: Option<String>,

        /// Problem title shown to the models
        #[arg(short, long)]
        title: String,

        /// Problem id to record the verdict under
        #[arg(long, requires = "user")]
        problem_id: Option<String>,

        /// Submitter identity
        #[arg(short, long, requires = "problem_id")]
        user: Option<String>,

        /// SQLite database path (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// List pinned runtimes
    Runtimes,

    /// Show stored verdicts for a user or a problem
    History {
        #[arg(short, long, conflicts_with = "problem_id", required_unless_present = "problem_id")]
        user: Option<String>,

        #[arg(long)]
        problem_id: Option<String>,

        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Grade {
            file,
            language,
            title,
            problem_id,
            user,
            db,
            output,
        } => {
            cmd_grade(
                config,
                &file,
                language.as_deref(),
                &title,
                problem_id.zip(user),
                db,
                output,
            )
            .await
        }
        Commands::Runtimes => {
            cmd_runtimes(&config);
            Ok(ExitCode::SUCCESS)
        }
        Commands::History {
            user,
            problem_id,
            limit,
            db,
            output,
        } => {
            cmd_history(&config, user, problem_id, limit, db, output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CodeJudgeConfig> {
    let mut config = match path {
        Some(path) => CodeJudgeConfig::load(path)?,
        None => CodeJudgeConfig::from_env()?,
    };
    if path.is_some() {
        config.apply_env_with(|key| std::env::var(key).ok())?;
    }
    Ok(config)
}

fn resolve_language(explicit: Option<&str>, file: &Path) -> Result<Language> {
    if let Some(name) = explicit {
        return Ok(name.parse()?);
    }

    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let language = match ext {
        "py" => Language::Python,
        "js" | "mjs" => Language::JavaScript,
        "cpp" | "cc" | "cxx" => Language::Cpp,
        "java" => Language::Java,
        _ => bail!(
            "cannot infer language from {:?}; pass --language",
            file.display().to_string()
        ),
    };
    Ok(language)
}

async fn cmd_grade(
    mut config: CodeJudgeConfig,
    file: &Path,
    language: Option<&str>,
    title: &str,
    graded: Option<(String, String)>,
    db: Option<PathBuf>,
    output: OutputFormat,
) -> Result<ExitCode> {
    let language = resolve_language(language, file)?;
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let request = match &graded {
        Some((problem_id, user)) => {
            SubmissionRequest::graded(&source, language, title, problem_id, user)
        }
        None => SubmissionRequest::trial(&source, language, title),
    };

    if let Some(db) = db {
        config.store.db_path = db.display().to_string();
    }
    let sink: Option<Arc<dyn VerdictSink>> = match graded {
        Some(_) => Some(Arc::new(SqliteSubmissionStore::open(Path::new(
            &config.store.db_path,
        ))?)),
        None => None,
    };

    let orchestrator = Orchestrator::from_config(&config, sink)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_signal.cancel();
        }
    });

    eprintln!(
        "Grading {} ({}, {} cases)...",
        file.display(),
        language.label(),
        request.mode.case_count()
    );
    let report = orchestrator.run(&request, &cancel).await?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_report(&report),
    }

    Ok(match report.verdict.status {
        VerdictStatus::Accepted => ExitCode::SUCCESS,
        VerdictStatus::WrongAnswer => ExitCode::from(1),
    })
}

fn print_report(report: &GradeReport) {
    let verdict = &report.verdict;
    println!();
    println!(
        "{} ({}/{} passed)",
        verdict.status.label(),
        verdict.passed_count,
        verdict.total_count
    );
    println!("{:-<72}", "");
    for (i, case) in verdict.cases.iter().enumerate() {
        let mark = if case.passed { "PASS" } else { "FAIL" };
        println!("  {:<3} {}  {}", i + 1, mark, case.input);
        println!("        expected: {}", one_line(&case.expected_output));
        println!("        actual:   {}", one_line(&case.actual_output));
    }

    match &report.persistence {
        PersistenceOutcome::NotRequested => {}
        PersistenceOutcome::Stored => println!("\n  Verdict stored."),
        PersistenceOutcome::Failed { message } => {
            println!("\n  WARNING: verdict not stored: {}", message)
        }
    }
    println!();
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cmd_runtimes(config: &CodeJudgeConfig) {
    println!();
    println!("  {:<12} {:<12} {}", "LANGUAGE", "RUNTIME", "VERSION");
    for (language, runtime) in config.runtimes.iter() {
        println!(
            "  {:<12} {:<12} {}",
            language.label(),
            runtime.language,
            runtime.version
        );
    }
    println!();
}

fn cmd_history(
    config: &CodeJudgeConfig,
    user: Option<String>,
    problem_id: Option<String>,
    limit: usize,
    db: Option<PathBuf>,
    output: OutputFormat,
) -> Result<()> {
    let path = db.unwrap_or_else(|| PathBuf::from(&config.store.db_path));
    let store = SqliteSubmissionStore::open(&path)?;

    let entries = match (user, problem_id) {
        (Some(user), _) => store.list_for_identity(&user, limit)?,
        (None, Some(problem_id)) => store.list_for_problem(&problem_id, limit)?,
        (None, None) => bail!("pass --user or --problem-id"),
    };

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Table => print_history(&entries),
    }
    Ok(())
}

fn print_history(entries: &[StoredSubmission]) {
    if entries.is_empty() {
        println!("No submissions found.");
        return;
    }

    println!();
    println!(
        "  {:<20} {:<16} {:<16} {:<12} {:<14} {}",
        "WHEN", "USER", "PROBLEM", "LANGUAGE", "STATUS", "PASSED"
    );
    for entry in entries {
        println!(
            "  {:<20} {:<16} {:<16} {:<12} {:<14} {}/{}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.identity,
            entry.problem_id,
            entry.language.label(),
            entry.status.label(),
            entry.passed_count,
            entry.total_count
        );
    }
    println!();
}
