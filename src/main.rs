use anyhow::{Context, Result};
use clap::Parser;
use quasar_ci::changes::{self, AllowList};
use quasar_ci::config::Config;
use quasar_ci::findings::ReviewDocument;
use quasar_ci::fixgen::{self, PipelineOptions};
use quasar_ci::llm::client::HttpBackend;
use quasar_ci::{notify, report, review};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "quasar",
    about = "Automated pull-request review and fix generation for CI",
    version
)]
struct Args {
    /// Path to the repository under review (defaults to current directory)
    #[arg(default_value = ".")]
    repo: PathBuf,

    /// Base ref the pull request is diffed against
    #[arg(short, long, default_value = "origin/main")]
    base: String,

    /// Pre-produced findings document; skips the review call
    #[arg(long)]
    findings: Option<PathBuf>,

    /// Changed-files allow-list, one path per line
    #[arg(long)]
    allow_list: Option<PathBuf>,

    /// Where to write the fix set
    #[arg(long, default_value = "quasar-fixes.json")]
    fixes_out: PathBuf,

    /// Where to write the markdown report
    #[arg(long, default_value = "quasar-report.md")]
    report_out: PathBuf,

    /// Review only, skip fix generation
    #[arg(long)]
    no_fixes: bool,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: Config) -> Result<()> {
    // Downstream consumers read the fix set unconditionally, so a valid
    // empty document goes down first and the real one replaces it at the
    // end. Any failure after this point still leaves parseable output.
    fixgen::write_fix_set(&args.fixes_out, &[])?;

    let backend = HttpBackend::new(&config)?;

    let (document, changed_files) = match &args.findings {
        Some(path) => {
            info!(path = %path.display(), "loading pre-produced findings document");
            (ReviewDocument::load(path)?, None)
        }
        None => {
            let pull_request = changes::collect(&args.repo, &args.base)?;
            if pull_request.is_empty() {
                info!(base = %args.base, "no changes against base; nothing to review");
                return Ok(());
            }
            info!(
                files = pull_request.files.len(),
                base = %args.base,
                "collected pull-request diff"
            );
            let document = review::run(&backend, &config.model, &pull_request.diff_text).await?;
            (document, Some(pull_request.files))
        }
    };

    let allow_list = match (&args.allow_list, changed_files) {
        (Some(path), _) => Some(AllowList::load(path)?),
        (None, Some(files)) if !files.is_empty() => Some(AllowList::from_files(files)),
        _ => None,
    };

    let fixes = if args.no_fixes {
        info!("fix generation disabled by --no-fixes");
        Vec::new()
    } else if document.eligible_count() == 0 {
        info!("no CRITICAL or BUG findings; skipping fix generation");
        Vec::new()
    } else {
        fixgen::run(
            &backend,
            &PipelineOptions::from_config(&config),
            &document.findings,
            allow_list.as_ref(),
            &args.repo,
        )
        .await
    };

    fixgen::write_fix_set(&args.fixes_out, &fixes)?;

    let markdown = report::render(&document, &fixes);
    std::fs::write(&args.report_out, &markdown)
        .with_context(|| format!("failed to write report to {}", args.report_out.display()))?;

    if config.can_post_comment() {
        if let Err(err) = report::post_comment(&config, &markdown).await {
            warn!(error = %err, "failed to post PR comment");
        }
    }

    if let Some(endpoint) = &config.agent_endpoint {
        let session = config.agent_session.as_deref().unwrap_or("default");
        if let Err(err) = notify::send(endpoint, session, &document.summary, fixes.len()).await {
            warn!(error = %err, "failed to notify agent session");
        }
    }

    info!(
        findings = document.findings.len(),
        fixes = fixes.len(),
        "run complete"
    );
    Ok(())
}
