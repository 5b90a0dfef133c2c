// argus-cli/src/bin/argus_acquire.rs
// ============================================================================
// Module: Acquire CLI
// Description: CLI entrypoint running the full Acquire→Enrich→Score→Act
//   pipeline against a bundle directory on disk.
// Purpose: Give operators and CI jobs a single command to ingest a bundle
//   and print its stage trace.
// Dependencies: argus-cli, argus-config, argus-pipeline, clap
// ============================================================================

//! ## Overview
//! Reads `argus.toml` (or `$ARGUS_CONFIG`), loads the bundle directory named
//! by `--bundle`, and runs the orchestrated pipeline once against the
//! configured document store. The stage trace is printed to stdout as JSON;
//! a failed stage produces a non-zero exit code.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use argus_cli::CliError;
use argus_pipeline::orchestrator;
use argus_pipeline::orchestrator::OrchestratorRequest;
use clap::Parser;

/// Runs the Argus pipeline once against a bundle directory.
#[derive(Debug, Parser)]
#[command(name = "argus-acquire", about = "Acquire, enrich, score, and act on a bundle.")]
struct Cli {
    /// Path to the bundle directory (containing `bundle.manifest.json`).
    #[arg(long, value_name = "DIR")]
    bundle: PathBuf,
    /// Repository override; defaults to the value in the bundle manifest.
    #[arg(long)]
    repo: Option<String>,
    /// Build id override; defaults to the value in the bundle manifest.
    #[arg(long = "build-id")]
    build_id: Option<String>,
    /// Path to `argus.toml`; defaults to `$ARGUS_CONFIG` or `argus.toml`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Number of top-ranked findings to act on.
    #[arg(long = "top-n", default_value_t = 50)]
    top_n: usize,
    /// Run the act stage in dry-run mode, writing no actions.
    #[arg(long)]
    dry_run: bool,
    /// Print the full stage trace, not just the summary line.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(succeeded) => {
            if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => report_error(&err),
    }
}

fn run(cli: &Cli) -> Result<bool, CliError> {
    let config = argus_config::ArgusConfig::load(cli.config.as_deref())?;
    let store = argus_cli::build_document_store(&config.document_store)?;
    store.bootstrap_mappings(&argus_core::ALL_CONTRACTS)?;

    let (manifest, files) = argus_cli::load_bundle_dir(&cli.bundle)?;
    let (repo, build_id) = argus_cli::resolve_ids(cli.repo.as_deref(), cli.build_id.as_deref(), &manifest)?;

    let started_at = now_millis();
    let run_id = argus_cli::derive_run_id(&repo, &build_id, started_at)?;

    let request = OrchestratorRequest {
        repo,
        build_id,
        run_id,
        started_at,
        files: &files,
        top_n: if cli.top_n > 0 { cli.top_n } else { config.run.top_n },
        dry_run: cli.dry_run || config.run.dry_run,
        attempt: 1,
    };

    let result = orchestrator::run_pipeline(&store, &request)?;

    if cli.verbose {
        let report = serde_json::json!({
            "succeeded": result.succeeded,
            "traces": result.traces.iter().map(|t| serde_json::json!({
                "name": t.name,
                "status": t.status,
                "errorCode": t.error_code,
                "message": t.message,
                "counts": t.counts,
            })).collect::<Vec<_>>(),
            "rankingSize": result.ranking.len(),
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        println!("succeeded={} rankingSize={}", result.succeeded, result.ranking.len());
    }

    Ok(result.succeeded)
}

/// Current time in epoch milliseconds, used as the run's deterministic seed.
fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Reports CLI errors to stderr and returns a failure exit code.
fn report_error(err: &CliError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::FAILURE
}
