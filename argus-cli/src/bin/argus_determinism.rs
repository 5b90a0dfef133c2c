// argus-cli/src/bin/argus_determinism.rs
// ============================================================================
// Module: Determinism CLI
// Description: CLI entrypoint running the pipeline twice against independent
//   in-memory stores and reporting any drift.
// Purpose: Let operators and CI verify a bundle produces identical output on
//   a rerun before trusting it against a real document store.
// Dependencies: argus-cli, argus-config, argus-pipeline, clap
// ============================================================================

//! ## Overview
//! Unlike `argus-acquire`, this binary never touches a configured document
//! store: both runs happen against fresh in-memory stores, so determinism
//! failures never propagate into real data.

use std::path::PathBuf;
use std::process::ExitCode;

use argus_cli::CliError;
use argus_pipeline::determinism;
use argus_pipeline::orchestrator::OrchestratorRequest;
use clap::Parser;

/// Runs the Argus pipeline twice against a bundle directory and diffs the
/// result.
#[derive(Debug, Parser)]
#[command(name = "argus-determinism", about = "Check that a bundle produces identical pipeline output on a rerun.")]
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
    /// Number of top-ranked findings to act on.
    #[arg(long = "top-n", default_value_t = 50)]
    top_n: usize,
    /// Stop diffing at the first drift found, rather than collecting all of
    /// them.
    #[arg(long = "fail-fast")]
    fail_fast: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(passed) => {
            if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => report_error(&err),
    }
}

fn run(cli: &Cli) -> Result<bool, CliError> {
    let (manifest, files) = argus_cli::load_bundle_dir(&cli.bundle)?;
    let (repo, build_id) = argus_cli::resolve_ids(cli.repo.as_deref(), cli.build_id.as_deref(), &manifest)?;

    let started_at = 0;
    let run_id = argus_cli::derive_run_id(&repo, &build_id, started_at)?;

    let request = OrchestratorRequest {
        repo,
        build_id,
        run_id,
        started_at,
        files: &files,
        top_n: cli.top_n,
        dry_run: true,
        attempt: 1,
    };

    let report = determinism::run_twice_and_diff(&request, cli.fail_fast)?;

    if report.passed {
        println!("determinism check passed");
    } else {
        eprintln!("determinism check failed:");
        for failure in &report.failures {
            eprintln!("  - {failure}");
        }
    }

    Ok(report.passed)
}

/// Reports CLI errors to stderr and returns a failure exit code.
fn report_error(err: &CliError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::FAILURE
}
