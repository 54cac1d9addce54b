//! dp-oracle
//!
//! Runs empirical (ε, δ)-differential privacy test cases from a JSON
//! collection and reports a verdict per case. Exits successfully only when
//! every case is consistent with its claimed budget.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dp_oracle::testcase::{run_collection_with, TestCaseCollection};
use dp_oracle::OracleConfig;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use report::{case_line, RunReport};

#[derive(Parser)]
#[command(name = "dp-oracle")]
#[command(about = "Empirical differential privacy verification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every case of a collection and report verdicts
    Run {
        /// Test-case collection (default: the shipped bounded quantiles cases)
        #[arg(short, long)]
        cases: Option<PathBuf>,

        /// Override the collection's number of votes
        #[arg(long)]
        votes: Option<usize>,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Give up on a case after this many seconds
        #[arg(long)]
        timeout_secs: Option<f64>,

        /// Seed label for a reproducible run
        #[arg(long)]
        seed: Option<String>,

        /// Output JSON results file
        #[arg(short, long)]
        output_json: Option<PathBuf>,
    },

    /// Check a collection's parameters without sampling
    Validate {
        /// Test-case collection (default: the shipped bounded quantiles cases)
        #[arg(short, long)]
        cases: Option<PathBuf>,
    },
}

fn default_cases() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../dp-oracle/testdata/bounded_quantiles_dp_test_cases.json")
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    println!("{}", "═".repeat(60).cyan());
    println!("{}", "  DP ORACLE".cyan().bold());
    println!("{}", "  Empirical (ε, δ)-DP verification".cyan());
    println!("{}", "═".repeat(60).cyan());
    println!();

    match cli.command {
        Commands::Run {
            cases,
            votes,
            threads,
            timeout_secs,
            seed,
            output_json,
        } => {
            let mut config = OracleConfig::from_env_or_default();
            if votes.is_some() {
                config.votes_override = votes;
            }
            if threads.is_some() {
                config.threads = threads;
            }
            if let Some(secs) = timeout_secs {
                ensure!(
                    secs.is_finite() && secs > 0.0,
                    "--timeout-secs must be positive, got {}",
                    secs
                );
                config.timeout = Some(Duration::from_secs_f64(secs));
            }
            if seed.is_some() {
                config.seed = seed;
            }

            run(cases.unwrap_or_else(default_cases), config, output_json)
        }
        Commands::Validate { cases } => validate(cases.unwrap_or_else(default_cases)),
    }
}

fn run(cases: PathBuf, mut config: OracleConfig, output_json: Option<PathBuf>) -> Result<ExitCode> {
    let collection = TestCaseCollection::from_path(&cases)?;

    let seed = config.resolve_seed_label();
    config.seed = Some(seed.clone());
    let number_of_votes = config.number_of_votes(collection.voting_parameters.number_of_votes);
    tracing::info!(
        cases = collection.test_cases.len(),
        number_of_votes,
        threads = ?config.threads,
        timeout = ?config.timeout,
        "starting run"
    );

    println!("{}", "Running test cases...".yellow().bold());
    println!("  Collection: {}", cases.display());
    println!("  Cases:      {}", collection.test_cases.len());
    println!("  Votes:      {}", number_of_votes);
    println!("  Seed:       {}", seed);
    println!();

    let bar = ProgressBar::new(collection.test_cases.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );
    let reports = run_collection_with(&collection, &config, |report| {
        bar.println(case_line(report));
        bar.inc(1);
    });
    bar.finish_and_clear();

    let report = RunReport::new(cases.display().to_string(), seed, number_of_votes, reports);
    report.print();

    if let Some(path) = output_json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("\nResults saved to: {}", path.display());
    }

    Ok(if report.all_consistent() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate(cases: PathBuf) -> Result<ExitCode> {
    let collection = TestCaseCollection::from_path(&cases)?;
    println!("{}", "Validating test cases...".yellow().bold());
    println!("  Collection: {}", cases.display());
    println!();

    let mut failures = 0;
    for validation in collection.validate() {
        match &validation.result {
            Ok(advisories) => {
                println!("  {} {}", "✓".green(), validation.name);
                for advisory in advisories {
                    println!("      {}", advisory.to_string().yellow());
                }
            }
            Err(e) => {
                failures += 1;
                println!("  {} {}: {}", "✗".red(), validation.name, e);
            }
        }
    }

    println!();
    if failures == 0 {
        println!("{}", "  ALL CASES VALID".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}", format!("  {} INVALID", failures).red().bold());
        Ok(ExitCode::FAILURE)
    }
}
