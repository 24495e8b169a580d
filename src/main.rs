// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use cluster_teardown::{
    constants::{MAX_TEARDOWN_BUDGET_SECS, TEARDOWN_BUDGET_SECS},
    metadata::{ClusterMetadata, TeardownJob},
    orchestrator::{Orchestrator, TeardownConfig},
    session::Session,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};

/// Tear down an installed cluster's Azure footprint.
#[derive(Debug, Parser)]
#[command(name = "cluster-teardown", version, about)]
struct Cli {
    /// Path to the installer's metadata.json
    #[arg(long, env = "CLUSTER_METADATA", default_value = "metadata.json")]
    metadata: PathBuf,

    /// Overall time budget shared by every phase, in minutes
    #[arg(
        long,
        default_value_t = TEARDOWN_BUDGET_SECS / 60,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TEARDOWN_BUDGET_SECS / 60)
    )]
    timeout_minutes: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Phases run one after another on a single task
    let runtime = tokio::runtime::Builder::new_current_thread()
        .thread_name("cluster-teardown")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn init_logging(default_level: &str) {
    // Respects RUST_LOG environment variable if set, otherwise uses --log-level
    // Example: RUST_LOG=cluster_teardown=debug cluster-teardown --metadata metadata.json
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cluster-teardown
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<ExitCode> {
    init_logging(&cli.log_level);
    debug!(?cli, "Logging initialized");

    let metadata = ClusterMetadata::from_file(&cli.metadata)?;
    let config = TeardownConfig {
        budget: Duration::from_secs(cli.timeout_minutes * 60),
        ..TeardownConfig::default()
    };

    let job = TeardownJob::from_metadata(&metadata, config.budget)?;
    let session = Session::from_env(&job.cloud).context("failed to load Azure credentials")?;
    debug!(?session, "Loaded Azure session");

    info!(
        cluster_name = %metadata.cluster_name,
        cluster_id = %job.cluster_id,
        region = %metadata.azure.region,
        timeout_minutes = cli.timeout_minutes,
        "Tearing down cluster"
    );

    let mut orchestrator = Orchestrator::for_azure(job, config, &session)
        .context("failed to initialise Azure clients")?;
    let errors = orchestrator.run().await;

    if errors.is_empty() {
        info!(state = ?orchestrator.state(), "Cluster teardown succeeded");
        return Ok(ExitCode::SUCCESS);
    }

    for err in errors.errors() {
        error!(phase = %err.phase(), error = %err, "Teardown phase failed");
    }
    eprintln!("{errors}");
    Ok(ExitCode::FAILURE)
}
