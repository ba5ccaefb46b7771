// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Registry submission CLI
//!
//! Submits one signed document to the registry through the rate-gated
//! client and prints the registry's answer.
//!
//! ## Configuration
//!
//! Defaults can be replaced by a JSON file (`--config`), then overridden by
//! environment variables:
//!
//! - `REGISTRY_URL`: Registry scheme and host (default: https://example.ru)
//! - `REGISTRY_CREATE_PATH`: Document creation path
//! - `REGISTRY_TOKEN`: Bearer token
//! - `RATE_LIMIT`: Max submissions per window (default: 10)
//! - `RATE_WINDOW_MS`: Window length in milliseconds (default: 1000)

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use registry_submission_limiter::{
    config::Config, Document, HttpTransport, SubmissionCoordinator, SubmissionOutcome,
};

#[derive(Parser)]
#[command(name = "registry-submit", about = "Submit a signed document to the goods registry")]
struct Args {
    /// JSON file with document_format, product_document and optional product_group
    #[arg(long)]
    document: PathBuf,

    /// Document signature
    #[arg(long, conflicts_with = "signature_file", required_unless_present = "signature_file")]
    signature: Option<String>,

    /// Path to file containing the document signature
    #[arg(long, conflicts_with = "signature")]
    signature_file: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up if no rate slot frees within this many milliseconds
    #[arg(long)]
    wait_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = load_config(args.config.as_deref())?;
    config.validate().context("invalid configuration")?;
    info!(
        endpoint = %config.registry.base_url,
        limit = config.rate_limit.limit,
        window_ms = config.rate_limit.window_ms,
        "Starting registry submission"
    );

    let document: Document = serde_json::from_str(
        &fs::read_to_string(&args.document)
            .with_context(|| format!("reading {}", args.document.display()))?,
    )
    .context("parsing document")?;

    let signature = match (&args.signature, &args.signature_file) {
        (Some(signature), _) => signature.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?
            .trim()
            .to_string(),
        (None, None) => anyhow::bail!("either --signature or --signature-file is required"),
    };

    let transport = HttpTransport::from_config(&config.registry);
    let coordinator = SubmissionCoordinator::from_config(&config, transport)?;

    let outcome = match args.wait_ms {
        Some(ms) => {
            coordinator
                .submit_timeout(&document, &signature, Duration::from_millis(ms))
                .await?
        }
        None => coordinator.submit(&document, &signature).await?,
    };

    match outcome {
        SubmissionOutcome::Accepted { id } => println!("{id}"),
        SubmissionOutcome::Rejected {
            code,
            message,
            description,
        } => {
            println!("{code}\n{message}\n{description}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    // Logs go to stderr so stdout carries only the registry answer.
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

/// Load configuration from an optional file, then environment variables.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => serde_json::from_str(
            &fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        )
        .context("parsing config")?,
        None => Config::default(),
    };

    if let Ok(url) = std::env::var("REGISTRY_URL") {
        config.registry.base_url = url;
    }
    if let Ok(path) = std::env::var("REGISTRY_CREATE_PATH") {
        config.registry.create_path = path;
    }
    if let Ok(token) = std::env::var("REGISTRY_TOKEN") {
        config.registry.token = token;
    }
    if let Some(limit) = std::env::var("RATE_LIMIT").ok().and_then(|v| v.parse().ok()) {
        config.rate_limit.limit = limit;
    }
    if let Some(window_ms) = std::env::var("RATE_WINDOW_MS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.rate_limit.window_ms = window_ms;
    }

    Ok(config)
}
