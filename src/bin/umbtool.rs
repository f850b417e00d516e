//! UMB archive tool.
//!
//! Decodes an archive, optionally reassigns its initial states, samples a
//! path and re-encodes it. Prints a JSON report on stdout; logs and errors
//! go to stderr.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: umbtool=info,umb_kernel=warn)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//! - `UMB_PROBABILITY_TOLERANCE`, `UMB_COMPRESSION_LEVEL`, `UMB_VERIFY_CHECKSUMS`:
//!   codec settings, ignored when `--config` is given
//!
//! ## Usage
//!
//! ```bash
//! cargo run --features cli --bin umbtool -- --import model.umb --initial-state 3 --export out.umb
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use umb_kernel::{
    codec, fingerprint_hex, CodecConfig, ModelError, ModelSummary, PathSampler, StateId, UmbError,
};

#[derive(Parser, Debug)]
#[command(name = "umbtool")]
#[command(version, about = "Inspect, resample and rewrite UMB archives")]
struct Args {
    /// Archive to read
    #[arg(long, value_name = "PATH")]
    import: PathBuf,

    /// Write the (possibly modified) model here
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// Replace the initial states (repeatable)
    #[arg(long = "initial-state", value_name = "STATE")]
    initial_states: Vec<StateId>,

    /// Sample a path with this many steps
    #[arg(long, value_name = "STEPS")]
    sample: Option<usize>,

    /// Start state for sampling (default: a random initial state)
    #[arg(long, requires = "sample")]
    start: Option<StateId>,

    /// Seed for sampling
    #[arg(long, requires = "sample")]
    seed: Option<u64>,

    /// Codec configuration file (JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, overrides RUST_LOG
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Serialize)]
struct Report {
    archive_fingerprint: String,
    config_fingerprint: String,
    summary: ModelSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<SampledPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported: Option<String>,
}

#[derive(Serialize)]
struct SampledPath {
    seed: u64,
    states: Vec<StateId>,
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing(level: Option<&str>) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "umbtool=info,umb_kernel=warn".into()),
    };

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<CodecConfig, UmbError> {
    match path {
        Some(path) => CodecConfig::from_json_slice(&std::fs::read(path)?),
        None => Ok(CodecConfig::from_env()),
    }
}

fn run(args: &Args) -> Result<Report, UmbError> {
    let config = load_config(args.config.as_ref())?;
    let config_fingerprint = config.fingerprint();
    info!(config_fingerprint = %config_fingerprint, "Codec configuration loaded");

    let bytes = std::fs::read(&args.import)?;
    let archive_fingerprint = fingerprint_hex(&bytes);
    let mut model = codec::decode_with(&bytes, &config)?;
    info!(
        path = %args.import.display(),
        archive_fingerprint = %archive_fingerprint,
        states = model.num_states(),
        choices = model.num_choices(),
        "Archive decoded"
    );

    if !args.initial_states.is_empty() {
        model.set_initial_states(args.initial_states.clone())?;
        info!(initial_states = ?args.initial_states, "Initial states replaced");
    }

    let path = match args.sample {
        Some(length) => {
            let mut sampler = PathSampler::new(&model, args.seed);
            let states = match args.start {
                Some(start) => sampler.sample_path(start, length)?,
                None => sampler
                    .sample_from_initial(length)?
                    .ok_or(ModelError::NoInitialStates)?,
            };
            Some(SampledPath {
                seed: sampler.seed(),
                states,
            })
        }
        None => None,
    };

    let exported = match &args.export {
        Some(out) => {
            codec::write_file_with(&model, out, &config)?;
            info!(path = %out.display(), "Archive written");
            Some(out.display().to_string())
        }
        None => None,
    };

    Ok(Report {
        archive_fingerprint,
        config_fingerprint,
        summary: model.summary(),
        path,
        exported,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let report = match run(&args) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "umbtool failed");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to render report: {e}");
            ExitCode::FAILURE
        }
    }
}
