//! Startup for `batchgen run` and `batchgen check`.
//!
//! Everything here happens once, before the first image: configuration and
//! element pool loading, the health probe, output directory resolution, and
//! run log creation. Any failure is fatal and no image is attempted.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::core::classifier::probe_is_healthy;
use crate::core::random::SystemRandom;
use crate::engine::{EngineParts, RunSummary, run_generation};
use crate::io::client::{Credentials, Transport, VeniceClient};
use crate::io::config::{FileConfigSource, GeneratorConfig, load_config};
use crate::io::elements::load_elements;
use crate::io::init::GeneratorPaths;
use crate::io::output::{ResolvedOutput, default_output_base, resolve_output_dir};
use crate::io::pacing::ThreadPause;
use crate::io::progress::ProgressSink;
use crate::io::run_log::{RunLog, RunLogHeader};

/// The health probe got a response, but a server-side error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("API appears to be down (Status {status}): {body}")]
pub struct ServiceDown {
    pub status: u16,
    pub body: String,
}

/// Probe the service once. Transport failures and 5xx responses are fatal;
/// anything below 500 (including 401/405 for a GET) counts as reachable.
#[instrument(skip_all)]
pub fn check_service<T: Transport>(transport: &T, credentials: &Credentials) -> Result<()> {
    let raw = transport.probe(credentials).context("API appears to be down")?;
    if !probe_is_healthy(&raw) {
        return Err(ServiceDown {
            status: raw.status,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
        }
        .into());
    }
    debug!(status = raw.status, "service reachable");
    Ok(())
}

/// Inputs for [`start_run`] that come from the command line.
pub struct StartOptions<'a> {
    pub paths: GeneratorPaths,
    pub progress: &'a dyn ProgressSink,
    pub interrupted: Arc<AtomicBool>,
    /// Unix seconds, used to suffix an already existing output directory.
    pub started_at: i64,
}

/// Load everything from `paths.config_dir` and build the client.
pub fn load_client(paths: &GeneratorPaths) -> Result<(GeneratorConfig, VeniceClient)> {
    let config = load_config(&paths.config_path)?;
    let client = VeniceClient::new().context("build API client")?;
    Ok((config, client))
}

/// Resolve and create the output directory for this run.
pub fn prepare_output(config: &GeneratorConfig, started_at: i64) -> Result<ResolvedOutput> {
    let base: PathBuf = match &config.output_dir {
        Some(dir) => dir.clone(),
        None => default_output_base()?,
    };
    resolve_output_dir(&base, &config.prompt_name, config.name_as_subdir, started_at)
}

/// Full startup sequence followed by the generation loop.
#[instrument(skip_all, fields(config_dir = %options.paths.config_dir.display()))]
pub fn start_run(options: StartOptions<'_>) -> Result<RunSummary> {
    let (config, client) = load_client(&options.paths)?;
    let elements = load_elements(&options.paths.elements_path)?;
    check_service(&client, &config.credentials())?;

    let output = prepare_output(&config, options.started_at)?;
    let log = RunLog::create(
        &output.dir,
        &RunLogHeader {
            model: &config.model,
            num_images: config.num_images,
            run_name: &config.prompt_name,
            base_prompt: &config.prompt,
        },
    )?;
    info!(
        output_dir = %output.dir.display(),
        run_log = %log.path().display(),
        "run prepared"
    );

    let config_source = FileConfigSource::new(options.paths.config_path.clone());
    let pause = ThreadPause;
    let mut rng = SystemRandom::new();
    run_generation(EngineParts {
        transport: &client,
        pause: &pause,
        config_source: &config_source,
        progress: options.progress,
        rng: &mut rng,
        config,
        elements,
        output,
        log,
        interrupted: options.interrupted,
    })
}
