//! The generation loop.
//!
//! One sequential flow of control issues every remote call, validates every
//! payload, and performs every file write. Each iteration ends in an
//! [`IterationOutcome`] that the loop alone uses to move the image index.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::cfg_scale::sample_cfg_scale;
use crate::core::classifier::{
    BREAKER_THRESHOLD, Classification, MAX_ATTEMPTS, RATE_LIMIT_INTERVAL, RetryAction,
    classify_response,
};
use crate::core::enhancer::{Enhancement, enhance_prompt};
use crate::core::naming::FileStem;
use crate::core::random::{RandomSource, pick};
use crate::core::types::{
    ElementPool, GenerateResponse, GenerationRequest, ProgressEvent, RequestParams,
};
use crate::core::validator::{ValidationFailure, decode_payload, validate_image};
use crate::io::client::Transport;
use crate::io::config::{ConfigSource, GeneratorConfig};
use crate::io::output::{ResolvedOutput, save_image};
use crate::io::pacing::{Pause, RateLimiter};
use crate::io::progress::ProgressSink;
use crate::io::run_log::{ImageEntry, RunLog};

/// Longest prompt (in characters) that will be submitted.
pub const MAX_PROMPT_LEN: usize = 1250;
const SEED_MODULUS: i64 = 99_999_999;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every requested image index was processed.
    Completed,
    /// The interrupt flag was observed at a loop boundary.
    Interrupted,
    /// Cumulative failed attempts reached the breaker threshold.
    CircuitOpen,
    /// The service rejected the credential.
    AuthRejected,
}

impl StopReason {
    pub fn describe(self) -> &'static str {
        match self {
            StopReason::Completed => "Generation complete",
            StopReason::Interrupted => "Run interrupted",
            StopReason::CircuitOpen => "Stopped after repeated failures",
            StopReason::AuthRejected => "Stopped: authentication failed",
        }
    }
}

/// How one iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// At least one image was persisted; advance.
    Saved,
    /// Nothing was persisted but the image is given up; advance.
    NextIndex,
    /// Re-issue the same image index.
    RetrySameIndex,
    /// End the run.
    Stop(StopReason),
}

/// Mutable counters owned by the loop.
///
/// `interrupted` is the only field written from outside the loop.
#[derive(Debug)]
pub struct RunContext {
    /// 0-based index of the image being produced.
    pub index: usize,
    /// Iterations started, retries included.
    pub iterations: usize,
    pub produced: usize,
    /// Cumulative failed attempts; trips the breaker.
    pub failed_attempts: u32,
    pub last_error: Option<String>,
    interrupted: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new(interrupted: Arc<AtomicBool>) -> Self {
        Self {
            index: 0,
            iterations: 0,
            produced: 0,
            failed_attempts: 0,
            last_error: None,
            interrupted,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn breaker_open(&self) -> bool {
        self.failed_attempts >= BREAKER_THRESHOLD
    }

    /// Early-stop reason, checked before every remote call.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.is_interrupted() {
            Some(StopReason::Interrupted)
        } else if self.breaker_open() {
            Some(StopReason::CircuitOpen)
        } else {
            None
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub produced: usize,
    pub failed_attempts: u32,
    pub stop: StopReason,
}

/// Everything the engine needs; built once at startup.
pub struct EngineParts<'a, T, P> {
    pub transport: &'a T,
    pub pause: &'a P,
    pub config_source: &'a dyn ConfigSource,
    pub progress: &'a dyn ProgressSink,
    pub rng: &'a mut dyn RandomSource,
    pub config: GeneratorConfig,
    pub elements: ElementPool,
    pub output: ResolvedOutput,
    pub log: RunLog,
    pub interrupted: Arc<AtomicBool>,
}

/// Per-image values shown to progress observers.
#[derive(Debug, Clone, Default)]
struct ActiveImage {
    style: Option<String>,
    enhancement: Option<Enhancement>,
    cfg_scale: f64,
}

/// Orchestrates prompt construction, remote calls, validation, and persistence.
pub struct GenerationEngine<'a, T, P> {
    transport: &'a T,
    pause: &'a P,
    config_source: &'a dyn ConfigSource,
    progress: &'a dyn ProgressSink,
    rng: &'a mut dyn RandomSource,
    config: GeneratorConfig,
    elements: ElementPool,
    output: ResolvedOutput,
    log: RunLog,
    limiter: RateLimiter,
    ctx: RunContext,
    active: ActiveImage,
}

impl<'a, T: Transport, P: Pause> GenerationEngine<'a, T, P> {
    pub fn new(parts: EngineParts<'a, T, P>) -> Self {
        Self {
            transport: parts.transport,
            pause: parts.pause,
            config_source: parts.config_source,
            progress: parts.progress,
            rng: parts.rng,
            config: parts.config,
            elements: parts.elements,
            output: parts.output,
            log: parts.log,
            limiter: RateLimiter::new(RATE_LIMIT_INTERVAL),
            ctx: RunContext::new(parts.interrupted),
            active: ActiveImage::default(),
        }
    }

    /// Run until every image is processed or an early-stop condition holds.
    ///
    /// The run log is flushed before returning in every case.
    #[instrument(skip_all)]
    pub fn run(mut self) -> Result<RunSummary> {
        info!(
            model = %self.config.model,
            total = self.config.num_images,
            output_dir = %self.output.dir.display(),
            "run started"
        );
        let stop = loop {
            if self.ctx.index >= self.config.num_images {
                break StopReason::Completed;
            }
            if let Some(stop) = self.ctx.stop_reason() {
                break stop;
            }
            match self.run_iteration() {
                IterationOutcome::Saved | IterationOutcome::NextIndex => self.ctx.index += 1,
                IterationOutcome::RetrySameIndex => {}
                IterationOutcome::Stop(stop) => break stop,
            }
        };

        let summary = RunSummary {
            produced: self.ctx.produced,
            failed_attempts: self.ctx.failed_attempts,
            stop,
        };
        info!(
            produced = summary.produced,
            failed = summary.failed_attempts,
            stop = ?summary.stop,
            "run finished"
        );
        let closing = format!(
            "{}: {} of {} images saved, {} failed attempts",
            stop.describe(),
            summary.produced,
            self.config.num_images,
            summary.failed_attempts
        );
        if let Err(err) = self.log.record_stop(&closing) {
            warn!(error = %format!("{err:#}"), "failed to write closing log line");
        }
        self.log.flush()?;
        Ok(summary)
    }

    fn run_iteration(&mut self) -> IterationOutcome {
        if self.ctx.iterations > 0 {
            self.reload_config();
        }
        self.ctx.iterations += 1;
        let index = self.ctx.index;

        let style = if self.config.style {
            pick(&mut *self.rng, &self.elements.style).map(str::to_string)
        } else {
            None
        };
        let enhancement = enhance_prompt(
            &mut *self.rng,
            &self.config.prompt,
            &self.config.categories,
            &self.elements,
        );
        let cfg_scale = sample_cfg_scale(&mut *self.rng, self.config.cfg_min, self.config.cfg_max);
        let seed = attempt_seed(wall_clock_nanos(), index);
        self.active = ActiveImage {
            style: style.clone(),
            enhancement: Some(enhancement.clone()),
            cfg_scale,
        };
        debug!(index, seed, cfg_scale, explicit = %enhancement.explicit, "iteration prepared");
        self.publish("Generating...");

        if enhancement.prompt.chars().count() > MAX_PROMPT_LEN {
            self.note_error("Prompt too complex, consider simplifying");
            return IterationOutcome::NextIndex;
        }

        let request = GenerationRequest::new(RequestParams {
            model: self.config.model.clone(),
            prompt: enhancement.prompt.clone(),
            negative_prompt: self.config.negative_prompt.clone(),
            width: self.config.width,
            height: self.config.height,
            steps: self.config.steps,
            cfg_scale,
            seed,
            style_preset: style,
        });
        self.attempt_generation(&request, &enhancement)
    }

    /// Bounded retry loop for one image.
    fn attempt_generation(
        &mut self,
        request: &GenerationRequest,
        enhancement: &Enhancement,
    ) -> IterationOutcome {
        for attempt in 1..=MAX_ATTEMPTS {
            if let Some(stop) = self.ctx.stop_reason() {
                return IterationOutcome::Stop(stop);
            }
            if attempt > 1 {
                self.publish(&format!("Retrying request (attempt {attempt}/{MAX_ATTEMPTS})..."));
            }
            self.limiter.acquire(self.pause);
            debug!(attempt, "sending generation request");
            let credentials = self.config.credentials();
            let classification = match self.transport.generate(&credentials, request) {
                Ok(raw) => classify_response(&raw),
                Err(err) => Classification::Transport(err.to_string()),
            };
            for message in classification.messages() {
                self.note_error(&message);
            }

            match classification.action() {
                RetryAction::Proceed => {
                    if let Classification::Success(response) = classification {
                        if let Some(outcome) = self.persist(&response, request, enhancement) {
                            return outcome;
                        }
                    }
                }
                RetryAction::Abort => return IterationOutcome::Stop(StopReason::AuthRejected),
                RetryAction::RetrySameIndex {
                    delay,
                    counts_failure,
                } => {
                    self.count_failure(counts_failure);
                    self.back_off(delay);
                    return IterationOutcome::RetrySameIndex;
                }
                RetryAction::NextAttempt {
                    delay,
                    counts_failure,
                } => {
                    self.count_failure(counts_failure);
                    self.back_off(delay);
                }
            }
        }

        if let Some(stop) = self.ctx.stop_reason() {
            return IterationOutcome::Stop(stop);
        }
        self.note_error(&format!(
            "Giving up on image {} after {MAX_ATTEMPTS} attempts",
            self.ctx.index + 1
        ));
        IterationOutcome::NextIndex
    }

    /// Validate and store every payload in `response`.
    ///
    /// Returns `None` when no payload could even be decoded, so the caller
    /// spends another attempt.
    fn persist(
        &mut self,
        response: &GenerateResponse,
        request: &GenerationRequest,
        enhancement: &Enhancement,
    ) -> Option<IterationOutcome> {
        let mut saved_any = false;
        let mut rejected = false;
        let mut dropped = false;

        for encoded in &response.images {
            let bytes = match decode_payload(encoded) {
                Ok(bytes) => bytes,
                Err(failure) => {
                    self.note_error(&failure.to_string());
                    continue;
                }
            };
            debug!(bytes = bytes.len(), "decoded image");

            if let Err(failure) = validate_image(&bytes) {
                if let ValidationFailure::Undersized { content_type, .. } = &failure {
                    if failure.is_format_mismatch() {
                        self.note_error(&format!(
                            "Unexpected file format: {content_type} (expected PNG)"
                        ));
                    }
                }
                self.note_error(&failure.to_string());
                self.ctx.failed_attempts += 1;
                rejected = true;
                continue;
            }

            let stem = FileStem::new(
                &self.config.prompt_name,
                self.output.use_subdir,
                self.ctx.index,
                request.seed,
                request.cfg_scale,
            );
            match save_image(&self.output.dir, &stem, &bytes) {
                Ok(saved) => {
                    info!(file = %saved.file_name, bytes = bytes.len(), "image saved");
                    if let Err(err) = self.log.record_image(&ImageEntry {
                        file_name: &saved.file_name,
                        style_preset: request.style_preset.as_deref(),
                        elements: &enhancement.elements,
                    }) {
                        warn!(error = %format!("{err:#}"), "failed to log saved image");
                    }
                    self.ctx.produced += 1;
                    saved_any = true;
                }
                Err(err) => {
                    self.note_error(&format!("Error saving image: {err:#}"));
                    dropped = true;
                }
            }
        }

        if saved_any {
            self.ctx.last_error = None;
            self.publish("Image saved");
            Some(IterationOutcome::Saved)
        } else if rejected {
            Some(IterationOutcome::RetrySameIndex)
        } else if dropped {
            Some(IterationOutcome::NextIndex)
        } else {
            None
        }
    }

    fn reload_config(&mut self) {
        match self.config_source.reload() {
            Ok(fresh) => {
                debug!("configuration reloaded");
                self.config = fresh;
            }
            Err(err) => self.note_error(&format!("Error reloading config: {err:#}")),
        }
    }

    fn count_failure(&mut self, counts: bool) {
        if counts {
            self.ctx.failed_attempts += 1;
        }
    }

    /// Backoff pause, skipped once the run is going to stop anyway.
    fn back_off(&self, delay: std::time::Duration) {
        if self.ctx.stop_reason().is_none() {
            self.pause.pause(delay);
        }
    }

    /// Record a non-fatal error: last-error indicator, run log, observers.
    fn note_error(&mut self, message: &str) {
        warn!(index = self.ctx.index, "{message}");
        self.ctx.last_error = Some(message.to_string());
        if let Err(err) = self.log.record_error(message) {
            warn!(error = %format!("{err:#}"), "failed to log error");
        }
        self.publish("Error occurred");
    }

    fn publish(&self, status: &str) {
        let (elements, explicit) = match &self.active.enhancement {
            Some(enhancement) => (enhancement.elements.clone(), enhancement.explicit.clone()),
            None => (String::new(), String::new()),
        };
        self.progress.publish(&ProgressEvent {
            current: self.ctx.index + 1,
            total: self.config.num_images,
            produced: self.ctx.produced,
            failed_attempts: self.ctx.failed_attempts,
            status: status.to_string(),
            model: self.config.model.clone(),
            style_preset: self.active.style.clone(),
            cfg_scale: self.active.cfg_scale,
            base_prompt: self.config.prompt.clone(),
            elements,
            explicit,
            toggles: self.config.categories,
            output_dir: self.output.dir.display().to_string(),
            last_error: self.ctx.last_error.clone(),
        });
    }
}

/// Drive a whole run with the given collaborators.
pub fn run_generation<T: Transport, P: Pause>(parts: EngineParts<'_, T, P>) -> Result<RunSummary> {
    GenerationEngine::new(parts).run()
}

/// Per-attempt seed: wall-clock nanoseconds folded below 10^8, offset by index.
pub fn attempt_seed(now_nanos: i64, index: usize) -> i64 {
    now_nanos.rem_euclid(SEED_MODULUS) + index as i64
}

fn wall_clock_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}
