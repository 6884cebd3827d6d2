//! Deterministic doubles for the engine's seams, shared by unit and
//! integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::core::random::RandomSource;
use crate::core::types::{GenerationRequest, ProgressEvent, RawResponse};
use crate::core::validator::MIN_IMAGE_BYTES;
use crate::io::client::{ClientError, Credentials, Transport};
use crate::io::config::{ConfigSource, GeneratorConfig};
use crate::io::output::ResolvedOutput;
use crate::io::pacing::Pause;
use crate::io::progress::ProgressSink;
use crate::io::run_log::{RunLog, RunLogHeader};

/// Random source replaying queued values; falls back to `0.0` / index `0`.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    units: VecDeque<f64>,
    indices: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn with_units(units: Vec<f64>) -> Self {
        Self {
            units: units.into(),
            indices: VecDeque::new(),
        }
    }

    pub fn with_indices(indices: Vec<usize>) -> Self {
        Self {
            units: VecDeque::new(),
            indices: indices.into(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn unit(&mut self) -> f64 {
        self.units.pop_front().unwrap_or(0.0)
    }

    fn index(&mut self, len: usize) -> usize {
        self.indices.pop_front().unwrap_or(0) % len.max(1)
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    recorded: RefCell<Vec<Duration>>,
}

impl RecordingPause {
    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded.borrow().clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.recorded.borrow_mut().push(duration);
    }
}

/// One scripted reply from [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Response(RawResponse),
    /// No response at all, as with a refused connection.
    Unreachable,
}

/// Transport replaying queued replies and capturing every request.
///
/// Panics on a call with nothing left in the queue.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<ScriptedReply>>,
    requests: RefCell<Vec<GenerationRequest>>,
    credentials: RefCell<Vec<Credentials>>,
    probe: Option<RawResponse>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
            credentials: RefCell::new(Vec::new()),
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: RawResponse) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.borrow().clone()
    }

    /// Credentials seen by each generate call, in order.
    pub fn credentials(&self) -> Vec<Credentials> {
        self.credentials.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    fn generate(
        &self,
        credentials: &Credentials,
        request: &GenerationRequest,
    ) -> Result<RawResponse, ClientError> {
        self.requests.borrow_mut().push(request.clone());
        self.credentials.borrow_mut().push(credentials.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted generate call #{}", self.calls()));
        match reply {
            ScriptedReply::Response(raw) => Ok(raw),
            ScriptedReply::Unreachable => {
                Err(ClientError::Build("connection refused".to_string()))
            }
        }
    }

    fn probe(&self, _credentials: &Credentials) -> Result<RawResponse, ClientError> {
        self.probe
            .clone()
            .ok_or_else(|| ClientError::Build("connection refused".to_string()))
    }
}

/// Progress sink keeping every snapshot.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: RefCell<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.borrow().clone()
    }
}

impl ProgressSink for CollectingProgress {
    fn publish(&self, event: &ProgressEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Config source replaying queued reload results, then repeating `steady`.
#[derive(Debug)]
pub struct ScriptedConfigSource {
    reloads: RefCell<VecDeque<Result<GeneratorConfig, String>>>,
    steady: GeneratorConfig,
    calls: RefCell<usize>,
}

impl ScriptedConfigSource {
    pub fn steady(config: GeneratorConfig) -> Self {
        Self::new(Vec::new(), config)
    }

    pub fn new(reloads: Vec<Result<GeneratorConfig, String>>, steady: GeneratorConfig) -> Self {
        Self {
            reloads: RefCell::new(reloads.into()),
            steady,
            calls: RefCell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl ConfigSource for ScriptedConfigSource {
    fn reload(&self) -> Result<GeneratorConfig> {
        *self.calls.borrow_mut() += 1;
        match self.reloads.borrow_mut().pop_front() {
            Some(Ok(config)) => Ok(config),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(self.steady.clone()),
        }
    }
}

/// Valid configuration with a real-looking key and no style presets.
pub fn keyed_config(num_images: usize) -> GeneratorConfig {
    GeneratorConfig {
        api_key: "test-key".to_string(),
        prompt_name: "Test Run".to_string(),
        num_images,
        style: false,
        ..GeneratorConfig::default()
    }
}

/// PNG-signed buffer large enough to pass validation.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.resize(MIN_IMAGE_BYTES + 1024, 0xAB);
    bytes
}

/// 200 response carrying the given payloads.
pub fn images_response(payloads: &[Vec<u8>]) -> RawResponse {
    let images: Vec<String> = payloads.iter().map(|bytes| STANDARD.encode(bytes)).collect();
    let body = serde_json::json!({ "images": images });
    RawResponse {
        status: 200,
        body: body.to_string().into_bytes(),
    }
}

/// 200 response with one valid PNG.
pub fn png_response() -> ScriptedReply {
    ScriptedReply::Response(images_response(&[png_bytes()]))
}

/// Non-2xx response with a JSON `error` field.
pub fn error_response(status: u16, error: &str) -> ScriptedReply {
    let body = serde_json::json!({ "error": error });
    ScriptedReply::Response(RawResponse {
        status,
        body: body.to_string().into_bytes(),
    })
}

/// Open a run log in `dir` with a fixed header.
pub fn open_run_log(dir: &Path, config: &GeneratorConfig) -> Result<RunLog> {
    RunLog::create(
        dir,
        &RunLogHeader {
            model: &config.model,
            num_images: config.num_images,
            run_name: &config.prompt_name,
            base_prompt: &config.prompt,
        },
    )
}

/// Temporary output directory used flat, without a run subdirectory.
pub struct TestOutput {
    dir: tempfile::TempDir,
}

impl TestOutput {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp output dir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn resolved(&self) -> ResolvedOutput {
        ResolvedOutput {
            dir: self.dir.path().to_path_buf(),
            use_subdir: false,
        }
    }
}
