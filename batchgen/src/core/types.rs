//! Shared data types passed between the engine, core logic, and adapters.
//!
//! These types carry no behavior beyond construction helpers and must stay
//! free of I/O.

use serde::{Deserialize, Serialize};

/// Phrase categories that contribute at most one phrase each to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Face,
    Type,
    Hair,
    Eyes,
    Clothing,
    Background,
    Poses,
    Accessories,
}

impl Category {
    /// Evaluation order for prompt enhancement. Stable across releases.
    pub const ORDER: [Category; 8] = [
        Category::Face,
        Category::Type,
        Category::Hair,
        Category::Eyes,
        Category::Clothing,
        Category::Background,
        Category::Poses,
        Category::Accessories,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Face => "Face",
            Category::Type => "Type",
            Category::Hair => "Hair",
            Category::Eyes => "Eyes",
            Category::Clothing => "Clothing",
            Category::Background => "Backgrnd",
            Category::Poses => "Poses",
            Category::Accessories => "Accesry",
        }
    }
}

/// Per-category enable flags (`[categories]` in `config.toml`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryToggles {
    pub face: bool,
    #[serde(rename = "type")]
    pub kind: bool,
    pub hair: bool,
    pub eyes: bool,
    pub clothing: bool,
    pub background: bool,
    pub poses: bool,
    pub accessories: bool,
    /// Explicit-content marker and phrases.
    pub explicit: bool,
}

impl CategoryToggles {
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Face => self.face,
            Category::Type => self.kind,
            Category::Hair => self.hair,
            Category::Eyes => self.eyes,
            Category::Clothing => self.clothing,
            Category::Background => self.background,
            Category::Poses => self.poses,
            Category::Accessories => self.accessories,
        }
    }
}

/// Candidate phrases per category, plus style presets and explicit phrases.
///
/// Immutable for the duration of a run once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementPool {
    pub style: Vec<String>,
    pub face: Vec<String>,
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub hair: Vec<String>,
    pub eyes: Vec<String>,
    pub clothing: Vec<String>,
    pub backgrounds: Vec<String>,
    pub poses: Vec<String>,
    pub accessories: Vec<String>,
    pub explicit: Vec<String>,
}

impl ElementPool {
    pub fn phrases(&self, category: Category) -> &[String] {
        match category {
            Category::Face => &self.face,
            Category::Type => &self.kind,
            Category::Hair => &self.hair,
            Category::Eyes => &self.eyes,
            Category::Clothing => &self.clothing,
            Category::Background => &self.backgrounds,
            Category::Poses => &self.poses,
            Category::Accessories => &self.accessories,
        }
    }
}

/// JSON body of a generation call.
///
/// The watermark, response-format, and safety flags are fixed by
/// [`GenerationRequest::new`] and never taken from configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub hide_watermark: bool,
    pub return_binary: bool,
    pub safe_mode: bool,
    pub cfg_scale: f64,
    pub negative_prompt: String,
    pub seed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_preset: Option<String>,
}

/// Variable inputs for a [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct RequestParams {
    pub model: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub seed: i64,
    pub style_preset: Option<String>,
}

impl GenerationRequest {
    pub fn new(params: RequestParams) -> Self {
        Self {
            model: params.model,
            prompt: params.prompt,
            width: params.width,
            height: params.height,
            steps: params.steps,
            hide_watermark: true,
            return_binary: false,
            safe_mode: false,
            cfg_scale: params.cfg_scale,
            negative_prompt: params.negative_prompt,
            seed: params.seed,
            style_preset: params.style_preset.filter(|style| !style.is_empty()),
        }
    }
}

/// Successful response body: base64 payloads in order.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub images: Vec<String>,
}

/// Status and body of a completed HTTP exchange, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Plain snapshot handed to progress observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// 1-based ordinal of the image being worked on.
    pub current: usize,
    pub total: usize,
    pub produced: usize,
    pub failed_attempts: u32,
    pub status: String,
    pub model: String,
    pub style_preset: Option<String>,
    pub cfg_scale: f64,
    pub base_prompt: String,
    pub elements: String,
    pub explicit: String,
    pub toggles: CategoryToggles,
    pub output_dir: String,
    pub last_error: Option<String>,
}

impl ProgressEvent {
    /// Completion percentage for the current ordinal, capped at 100.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        (self.current * 100 / self.total).min(100)
    }
}
