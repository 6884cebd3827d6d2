//! Generator configuration stored in `config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::Credentials;
use crate::core::types::CategoryToggles;

/// Remote endpoint used when `api_url` is not set.
pub const DEFAULT_API_URL: &str = "https://api.venice.ai/api/v1/image/generate";
/// Credential value written into templates; never accepted at run time.
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";
/// Environment variable that overrides `api_key`.
pub const API_KEY_ENV: &str = "VENICE_API_KEY";

const DEFAULT_DIMENSION: u32 = 1280;
const MIN_STEPS: u32 = 5;
const MAX_STEPS: u32 = 50;

/// Generator configuration (TOML).
///
/// Edited by hand between and during runs; every field except the output
/// location is re-read before each image after the first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub api_key: String,
    /// Image model identifier, e.g. `fluently-xl`, `flux-dev`.
    pub model: String,
    /// Run name: file-name prefix, or subdirectory when `name_as_subdir` is set.
    pub prompt_name: String,
    pub name_as_subdir: bool,
    pub prompt: String,
    pub negative_prompt: String,
    pub num_images: usize,
    /// Base output directory. Empty means `~/Pictures/venice`.
    pub output_dir: Option<PathBuf>,
    /// Attach a random style preset from the element pool to each request.
    pub style: bool,
    pub cfg_min: f64,
    pub cfg_max: f64,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub categories: CategoryToggles,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: API_KEY_PLACEHOLDER.to_string(),
            model: "fluently-xl".to_string(),
            prompt_name: "Hooded Hacker".to_string(),
            name_as_subdir: true,
            prompt: "a modern hacker wearing a hoodie".to_string(),
            negative_prompt: "blur, distort, distorted, blurry, censored, censor, pixelated"
                .to_string(),
            num_images: 23,
            output_dir: None,
            style: true,
            cfg_min: 7.5,
            cfg_max: 15.0,
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            steps: 35,
            categories: CategoryToggles {
                face: true,
                kind: true,
                clothing: true,
                poses: true,
                ..CategoryToggles::default()
            },
        }
    }
}

impl GeneratorConfig {
    /// Replace zero dimensions with the default and clamp steps into range.
    pub fn normalize(&mut self) {
        if self.width == 0 {
            self.width = DEFAULT_DIMENSION;
        }
        if self.height == 0 {
            self.height = DEFAULT_DIMENSION;
        }
        self.steps = self.steps.clamp(MIN_STEPS, MAX_STEPS);
    }

    pub fn validate(&self) -> Result<()> {
        let key = self.api_key.trim();
        if key.is_empty() || key == API_KEY_PLACEHOLDER {
            return Err(anyhow!(
                "no API key configured (set api_key or {API_KEY_ENV})"
            ));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.api_url.trim().is_empty() {
            return Err(anyhow!("api_url must be non-empty"));
        }
        if self.num_images == 0 {
            return Err(anyhow!("num_images must be > 0"));
        }
        if !self.cfg_min.is_finite() || !self.cfg_max.is_finite() {
            return Err(anyhow!("cfg_min and cfg_max must be finite numbers"));
        }
        if self.cfg_min > self.cfg_max {
            return Err(anyhow!(
                "cfg_min ({}) must be <= cfg_max ({})",
                self.cfg_min,
                self.cfg_max
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("width and height must be > 0"));
        }
        if !(MIN_STEPS..=MAX_STEPS).contains(&self.steps) {
            return Err(anyhow!("steps must be within {MIN_STEPS}..={MAX_STEPS}"));
        }
        Ok(())
    }

    /// Endpoint and key for the next remote call.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.api_url, &self.api_key)
    }

    /// Override the credential with a non-empty environment value.
    pub fn apply_api_key_override(&mut self, value: Option<String>) {
        if let Some(key) = value.filter(|key| !key.trim().is_empty()) {
            self.api_key = key;
        }
    }
}

/// Parse, normalize, and validate a config document.
pub fn parse_config(contents: &str) -> Result<GeneratorConfig> {
    let mut cfg: GeneratorConfig = toml::from_str(contents).context("parse config toml")?;
    cfg.normalize();
    cfg.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from a TOML file. A missing file is an error.
pub fn load_config(path: &Path) -> Result<GeneratorConfig> {
    debug!(path = %path.display(), "loading config");
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("load {}", path.display()))
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GeneratorConfig) -> Result<()> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Source of configuration snapshots between iterations.
pub trait ConfigSource {
    /// Re-read the configuration. Errors leave the caller's snapshot in force.
    fn reload(&self) -> Result<GeneratorConfig>;
}

/// Re-reads `config.toml` from disk.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn reload(&self) -> Result<GeneratorConfig> {
        load_config(&self.path)
    }
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> GeneratorConfig {
        GeneratorConfig {
            api_key: "secret".to_string(),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn credentials_follow_the_snapshot() {
        let cfg = GeneratorConfig {
            api_url: "https://proxy.test/generate/".to_string(),
            ..keyed()
        };
        let credentials = cfg.credentials();
        assert_eq!(credentials.endpoint(), "https://proxy.test/generate");
        assert_eq!(credentials.api_key(), "secret");
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = keyed();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded.model, cfg.model);
        assert_eq!(loaded.categories, cfg.categories);
        assert_eq!(loaded.cfg_max, cfg.cfg_max);
    }

    #[test]
    fn load_missing_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_config(&temp.path().join("missing.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));
    }

    #[test]
    fn placeholder_key_is_rejected() {
        let err = GeneratorConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("no API key"));
    }

    #[test]
    fn inverted_cfg_bounds_are_rejected() {
        let cfg = GeneratorConfig {
            cfg_min: 12.0,
            cfg_max: 8.0,
            ..keyed()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn normalize_fills_dimensions_and_clamps_steps() {
        let mut cfg = GeneratorConfig {
            width: 0,
            height: 0,
            steps: 2,
            ..keyed()
        };
        cfg.normalize();
        assert_eq!((cfg.width, cfg.height, cfg.steps), (1280, 1280, 5));
        cfg.steps = 90;
        cfg.normalize();
        assert_eq!(cfg.steps, 50);
    }

    #[test]
    fn partial_document_uses_defaults() {
        let cfg: GeneratorConfig =
            toml::from_str("api_key = \"k\"\nsteps = 20\n[categories]\nhair = true\n")
                .expect("parse");
        assert_eq!(cfg.steps, 20);
        assert!(cfg.categories.hair);
        assert!(!cfg.categories.face);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn env_override_replaces_key_only_when_non_empty() {
        let mut cfg = GeneratorConfig::default();
        cfg.apply_api_key_override(Some("  ".to_string()));
        assert_eq!(cfg.api_key, API_KEY_PLACEHOLDER);
        cfg.apply_api_key_override(Some("from-env".to_string()));
        assert_eq!(cfg.api_key, "from-env");
    }
}
