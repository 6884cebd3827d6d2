//! Element pool stored in `elements.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::ElementPool;

/// Populated phrase set written by `batchgen init`.
pub const DEFAULT_ELEMENTS: &str = include_str!("../../templates/elements.toml");

/// Load the element pool from a TOML file.
pub fn load_elements(path: &Path) -> Result<ElementPool> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let pool: ElementPool =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    debug!(
        path = %path.display(),
        styles = pool.style.len(),
        faces = pool.face.len(),
        "element pool loaded"
    );
    Ok(pool)
}
