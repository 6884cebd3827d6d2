//! Collision-free image file names.
//!
//! Composition is pure; the caller probes the filesystem and bumps the
//! sub-counter until a free name is found.

/// Maximum length of the sanitized run-name component.
pub const MAX_NAME_LEN: usize = 200;
/// Name component used when images land in a per-run subdirectory.
pub const SUBDIR_NAME: &str = "image";

/// Reduce `raw` to `[A-Za-z0-9_]`, collapse underscore runs, trim underscores at
/// both ends, and truncate to [`MAX_NAME_LEN`].
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let mapped = if ch.is_ascii_alphanumeric() { ch } else { '_' };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches('_');
    // Output is ASCII, so byte truncation is char-safe.
    trimmed[..trimmed.len().min(MAX_NAME_LEN)].to_string()
}

/// Stable parts of an image file name; only the sub-counter varies.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStem {
    pub name: String,
    /// 1-based image ordinal.
    pub ordinal: usize,
    pub seed: i64,
    pub cfg_scale: f64,
}

impl FileStem {
    /// Build the stem for image `index` (0-based) of a run.
    ///
    /// `use_subdir` selects the fixed [`SUBDIR_NAME`] instead of the run name.
    pub fn new(run_name: &str, use_subdir: bool, index: usize, seed: i64, cfg_scale: f64) -> Self {
        let name = if use_subdir {
            SUBDIR_NAME.to_string()
        } else {
            let clean = sanitize_name(run_name);
            if clean.is_empty() {
                SUBDIR_NAME.to_string()
            } else {
                clean
            }
        };
        Self {
            name,
            ordinal: index + 1,
            seed,
            cfg_scale,
        }
    }

    /// `<name>-<ordinal>.<counter>_seed<seed>_scale<cfg>.png`
    pub fn file_name(&self, counter: u32) -> String {
        format!(
            "{}-{}.{}_seed{}_scale{:.2}.png",
            self.name, self.ordinal, counter, self.seed, self.cfg_scale
        )
    }
}
