//! Output directory resolution and collision-free image persistence.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::naming::FileStem;

/// Output location fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub dir: PathBuf,
    /// Images are written into a per-run subdirectory.
    pub use_subdir: bool,
}

/// Resolve (and create) the run's output directory.
///
/// With `name_as_subdir` and a non-empty run name the directory is
/// `<base>/<name>`; when that directory already exists, `<base>/<name>_<unix>`
/// is used instead so two runs never share a directory.
pub fn resolve_output_dir(
    base: &Path,
    run_name: &str,
    name_as_subdir: bool,
    unix_ts: i64,
) -> Result<ResolvedOutput> {
    let use_subdir = name_as_subdir && !run_name.is_empty();
    let dir = if use_subdir {
        let candidate = base.join(run_name);
        if candidate.is_dir() {
            base.join(format!("{run_name}_{unix_ts}"))
        } else {
            candidate
        }
    } else {
        base.to_path_buf()
    };
    fs::create_dir_all(&dir).with_context(|| format!("create output dir {}", dir.display()))?;
    Ok(ResolvedOutput { dir, use_subdir })
}

/// `~/Pictures/venice`.
pub fn default_output_base() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("Pictures").join("venice"))
        .ok_or_else(|| anyhow!("cannot determine home directory (set output_dir)"))
}

/// A persisted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub file_name: String,
}

/// Write `bytes` under the first free name for `stem`, bumping the
/// sub-counter on every collision. Never overwrites an existing file.
pub fn save_image(dir: &Path, stem: &FileStem, bytes: &[u8]) -> Result<SavedImage> {
    let mut counter = 0u32;
    loop {
        let file_name = stem.file_name(counter);
        let path = dir.join(&file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)
                    .and_then(|()| file.flush())
                    .with_context(|| format!("write image {}", path.display()))?;
                debug!(path = %path.display(), bytes = bytes.len(), "image written");
                return Ok(SavedImage { path, file_name });
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                counter += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("create image {}", path.display()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stem() -> FileStem {
        FileStem::new("Night Market", false, 0, 4242, 11.25)
    }

    #[test]
    fn colliding_saves_bump_the_sub_counter() {
        let temp = tempfile::tempdir().expect("tempdir");

        let first = save_image(temp.path(), &stem(), b"one").expect("first");
        let second = save_image(temp.path(), &stem(), b"two").expect("second");

        assert_eq!(first.file_name, "Night_Market-1.0_seed4242_scale11.25.png");
        assert_eq!(second.file_name, "Night_Market-1.1_seed4242_scale11.25.png");
        assert_eq!(fs::read(&first.path).expect("read"), b"one");
    }

    #[test]
    fn n_colliding_saves_produce_n_distinct_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut paths = std::collections::HashSet::new();
        for n in 0..12 {
            let saved = save_image(temp.path(), &stem(), &[n]).expect("save");
            assert!(paths.insert(saved.path));
        }
        assert_eq!(fs::read_dir(temp.path()).expect("list").count(), 12);
    }

    #[test]
    fn subdir_is_created_when_free() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = resolve_output_dir(temp.path(), "Hooded Hacker", true, 1_700_000_000)
            .expect("resolve");
        assert_eq!(out.dir, temp.path().join("Hooded Hacker"));
        assert!(out.use_subdir);
        assert!(out.dir.is_dir());
    }

    #[test]
    fn existing_subdir_is_disambiguated_with_timestamp() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("Hooded Hacker")).expect("seed");

        let out = resolve_output_dir(temp.path(), "Hooded Hacker", true, 1_700_000_000)
            .expect("resolve");

        assert_eq!(out.dir, temp.path().join("Hooded Hacker_1700000000"));
        assert!(out.dir.is_dir());
    }

    #[test]
    fn empty_name_or_flag_off_uses_base() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = resolve_output_dir(temp.path(), "", true, 1).expect("resolve");
        assert_eq!(out.dir, temp.path());
        assert!(!out.use_subdir);
        let out = resolve_output_dir(temp.path(), "named", false, 1).expect("resolve");
        assert_eq!(out.dir, temp.path());
        assert!(!out.use_subdir);
    }
}
