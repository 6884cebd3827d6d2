//! Configuration directory layout and first-run scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{GeneratorConfig, write_config};
use super::elements::DEFAULT_ELEMENTS;

/// Canonical paths within the configuration directory.
#[derive(Debug, Clone)]
pub struct GeneratorPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub elements_path: PathBuf,
}

impl GeneratorPaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            config_path: config_dir.join("config.toml"),
            elements_path: config_dir.join("elements.toml"),
            config_dir,
        }
    }

    /// `$HOME/.venice`.
    pub fn default_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".venice"))
            .ok_or_else(|| anyhow!("cannot determine home directory (pass --config-dir)"))
    }
}

/// Options for [`init_generator`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overwrite existing files.
    pub force: bool,
    /// Credential to seed into the config template.
    pub api_key: Option<String>,
}

/// What [`init_generator`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub wrote_config: bool,
    pub wrote_elements: bool,
}

/// Create the configuration directory with `config.toml` and `elements.toml`
/// templates. Existing files are kept unless `options.force` is set.
pub fn init_generator(paths: &GeneratorPaths, options: &InitOptions) -> Result<InitReport> {
    if paths.config_dir.exists() && !paths.config_dir.is_dir() {
        return Err(anyhow!(
            "{} exists but is not a directory",
            paths.config_dir.display()
        ));
    }
    fs::create_dir_all(&paths.config_dir)
        .with_context(|| format!("create directory {}", paths.config_dir.display()))?;

    let wrote_elements = if options.force || !paths.elements_path.exists() {
        write_file(&paths.elements_path, DEFAULT_ELEMENTS)?;
        true
    } else {
        false
    };

    let wrote_config = if options.force || !paths.config_path.exists() {
        let mut cfg = GeneratorConfig::default();
        if let Some(key) = options.api_key.as_ref().filter(|key| !key.trim().is_empty()) {
            cfg.api_key = key.trim().to_string();
        }
        write_config(&paths.config_path, &cfg)?;
        true
    } else {
        false
    };

    Ok(InitReport {
        wrote_config,
        wrote_elements,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use crate::io::elements::load_elements;

    #[test]
    fn init_writes_both_templates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = GeneratorPaths::new(temp.path().join(".venice"));

        let report = init_generator(
            &paths,
            &InitOptions {
                force: false,
                api_key: Some("k-123".to_string()),
            },
        )
        .expect("init");

        assert_eq!(
            report,
            InitReport {
                wrote_config: true,
                wrote_elements: true
            }
        );
        let cfg = load_config(&paths.config_path).expect("config");
        assert_eq!(cfg.api_key, "k-123");
        let pool = load_elements(&paths.elements_path).expect("elements");
        assert!(!pool.clothing.is_empty());
    }

    #[test]
    fn init_keeps_existing_files_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = GeneratorPaths::new(temp.path());
        fs::write(&paths.elements_path, "face = [\"mine\"]\n").expect("seed");

        let report = init_generator(&paths, &InitOptions::default()).expect("init");

        assert!(!report.wrote_elements);
        assert!(report.wrote_config);
        let kept = fs::read_to_string(&paths.elements_path).expect("read");
        assert_eq!(kept, "face = [\"mine\"]\n");
    }

    #[test]
    fn init_force_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = GeneratorPaths::new(temp.path());
        fs::write(&paths.elements_path, "face = [\"mine\"]\n").expect("seed");

        let report = init_generator(
            &paths,
            &InitOptions {
                force: true,
                api_key: None,
            },
        )
        .expect("init");

        assert!(report.wrote_elements);
        assert_ne!(
            fs::read_to_string(&paths.elements_path).expect("read"),
            "face = [\"mine\"]\n"
        );
    }
}
