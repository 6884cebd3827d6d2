//! Append-only plain-text log of a run (`PromptLog.txt`).
//!
//! Product artifact, always written. Unaffected by `RUST_LOG`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// File name of the run log inside the output directory.
pub const RUN_LOG_FILE: &str = "PromptLog.txt";

const RULE: &str = "--------------------------------------------------------------------------------";

/// Header fields written once when the log is created.
#[derive(Debug, Clone)]
pub struct RunLogHeader<'a> {
    pub model: &'a str,
    pub num_images: usize,
    pub run_name: &'a str,
    pub base_prompt: &'a str,
}

/// One saved image.
#[derive(Debug, Clone)]
pub struct ImageEntry<'a> {
    pub file_name: &'a str,
    pub style_preset: Option<&'a str>,
    /// Enhancement phrases beyond the base prompt.
    pub elements: &'a str,
}

/// Sequential writer; every append is flushed before returning.
pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    /// Create a fresh log in `dir` and write the header.
    pub fn create(dir: &Path, header: &RunLogHeader<'_>) -> Result<Self> {
        let path = dir.join(RUN_LOG_FILE);
        let file =
            File::create(&path).with_context(|| format!("create run log {}", path.display()))?;
        let mut log = Self {
            path,
            writer: BufWriter::new(file),
        };
        let model = format!("Model: {}", header.model);
        let image_count = format!("\nImage count: {}", header.num_images);
        let run_name = format!("\nPrompt Name: {}", header.run_name);
        let base_prompt = format!("\nBase Prompt: {}", header.base_prompt);
        log.append(&[
            model.as_str(),
            image_count.as_str(),
            run_name.as_str(),
            base_prompt.as_str(),
            "\n\nBelow are the prompt enhancements for each image result.",
            "\n",
            RULE,
        ])?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a saved image as its own block.
    pub fn record_image(&mut self, entry: &ImageEntry<'_>) -> Result<()> {
        let mut fragments: Vec<&str> = vec!["\n\n=====> File: ", entry.file_name];
        if let Some(style) = entry.style_preset.filter(|style| !style.is_empty()) {
            fragments.extend(["\nImage Style: ", style]);
        }
        if !entry.elements.is_empty() {
            fragments.extend(["\nElements:    ", entry.elements]);
        }
        self.append(&fragments)
    }

    pub fn record_error(&mut self, message: &str) -> Result<()> {
        self.append(&["\n\nERROR: ", message])
    }

    /// Closing line written when the loop ends.
    pub fn record_stop(&mut self, summary: &str) -> Result<()> {
        self.append(&["\n\n", RULE, "\n", summary, "\n"])
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("flush run log {}", self.path.display()))
    }

    fn append(&mut self, fragments: &[&str]) -> Result<()> {
        for fragment in fragments {
            if let Err(err) = self.writer.write_all(fragment.as_bytes()) {
                // Keep whatever made it into the buffer.
                let _ = self.writer.flush();
                return Err(err)
                    .with_context(|| format!("append to run log {}", self.path.display()));
            }
        }
        self.flush()
    }
}
