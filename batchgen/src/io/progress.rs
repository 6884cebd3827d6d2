//! Progress sinks: the engine publishes plain snapshots, sinks render them.

use std::cell::RefCell;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

use crate::core::types::{Category, ProgressEvent};

/// Receiver of progress snapshots.
pub trait ProgressSink {
    fn publish(&self, event: &ProgressEvent);
}

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:35.cyan/blue}] {pos}/{len} ({percent}%) {wide_msg}";
const PROMPT_WIDTH: usize = 65;
const INDENT: &str = "          ";

/// Interactive view: one `indicatif` bar over the batch, with the run
/// settings and each image's prompt printed above it.
pub struct TerminalProgress {
    bar: ProgressBar,
    shown: RefCell<Shown>,
}

/// Blocks already printed above the bar.
#[derive(Default)]
struct Shown {
    settings: Option<String>,
    image: Option<String>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Same view drawn to `target`; `ProgressDrawTarget::hidden()` in tests.
    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self::with_bar(ProgressBar::with_draw_target(Some(0), target))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self {
            bar,
            shown: RefCell::new(Shown::default()),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    /// Print `block` above the bar unless it equals `last`.
    fn print_if_changed(&self, last: &mut Option<String>, block: String) {
        if last.as_deref() != Some(block.as_str()) {
            self.bar.println(&block);
            *last = Some(block);
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn publish(&self, event: &ProgressEvent) {
        let mut shown = self.shown.borrow_mut();
        self.print_if_changed(&mut shown.settings, settings_block(event));
        self.print_if_changed(&mut shown.image, image_block(event));
        self.bar.set_length(event.total as u64);
        self.bar.set_position(event.current.min(event.total) as u64);
        self.bar.set_message(status_message(event));
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        self.bar.finish();
    }
}

/// Emits one `info!` line per snapshot; for non-interactive output.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn publish(&self, event: &ProgressEvent) {
        info!(
            current = event.current,
            total = event.total,
            percent = event.percent(),
            produced = event.produced,
            failed = event.failed_attempts,
            cfg_scale = event.cfg_scale,
            style = event.style_preset.as_deref().unwrap_or(""),
            elements = %event.elements,
            last_error = event.last_error.as_deref().unwrap_or(""),
            "{}",
            event.status
        );
    }
}

/// Bar message: status, counters, and the last error.
pub fn status_message(event: &ProgressEvent) -> String {
    format!(
        "{} | produced {} | failed {} | error: {}",
        event.status,
        event.produced,
        event.failed_attempts,
        event.last_error.as_deref().unwrap_or("None")
    )
}

/// Settings that only change on a config reload: model, output, toggles.
pub fn settings_block(event: &ProgressEvent) -> String {
    let mut lines = vec![
        format!("Model:    {}", event.model),
        format!("Output:   {}", event.output_dir),
    ];
    for category in Category::ORDER {
        lines.push(format!(
            "{:<10}{}",
            format!("{}:", category.label()),
            toggle_label(event.toggles.is_enabled(category))
        ));
    }
    lines.push(format!("Explicit: {}", toggle_label(event.toggles.explicit)));
    if !event.explicit.is_empty() {
        lines.push(format!("{INDENT}{}", event.explicit));
    }
    lines.join("\n")
}

/// Per-image details: ordinal, wrapped prompt, style, and guidance.
pub fn image_block(event: &ProgressEvent) -> String {
    let full_prompt = match (event.base_prompt.is_empty(), event.elements.is_empty()) {
        (_, true) => event.base_prompt.clone(),
        (true, false) => event.elements.clone(),
        (false, false) => format!("{}, {}", event.base_prompt, event.elements),
    };
    let mut lines = vec![format!("Image {}/{}", event.current, event.total)];
    for (row, text) in wrap_prompt(&full_prompt).iter().enumerate() {
        let lead = if row == 0 { "Prompt:   " } else { INDENT };
        lines.push(format!("{lead}{text}"));
    }
    lines.push(format!(
        "Style:    {}",
        event.style_preset.as_deref().unwrap_or("")
    ));
    lines.push(format!("Config:   {:.2}", event.cfg_scale));
    lines.join("\n")
}

fn toggle_label(enabled: bool) -> &'static str {
    if enabled { "Enabled" } else { "Disabled" }
}

/// Pack comma-separated phrases into lines of at most `PROMPT_WIDTH` chars.
fn wrap_prompt(prompt: &str) -> Vec<String> {
    let mut rows: Vec<String> = Vec::new();
    let mut current = String::new();
    for phrase in prompt.split(", ").filter(|phrase| !phrase.is_empty()) {
        let extra = if current.is_empty() { 0 } else { 2 };
        if !current.is_empty() && current.len() + extra + phrase.len() > PROMPT_WIDTH {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(", ");
        }
        current.push_str(phrase);
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CategoryToggles;

    fn event() -> ProgressEvent {
        ProgressEvent {
            current: 3,
            total: 12,
            produced: 2,
            failed_attempts: 1,
            status: "Generating...".to_string(),
            model: "fluently-xl".to_string(),
            style_preset: Some("Anime".to_string()),
            cfg_scale: 9.5,
            base_prompt: "a modern hacker wearing a hoodie".to_string(),
            elements: "scar, leather jacket".to_string(),
            explicit: String::new(),
            toggles: CategoryToggles {
                face: true,
                clothing: true,
                ..CategoryToggles::default()
            },
            output_dir: "/tmp/out".to_string(),
            last_error: None,
        }
    }

    #[test]
    fn settings_block_lists_model_output_and_toggles() {
        let block = settings_block(&event());
        assert!(block.starts_with("Model:    fluently-xl\nOutput:   /tmp/out"));
        assert!(block.contains("Face:     Enabled"));
        assert!(block.contains("Hair:     Disabled"));
        assert!(block.contains("Backgrnd: Disabled"));
        assert!(block.ends_with("Explicit: Disabled"));
    }

    #[test]
    fn image_block_shows_prompt_style_and_guidance() {
        let block = image_block(&event());
        assert!(block.starts_with("Image 3/12\n"));
        assert!(block.contains("Prompt:   a modern hacker wearing a hoodie, scar, leather jacket"));
        assert!(block.contains("Style:    Anime"));
        assert!(block.contains("Config:   9.50"));
    }

    #[test]
    fn status_message_carries_last_error() {
        assert_eq!(
            status_message(&event()),
            "Generating... | produced 2 | failed 1 | error: None"
        );
        let mut ev = event();
        ev.last_error = Some("Server error - will retry".to_string());
        assert!(status_message(&ev).ends_with("error: Server error - will retry"));
    }

    #[test]
    fn bar_tracks_current_image_and_total() {
        let progress = TerminalProgress::with_draw_target(ProgressDrawTarget::hidden());
        progress.publish(&event());
        assert_eq!(progress.bar().length(), Some(12));
        assert_eq!(progress.bar().position(), 3);
        assert!(progress.bar().message().starts_with("Generating..."));

        let mut next = event();
        next.current = 4;
        next.total = 10;
        next.status = "Image saved".to_string();
        progress.publish(&next);
        assert_eq!(progress.bar().length(), Some(10));
        assert_eq!(progress.bar().position(), 4);
        assert!(progress.bar().message().starts_with("Image saved"));
    }

    #[test]
    fn unchanged_blocks_are_printed_once() {
        let progress = TerminalProgress::with_draw_target(ProgressDrawTarget::hidden());
        progress.publish(&event());
        let first = progress.shown.borrow().image.clone();
        let mut retry = event();
        retry.status = "Error occurred".to_string();
        progress.publish(&retry);
        assert_eq!(progress.shown.borrow().image, first);

        let mut next = event();
        next.current = 4;
        progress.publish(&next);
        let shown = progress.shown.borrow();
        assert_ne!(shown.image, first);
        assert!(shown.image.as_deref().is_some_and(|block| block.starts_with("Image 4/12")));
    }

    #[test]
    fn long_prompts_wrap_on_phrase_boundaries() {
        let prompt = vec!["twelve chars"; 12].join(", ");
        let rows = wrap_prompt(&prompt);
        assert!(rows.len() > 1);
        assert!(rows.iter().all(|row| row.len() <= PROMPT_WIDTH));
        assert_eq!(rows.join(", "), prompt);
    }
}
