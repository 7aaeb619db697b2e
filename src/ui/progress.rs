//! Spinners drawn on stderr with a plain-text fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// A task spinner; prints one line per state change when not on a terminal
pub struct TaskSpinner {
    bar: Option<ProgressBar>,
    fancy: bool,
    quiet: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            bar: None,
            fancy: ctx.use_fancy_output(),
            quiet: ctx.is_quiet(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.fancy {
            let bar = ProgressBar::new_spinner();
            if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} {elapsed:.dim}") {
                bar.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            bar.set_message(message.to_string());
            bar.enable_steady_tick(TICK);
            self.bar = Some(bar);
        } else if !self.quiet {
            eprintln!("{} {}", style("...").dim(), message);
        }
    }

    pub fn message(&mut self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn stop(&mut self, message: &str) {
        self.finish(style("✓").green(), style("[OK]").green(), message);
    }

    pub fn stop_error(&mut self, message: &str) {
        self.finish(style("✗").red(), style("[FAIL]").red(), message);
    }

    pub fn stop_warn(&mut self, message: &str) {
        self.finish(style("!").yellow(), style("[WARN]").yellow(), message);
    }

    /// Remove the spinner without printing anything
    pub fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn finish(&mut self, symbol: console::StyledObject<&str>, plain: console::StyledObject<&str>, message: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
            eprintln!("{} {}", symbol, message);
        } else if !self.quiet {
            eprintln!("{} {}", plain, message);
        }
    }
}

impl Drop for TaskSpinner {
    fn drop(&mut self) {
        self.clear();
    }
}
