//! Progress feedback for CLI commands
//!
//! All progress output is suppressed when it is disabled (`--quiet`, or when
//! log lines are echoed to the terminal).

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner with a message
pub fn spinner(message: &str, enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Create a progress bar over a known number of files
pub fn file_bar(total: u64, enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Finish a spinner with a success message
pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.green} {msg}", "✓", message);
}

/// Finish a spinner with a warning message
pub fn finish_spinner_warn(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.yellow} {msg}", "!", message);
}

fn finish_with(pb: Option<ProgressBar>, template: &str, prefix: &'static str, message: &str) {
    if let Some(pb) = pb {
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            pb.set_style(style);
        }
        pb.set_prefix(prefix);
        pb.finish_with_message(message.to_string());
    }
}
