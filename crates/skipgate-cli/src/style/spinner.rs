//! Step spinners using indicatif.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICKS: &[&str] = &["◐ ", "◓ ", "◑ ", "◒ "];

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Spinner with `msg`, ticking until finished. Hidden when colors are off.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = if super::no_color() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(style("{spinner:.cyan} {msg}").tick_strings(TICKS));
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn finish_with(pb: &ProgressBar, prefix: &'static str, msg: &str) {
    pb.set_style(style("{prefix} {msg}"));
    pb.set_prefix(prefix);
    pb.finish_with_message(msg.to_string());
}

pub fn finish_success(pb: &ProgressBar, msg: &str) {
    finish_with(pb, "✓", msg);
}

pub fn finish_error(pb: &ProgressBar, msg: &str) {
    finish_with(pb, "✗", msg);
}
