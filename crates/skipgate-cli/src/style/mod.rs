//! Terminal output for the CLI.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod colors;
mod report;
mod spinner;

pub use report::{grid, print_error, print_hint, print_labeled, print_success, print_warn};
pub use spinner::{create_spinner, finish_error, finish_success};

static NO_COLOR: AtomicBool = AtomicBool::new(false);

/// Called once from `main` for `--no-color`.
pub fn set_no_color(value: bool) {
    NO_COLOR.store(value, Ordering::Relaxed);
}

pub fn no_color() -> bool {
    NO_COLOR.load(Ordering::Relaxed)
}
