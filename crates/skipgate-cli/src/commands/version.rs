//! Version command implementation.

use crate::style::colors::SemanticStyle;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("{} {}", "skipgate".header(), VERSION);
    println!();
    println!(
        "{}",
        "Verifies that skip-level upgrades are refused without damaging data.".muted()
    );
    println!();
    println!("Build info:");
    println!("  Target: {}", std::env::consts::ARCH);
    println!("  OS:     {}", std::env::consts::OS);
}
