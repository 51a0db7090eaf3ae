//! Status lines and result grids.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use super::colors::SemanticStyle;

#[derive(Clone, Copy)]
enum Mark {
    Pass,
    Fail,
    Drift,
    Note,
}

impl Mark {
    fn render(self) -> String {
        match self {
            Self::Pass => "✓".success().to_string(),
            Self::Fail => "✗".error().to_string(),
            Self::Drift => "⚠".warning().to_string(),
            Self::Note => "→".muted().to_string(),
        }
    }
}

pub fn print_success(msg: &str) {
    println!("{} {msg}", Mark::Pass.render());
}

/// Printed to stderr so it survives `> report.txt`.
pub fn print_error(msg: &str) {
    eprintln!("{} {msg}", Mark::Fail.render());
}

pub fn print_warn(msg: &str) {
    println!("{} {msg}", Mark::Drift.render());
}

pub fn print_hint(msg: &str) {
    println!("{} {}", Mark::Note.render(), msg.muted());
}

pub fn print_labeled(key: &str, value: &str) {
    println!("  {}: {value}", key.muted());
}

/// Rounded table; the header is bold cyan unless color is off.
pub fn grid(columns: &[&str], rows: Vec<Vec<String>>) -> Table {
    let header = columns.iter().map(|name| {
        let cell = Cell::new(name);
        if super::no_color() {
            cell
        } else {
            cell.add_attribute(Attribute::Bold).fg(Color::Cyan)
        }
    });

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header)
        .add_rows(rows);
    table
}
