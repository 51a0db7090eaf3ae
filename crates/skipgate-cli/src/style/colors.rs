//! Semantic color palette.

use owo_colors::{OwoColorize, Style};

/// Extension trait applying the palette to anything displayable.
///
/// Every method returns the plain text when colors are disabled.
pub trait SemanticStyle: std::fmt::Display {
    /// Green bold.
    fn success(&self) -> String {
        paint(self, Style::new().green().bold())
    }

    /// Red bold.
    fn error(&self) -> String {
        paint(self, Style::new().red().bold())
    }

    /// Yellow.
    fn warning(&self) -> String {
        paint(self, Style::new().yellow())
    }

    /// Cyan.
    fn info(&self) -> String {
        paint(self, Style::new().cyan())
    }

    /// Dimmed.
    fn muted(&self) -> String {
        paint(self, Style::new().dimmed())
    }

    /// Bold.
    fn header(&self) -> String {
        paint(self, Style::new().bold())
    }

    /// Blue, for paths and commands.
    fn code(&self) -> String {
        paint(self, Style::new().blue())
    }
}

impl<T: std::fmt::Display + ?Sized> SemanticStyle for T {}

fn paint<T: std::fmt::Display + ?Sized>(value: &T, style: Style) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}
