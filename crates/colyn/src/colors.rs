//! Semantic color theme for stderr narration
//!
//! - `active` => blue - spinners, headers, the current checkout
//! - `success` => green - completed operations
//! - `warning` => yellow - skipped items, non-fatal problems, hints
//! - `fail` => red - errors and failed items

use std::fmt::Display;
use std::io::IsTerminal;
use std::sync::LazyLock;

use owo_colors::{OwoColorize, Style};

/// Semantic color definitions for terminal output
pub struct SemanticColors {
    pub active: Style,
    pub success: Style,
    pub warning: Style,
    pub fail: Style,
}

impl Default for SemanticColors {
    fn default() -> Self {
        Self {
            active: Style::new().blue(),
            success: Style::new().green(),
            warning: Style::new().yellow(),
            fail: Style::new().red(),
        }
    }
}

/// Global default theme
pub static COLORS: LazyLock<SemanticColors> = LazyLock::new(SemanticColors::default);

static STDERR_IS_TERMINAL: LazyLock<bool> = LazyLock::new(|| std::io::stderr().is_terminal());

/// Style `text` for stderr, leaving it plain when stderr is not a terminal
pub fn paint(text: impl Display, style: Style) -> String {
    if *STDERR_IS_TERMINAL {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_keeps_text() {
        // Test runs capture stderr, so no escape codes are expected either way
        let painted = paint("task-1", COLORS.success);
        assert!(painted.contains("task-1"));
    }
}
