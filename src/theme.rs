//! Centralized colors and symbols for console output
//!
//! Single source of truth for how progress lines, summaries and banners are
//! styled, so the reporter never hardcodes colors inline.
//!
//! # Usage
//! ```rust
//! use envkit::theme::Theme;
//!
//! println!("{} numpy", Theme::success("✓"));
//! ```

use crossterm::style::{Color, StyledContent, Stylize};
use std::fmt::Display;

// =============================================================================
// COLOR PALETTE
// =============================================================================

/// Core color palette
pub struct Colors;

impl Colors {
    /// Headers, banners and package names
    pub const PRIMARY: Color = Color::Cyan;

    /// Highlighted values (counts, estimates)
    pub const SECONDARY: Color = Color::Yellow;

    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;
    pub const INFO: Color = Color::Blue;

    /// Descriptions and hints
    pub const MUTED: Color = Color::DarkGrey;

    /// Filled part of progress bars
    pub const PROGRESS: Color = Color::Green;
}

// =============================================================================
// SYMBOLS
// =============================================================================

pub struct Symbols;

impl Symbols {
    pub const OK: &'static str = "✓";
    pub const FAIL: &'static str = "✗";
    pub const WARN: &'static str = "!";
    pub const SKIP: &'static str = "↷";
    pub const RETRY: &'static str = "↻";
    pub const BAR_FILLED: char = '█';
    pub const BAR_EMPTY: char = '░';
    pub const RULE: char = '═';
}

// =============================================================================
// SEMANTIC STYLES
// =============================================================================

/// Semantic styling helpers
pub struct Theme;

impl Theme {
    pub fn header<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::PRIMARY).bold()
    }

    pub fn highlight<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::SECONDARY)
    }

    pub fn success<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::SUCCESS)
    }

    pub fn warning<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::WARNING)
    }

    pub fn error<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::ERROR).bold()
    }

    pub fn info<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::INFO)
    }

    pub fn muted<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::MUTED)
    }

    pub fn progress<D: Display>(text: D) -> StyledContent<String> {
        text.to_string().with(Colors::PROGRESS)
    }

    /// Horizontal rule `width` characters wide
    pub fn rule(width: usize) -> StyledContent<String> {
        std::iter::repeat_n(Symbols::RULE, width)
            .collect::<String>()
            .with(Colors::PRIMARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styled_content_keeps_text() {
        assert_eq!(Theme::success("done").content(), "done");
        assert_eq!(Theme::rule(3).content(), "═══");
    }
}
