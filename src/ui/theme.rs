//! # Theme System
//!
//! Colors for the `vox demo` terminal UI.
//!
//! Rendering code never names a `ratatui::style::Color` directly; it reads
//! the fields of the active [`Theme`], picked by name from the `[demo]`
//! section of `config.toml`.
//!
//! ## Built-in Themes
//!
//! - **Vox Dark** (default) - the site palette, blue on near-black
//! - **Catppuccin Mocha** - warm, dark pastel theme
//! - **Dracula** - dark theme with vivid colors
//! - **Nord** - arctic, north-bluish color palette

use ratatui::style::Color;

/// All colors used by the demo UI, grouped by semantic role.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Name used in `config.toml`.
    pub name: &'static str,

    /// Panel background.
    pub bg: Color,

    /// Primary text.
    pub fg: Color,
    /// Hints, descriptions, unfocused borders.
    pub fg_dim: Color,

    /// Brand color: header, focused borders, the `$` prompt.
    pub accent: Color,
    /// Command names and headings.
    pub secondary: Color,

    /// The "copied" confirmation.
    pub success: Color,
}

impl Theme {
    pub fn all() -> &'static [Theme] {
        &BUILT_IN_THEMES
    }

    /// Find a built-in theme by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<&'static Theme> {
        BUILT_IN_THEMES
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn default_theme() -> &'static Theme {
        &BUILT_IN_THEMES[0]
    }

    /// The named theme, or the default if there is no such theme.
    pub fn by_name_or_default(name: &str) -> &'static Theme {
        Self::by_name(name).unwrap_or_else(|| {
            tracing::warn!(theme = name, "unknown theme, using default");
            Self::default_theme()
        })
    }
}

static BUILT_IN_THEMES: [Theme; 4] = [
    Theme {
        name: "Vox Dark",
        bg: Color::Rgb(10, 10, 10),
        fg: Color::Rgb(229, 231, 235),     // gray-200
        fg_dim: Color::Rgb(107, 114, 128), // gray-500
        accent: Color::Rgb(59, 130, 246),  // blue-500
        secondary: Color::Rgb(96, 165, 250),
        success: Color::Rgb(34, 197, 94), // green-500
    },
    Theme {
        name: "Catppuccin Mocha",
        bg: Color::Rgb(30, 30, 46),           // base
        fg: Color::Rgb(205, 214, 244),        // text
        fg_dim: Color::Rgb(108, 112, 134),    // overlay0
        accent: Color::Rgb(137, 180, 250),    // blue
        secondary: Color::Rgb(249, 226, 175), // yellow
        success: Color::Rgb(166, 227, 161),   // green
    },
    Theme {
        name: "Dracula",
        bg: Color::Rgb(40, 42, 54),
        fg: Color::Rgb(248, 248, 242),
        fg_dim: Color::Rgb(98, 114, 164),
        accent: Color::Rgb(139, 233, 253),
        secondary: Color::Rgb(241, 250, 140),
        success: Color::Rgb(80, 250, 123),
    },
    Theme {
        name: "Nord",
        bg: Color::Rgb(46, 52, 64),
        fg: Color::Rgb(216, 222, 233),
        fg_dim: Color::Rgb(76, 86, 106),
        accent: Color::Rgb(136, 192, 208),
        secondary: Color::Rgb(235, 203, 139),
        success: Color::Rgb(163, 190, 140),
    },
];
