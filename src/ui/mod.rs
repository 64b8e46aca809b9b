//! # UI Module
//!
//! The `vox demo` terminal UI: the site's typing terminal next to the command
//! reference and the agent skill file.
//!
//! ## Components
//!
//! - [`App`] - demo state (current script, reveal player, focus, clipboard)
//! - [`mod@render`] - drawing functions
//! - [`theme`] - color themes
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    Header                       │
//! ├─────────────────────────┬───────────────────────┤
//! │                         │  Commands             │
//! │   Terminal              │  (install steps and   │
//! │   $ vox init ...        │   command reference)  │
//! │   $ vox send hel_       ├───────────────────────┤
//! │                         │  skill.md             │
//! │                         │                       │
//! ├─────────────────────────┴───────────────────────┤
//! │          Footer (keys, copied indicator)        │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod render;
pub mod theme;

pub use app::App;
pub use render::render;
