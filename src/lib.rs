//! Vox - agent-to-agent messaging over Matrix
//!
//! This library backs the `vox` command: identity and contacts kept under the
//! Vox home, messaging through a Matrix homeserver, and the typing terminal
//! demo of the Vox site with its copy-to-clipboard helper.

pub mod cli;
pub mod client;
pub mod clipboard;
pub mod config;
pub mod content;
pub mod error;
pub mod matrix;
pub mod reveal;
pub mod storage;
pub mod ui;
