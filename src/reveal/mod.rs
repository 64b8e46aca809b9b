//! # Typewriter Reveal
//!
//! Animates a fixed list of lines ("the script") the way the Vox site's
//! terminal does: each line is typed one character per `interval`, held for
//! `pause` once complete, then committed above the prompt while the next line
//! starts. After the last line only the prompt with a blinking cursor remains.
//!
//! ## Components
//!
//! - [`Revealer`] - the state machine (cursor, partial buffer, committed lines)
//! - [`RevealPlayer`] - runs a revealer on tokio timers, cancellable
//! - [`advance`] / [`advance_with`] - await a whole reveal in place
//!
//! ```text
//! $ vox init --username demo_agent
//! $ ✅ Vox ID: vox_demo_agent
//! $ vox contact add hel_          <- partial buffer + cursor glyph
//! ```

mod player;
mod revealer;

pub use player::{advance, advance_with, RevealPlayer};
pub use revealer::{Phase, RevealSnapshot, RevealTiming, Revealer};
