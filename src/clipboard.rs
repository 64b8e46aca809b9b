//! # Clipboard
//!
//! Best-effort "copy to clipboard" with a transient confirmation flag.
//!
//! [`CopyHelper::copy`] first hands the text to the platform clipboard
//! ([`SystemClipboard`], which pipes it into `pbcopy`, `wl-copy`, `xclip`,
//! `xsel` or `clip.exe`). If that fails it falls back to an OSC 52 escape
//! sequence ([`Osc52Clipboard`]), which most terminal emulators turn into a
//! clipboard write even over SSH. If both fail nothing is reported; the
//! confirmation simply does not appear.
//!
//! A successful copy raises the `copied` flag for a fixed duration. A second
//! copy while the flag is up restarts the countdown.

use anyhow::{bail, Context, Result};
use base64::Engine;
use std::io::{IsTerminal, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Something text can be written to.
pub trait ClipboardSink: Send {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Platform clipboard through the usual command-line helpers.
#[derive(Debug, Clone)]
pub struct SystemClipboard {
    candidates: Vec<(&'static str, &'static [&'static str])>,
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::detect()
    }
}

impl SystemClipboard {
    /// Helpers worth trying on this platform, in order of preference.
    pub fn detect() -> Self {
        const NO_ARGS: &[&str] = &[];
        const XCLIP_ARGS: &[&str] = &["-selection", "clipboard"];
        const XSEL_ARGS: &[&str] = &["--clipboard", "--input"];

        let candidates = if cfg!(target_os = "macos") {
            vec![("pbcopy", NO_ARGS)]
        } else if cfg!(windows) {
            vec![("clip.exe", NO_ARGS)]
        } else {
            let mut list = Vec::new();
            if std::env::var_os("WAYLAND_DISPLAY").is_some() {
                list.push(("wl-copy", NO_ARGS));
            }
            list.push(("xclip", XCLIP_ARGS));
            list.push(("xsel", XSEL_ARGS));
            // WSL
            list.push(("clip.exe", NO_ARGS));
            list
        };
        Self { candidates }
    }

    fn pipe_into(program: &str, args: &[&str], text: &str) -> Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {program}"))?;

        // stdin is closed at the end of this statement so the helper sees EOF
        let written = child
            .stdin
            .take()
            .context("Clipboard helper has no stdin")
            .and_then(|mut stdin| {
                stdin
                    .write_all(text.as_bytes())
                    .with_context(|| format!("Failed to write to {program}"))
            });

        // Reap the helper even when the write failed
        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for {program}"))?;
        written?;
        if !status.success() {
            bail!("{program} exited with {status}");
        }
        Ok(())
    }
}

impl ClipboardSink for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        let mut last_error = None;
        for (program, args) in &self.candidates {
            match Self::pipe_into(program, args, text) {
                Ok(()) => {
                    tracing::debug!(program, "copied via clipboard helper");
                    return Ok(());
                }
                Err(e) => {
                    tracing::trace!(program, error = %e, "clipboard helper unavailable");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No clipboard helper for this platform")))
    }
}

/// Terminal clipboard via the OSC 52 escape sequence.
pub struct Osc52Clipboard<W: Write + Send> {
    out: W,
}

impl Osc52Clipboard<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// The escape sequence that asks the terminal to set its clipboard.
    pub fn sequence(text: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text);
        format!("\x1b]52;c;{encoded}\x07")
    }
}

impl<W: Write + Send> ClipboardSink for Osc52Clipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(Self::sequence(text).as_bytes())
            .context("Failed to write OSC 52 sequence")?;
        self.out.flush().context("Failed to flush terminal")?;
        Ok(())
    }
}

/// In-process clipboard that can be read back. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
    failing: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard that rejects every write.
    pub fn failing() -> Self {
        Self {
            contents: Arc::default(),
            failing: true,
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        if self.failing {
            bail!("clipboard unavailable");
        }
        let mut contents = self
            .contents
            .lock()
            .map_err(|_| anyhow::anyhow!("clipboard lock poisoned"))?;
        *contents = Some(text.to_string());
        Ok(())
    }
}

/// How long the confirmation stays up by default.
pub const DEFAULT_COPIED_FOR: Duration = Duration::from_millis(2500);

/// Copy with fallback plus a self-clearing "copied" flag.
///
/// The flag shares one atomic with its reset timer: the high bits hold the
/// epoch of the copy that raised it and the low bit is the flag, so a reset
/// scheduled by an older copy can only clear the flag it raised.
pub struct CopyHelper {
    primary: Box<dyn ClipboardSink>,
    fallback: Option<Box<dyn ClipboardSink>>,
    display_for: Duration,
    epoch: u64,
    state: Arc<AtomicU64>,
    reset: Option<JoinHandle<()>>,
}

impl CopyHelper {
    pub fn new(primary: Box<dyn ClipboardSink>, fallback: Option<Box<dyn ClipboardSink>>) -> Self {
        Self {
            primary,
            fallback,
            display_for: DEFAULT_COPIED_FOR,
            epoch: 0,
            state: Arc::new(AtomicU64::new(0)),
            reset: None,
        }
    }

    /// System clipboard first, OSC 52 on stdout second when stdout is a
    /// terminal.
    pub fn system() -> Self {
        Self::over_stdout(
            Box::new(SystemClipboard::detect()),
            std::io::stdout().is_terminal(),
        )
    }

    /// `primary`, with the OSC 52 fallback only if `stdout_is_terminal`.
    /// Redirected stdout carries command output and must not get escapes.
    pub fn over_stdout(primary: Box<dyn ClipboardSink>, stdout_is_terminal: bool) -> Self {
        let fallback: Option<Box<dyn ClipboardSink>> = if stdout_is_terminal {
            Some(Box::new(Osc52Clipboard::stdout()))
        } else {
            None
        };
        Self::new(primary, fallback)
    }

    /// Whether an OSC 52 fallback is configured.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn with_display_duration(mut self, display_for: Duration) -> Self {
        self.display_for = display_for;
        self
    }

    pub fn display_duration(&self) -> Duration {
        self.display_for
    }

    /// Whether the confirmation should currently be shown.
    pub fn is_copied(&self) -> bool {
        self.state.load(Ordering::Acquire) & 1 == 1
    }

    /// Copy `text`, returning whether either path succeeded.
    pub fn copy(&mut self, text: &str) -> bool {
        let copied = match self.primary.write_text(text) {
            Ok(()) => true,
            Err(primary_err) => {
                tracing::debug!(error = %primary_err, "primary clipboard failed, trying fallback");
                match self.fallback.as_mut().map(|f| f.write_text(text)) {
                    Some(Ok(())) => true,
                    Some(Err(fallback_err)) => {
                        tracing::debug!(error = %fallback_err, "fallback clipboard failed");
                        false
                    }
                    None => false,
                }
            }
        };

        if copied {
            self.raise_flag();
        }
        copied
    }

    fn raise_flag(&mut self) {
        if let Some(reset) = self.reset.take() {
            reset.abort();
        }

        self.epoch += 1;
        let raised = (self.epoch << 1) | 1;
        self.state.store(raised, Ordering::Release);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no runtime, copied flag will not auto-clear");
            return;
        };
        let state = Arc::clone(&self.state);
        let display_for = self.display_for;
        self.reset = Some(handle.spawn(async move {
            tokio::time::sleep(display_for).await;
            let _ = state.compare_exchange(raised, raised & !1, Ordering::AcqRel, Ordering::Acquire);
        }));
    }
}

impl Drop for CopyHelper {
    fn drop(&mut self) {
        if let Some(reset) = self.reset.take() {
            reset.abort();
        }
    }
}
