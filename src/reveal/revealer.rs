use std::sync::Arc;
use std::time::Duration;

/// Delays driving a [`Revealer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    /// Delay before each further character appears.
    pub interval: Duration,
    /// Delay between a fully typed line and its commit.
    pub pause: Duration,
}

impl RevealTiming {
    pub fn new(interval: Duration, pause: Duration) -> Self {
        Self { interval, pause }
    }
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            pause: Duration::from_millis(1000),
        }
    }
}

/// Where a [`Revealer`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Characters of the current line are still appearing.
    Typing,
    /// The current line is fully shown and waits to be committed.
    Holding,
    /// Every line has been committed.
    Finished,
}

/// Owned copy of a revealer's visible state, cheap enough to publish per tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealSnapshot {
    pub committed: Vec<String>,
    pub partial: String,
    pub cursor: usize,
    pub finished: bool,
    /// Bumped on every restart so stale timer callbacks can be told apart.
    pub generation: u64,
}

/// Typewriter state machine over a fixed script.
///
/// `committed` is always `script[..cursor]` and `partial` is always a prefix
/// of `script[cursor]`, cut on a `char` boundary.
#[derive(Debug, Clone)]
pub struct Revealer {
    script: Arc<[String]>,
    cursor: usize,
    /// Byte length of the revealed prefix of `script[cursor]`.
    typed: usize,
    committed: Vec<String>,
    phase: Phase,
}

impl Revealer {
    pub fn new(script: impl Into<Arc<[String]>>) -> Self {
        let mut revealer = Self {
            script: script.into(),
            cursor: 0,
            typed: 0,
            committed: Vec::new(),
            phase: Phase::Typing,
        };
        revealer.enter_line();
        revealer
    }

    pub fn script(&self) -> &[String] {
        &self.script
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn committed(&self) -> &[String] {
        &self.committed
    }

    /// The typed prefix of the current line; empty once finished.
    pub fn partial(&self) -> &str {
        self.script
            .get(self.cursor)
            .map_or("", |line| &line[..self.typed])
    }

    /// Delay before the next [`step`](Self::step), `None` when finished.
    pub fn next_delay(&self, timing: &RevealTiming) -> Option<Duration> {
        match self.phase {
            Phase::Typing => Some(timing.interval),
            Phase::Holding => Some(timing.pause),
            Phase::Finished => None,
        }
    }

    /// Advance by one timer callback and return the resulting phase.
    pub fn step(&mut self) -> Phase {
        match self.phase {
            Phase::Typing => {
                let line = &self.script[self.cursor];
                let next = line[self.typed..]
                    .chars()
                    .next()
                    .map_or(0, char::len_utf8);
                self.typed += next;
                if self.typed >= line.len() {
                    self.phase = Phase::Holding;
                }
            }
            Phase::Holding => {
                self.committed.push(self.script[self.cursor].clone());
                self.cursor += 1;
                self.enter_line();
            }
            Phase::Finished => {}
        }
        self.phase
    }

    /// Run every remaining step synchronously.
    pub fn finish(&mut self) {
        while self.step() != Phase::Finished {}
    }

    /// Swap in a new script. A script with different contents resets the
    /// cursor, partial buffer and committed lines; the same script is a no-op.
    ///
    /// Returns whether a reset happened.
    pub fn set_script(&mut self, script: impl Into<Arc<[String]>>) -> bool {
        let script = script.into();
        if *script == *self.script {
            return false;
        }
        *self = Self::new(script);
        true
    }

    /// Rewind to the first line of the current script.
    pub fn restart(&mut self) {
        *self = Self::new(Arc::clone(&self.script));
    }

    pub fn snapshot(&self, generation: u64) -> RevealSnapshot {
        RevealSnapshot {
            committed: self.committed.clone(),
            partial: self.partial().to_string(),
            cursor: self.cursor,
            finished: self.is_finished(),
            generation,
        }
    }

    fn enter_line(&mut self) {
        self.typed = 0;
        self.phase = match self.script.get(self.cursor) {
            None => Phase::Finished,
            Some(line) if line.is_empty() => Phase::Holding,
            Some(_) => Phase::Typing,
        };
    }
}
