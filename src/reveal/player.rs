use super::revealer::{RevealSnapshot, RevealTiming, Revealer};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Drives a [`Revealer`] on the tokio timer and publishes its state.
///
/// One task per player sleeps until the next step is due, steps, and pushes a
/// [`RevealSnapshot`] into a `watch` channel. Restarting or dropping the
/// player aborts that task, taking its pending timer with it, and every
/// snapshot carries a generation so a callback that was already running when
/// the abort happened can never overwrite the fresh state.
pub struct RevealPlayer {
    script: Arc<[String]>,
    timing: RevealTiming,
    generation: u64,
    tx: Arc<watch::Sender<RevealSnapshot>>,
    rx: watch::Receiver<RevealSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl RevealPlayer {
    /// Start revealing `script`. Must be called inside a tokio runtime.
    pub fn start(script: impl Into<Arc<[String]>>, timing: RevealTiming) -> Self {
        let script = script.into();
        let initial = Revealer::new(Arc::clone(&script)).snapshot(0);
        let (tx, rx) = watch::channel(initial);
        let mut player = Self {
            script,
            timing,
            generation: 0,
            tx: Arc::new(tx),
            rx,
            task: None,
        };
        player.spawn();
        player
    }

    /// Point the player at `script`. A different script cancels the running
    /// reveal, clears the display and starts over; the same script is left
    /// alone. Returns whether a restart happened.
    pub fn set_script(&mut self, script: impl Into<Arc<[String]>>) -> bool {
        let script = script.into();
        if *script == *self.script {
            return false;
        }
        self.script = script;
        self.replay();
        true
    }

    /// Cancel the running reveal and play the current script from the top.
    pub fn replay(&mut self) {
        self.cancel();
        self.generation += 1;
        let fresh = Revealer::new(Arc::clone(&self.script)).snapshot(self.generation);
        self.tx.send_replace(fresh);
        self.spawn();
    }

    pub fn script(&self) -> &[String] {
        &self.script
    }

    pub fn timing(&self) -> RevealTiming {
        self.timing
    }

    /// Latest published state.
    pub fn snapshot(&self) -> RevealSnapshot {
        self.rx.borrow().clone()
    }

    /// A receiver of every published state. It reports the sender closed once
    /// the player is dropped and its task is gone.
    pub fn subscribe(&self) -> watch::Receiver<RevealSnapshot> {
        self.rx.clone()
    }

    /// Wait for the next published state.
    pub async fn changed(&mut self) -> RevealSnapshot {
        // The sender lives as long as `self`, so this cannot fail.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until the current script has been fully revealed.
    pub async fn finished(&mut self) -> RevealSnapshot {
        let generation = self.generation;
        if let Ok(snapshot) = self
            .rx
            .wait_for(|s| s.generation == generation && s.finished)
            .await
        {
            return snapshot.clone();
        }
        self.snapshot()
    }

    /// Whether a timer task is still outstanding.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn spawn(&mut self) {
        let mut revealer = Revealer::new(Arc::clone(&self.script));
        if revealer.is_finished() {
            return;
        }

        let timing = self.timing;
        let generation = self.generation;
        let tx = Arc::clone(&self.tx);
        self.task = Some(tokio::spawn(async move {
            while let Some(delay) = revealer.next_delay(&timing) {
                tokio::time::sleep(delay).await;
                revealer.step();
                let snapshot = revealer.snapshot(generation);
                let current = tx.send_if_modified(|slot| {
                    if slot.generation != generation {
                        return false;
                    }
                    *slot = snapshot;
                    true
                });
                if !current {
                    tracing::trace!(generation, "stale reveal task stopping");
                    break;
                }
            }
        }));
    }
}

impl Drop for RevealPlayer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Reveal `script` to completion on the tokio timer and return the committed
/// lines.
pub async fn advance(
    script: impl Into<Arc<[String]>>,
    interval: std::time::Duration,
    pause: std::time::Duration,
) -> Vec<String> {
    advance_with(script, RevealTiming::new(interval, pause), |_| {}).await
}

/// Like [`advance`], calling `on_step` with the revealer after every step.
pub async fn advance_with(
    script: impl Into<Arc<[String]>>,
    timing: RevealTiming,
    mut on_step: impl FnMut(&Revealer),
) -> Vec<String> {
    let mut revealer = Revealer::new(script);
    while let Some(delay) = revealer.next_delay(&timing) {
        tokio::time::sleep(delay).await;
        revealer.step();
        on_step(&revealer);
    }
    revealer.committed().to_vec()
}
