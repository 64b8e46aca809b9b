use crate::clipboard::CopyHelper;
use crate::content::{DemoScript, INSTALL_STEPS, SKILL_MD};
use crate::reveal::{RevealPlayer, RevealSnapshot, RevealTiming};
use crate::ui::theme::Theme;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

/// Half period of the prompt cursor blink.
pub const CURSOR_BLINK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Terminal,
    Reference,
    Skill,
}

pub struct App {
    pub script: DemoScript,
    pub player: RevealPlayer,
    pub focus: FocusPane,
    pub reference_scroll: u16,
    pub skill_scroll: u16,
    pub copier: CopyHelper,
    pub theme: Theme,
    pub should_quit: bool,
    started: Instant,
}

impl App {
    /// Start the demo on `script`. Must be called inside a tokio runtime.
    pub fn new(script: DemoScript, timing: RevealTiming, copier: CopyHelper, theme: Theme) -> Self {
        Self {
            script,
            player: RevealPlayer::start(script.script(), timing),
            focus: FocusPane::Terminal,
            reference_scroll: 0,
            skill_scroll: 0,
            copier,
            theme,
            should_quit: false,
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> RevealSnapshot {
        self.player.snapshot()
    }

    /// Whether the reveal still needs frequent redraws.
    pub fn is_animating(&self) -> bool {
        !self.player.snapshot().finished || self.copier.is_copied()
    }

    pub fn cursor_visible(&self) -> bool {
        let half_periods = self.started.elapsed().as_millis() / CURSOR_BLINK.as_millis();
        half_periods % 2 == 0
    }

    /// Switch the terminal to `script`, restarting the reveal if it changed.
    pub fn set_script(&mut self, script: DemoScript) {
        self.script = script;
        if self.player.set_script(script.script()) {
            tracing::debug!(?script, "demo script changed");
        }
    }

    pub fn next_script(&mut self) {
        self.set_script(self.script.next());
    }

    pub fn replay(&mut self) {
        self.player.replay();
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Terminal => FocusPane::Reference,
            FocusPane::Reference => FocusPane::Skill,
            FocusPane::Skill => FocusPane::Terminal,
        };
    }

    pub fn scroll_down(&mut self) {
        match self.focus {
            FocusPane::Reference => self.reference_scroll = self.reference_scroll.saturating_add(1),
            FocusPane::Skill => {
                let max = skill_line_count().saturating_sub(1);
                if self.skill_scroll < max {
                    self.skill_scroll += 1;
                }
            }
            FocusPane::Terminal => {}
        }
    }

    pub fn scroll_up(&mut self) {
        match self.focus {
            FocusPane::Reference => self.reference_scroll = self.reference_scroll.saturating_sub(1),
            FocusPane::Skill => self.skill_scroll = self.skill_scroll.saturating_sub(1),
            FocusPane::Terminal => {}
        }
    }

    /// Copy the skill file. Returns whether anything reached a clipboard.
    pub fn copy_skill(&mut self) -> bool {
        self.copier.copy(SKILL_MD)
    }

    /// Copy the install command from the first getting-started step.
    pub fn copy_install_command(&mut self) -> bool {
        match INSTALL_STEPS.first() {
            Some((_, command)) => self.copier.copy(command),
            None => false,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.toggle_focus(),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(),
            KeyCode::Char('r') => self.replay(),
            KeyCode::Char('n') => self.next_script(),
            KeyCode::Char('y') => {
                self.copy_skill();
            }
            KeyCode::Char('c') => {
                self.copy_install_command();
            }
            _ => {}
        }
    }
}

fn skill_line_count() -> u16 {
    u16::try_from(SKILL_MD.lines().count()).unwrap_or(u16::MAX)
}
