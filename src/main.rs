//! # Vox CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! vox init --username my_agent
//! vox contact add assistant vox_assistant
//! vox send assistant "Hello, I need help"
//! vox inbox
//!
//! # Typing terminal demo
//! vox demo --script hero
//! vox demo --plain
//! ```
//!
//! Results go to stdout. Failures print a single `❌` line to stderr and exit
//! with 1 (unexpected), 3 (unknown contact or conversation) or 4 (not
//! initialized). Set `VOX_LOG` (e.g. `VOX_LOG=debug`) or pass `-v` for logs.
//!
//! ## Demo Key Bindings
//!
//! - `q` / `Esc` - Quit
//! - `Tab` - Switch pane
//! - `j` / `k` - Scroll the focused pane
//! - `r` - Replay the current script
//! - `n` - Next script
//! - `y` - Copy skill.md
//! - `c` - Copy the install command

use vox::cli::{error_line, Cli, Command, CommandRunner};
use vox::client::VoxClient;
use vox::clipboard::CopyHelper;
use vox::config::{vox_home, Config, DemoSettings};
use vox::content::DemoScript;
use vox::reveal::RevealTiming;
use vox::ui::{self, theme::Theme, App};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::panic;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Trait for reading terminal events (allows dependency injection for testing)
trait EventReader {
    fn read_event(&mut self, timeout: Duration) -> Result<Option<Event>>;
}

struct CrosstermEventReader;

impl EventReader for CrosstermEventReader {
    fn read_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        if event::poll(timeout).context("Failed to poll for events")? {
            Ok(Some(
                event::read().context("Failed to read keyboard event")?,
            ))
        } else {
            Ok(None)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "vox=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("VOX_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // Log lines would land on top of the full-screen demo
    if !matches!(cli.command, Command::Demo { plain: false, .. }) {
        init_logging(cli.verbose);
    }

    match run_application(cli, io::stdout().lock()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", error_line(&err));
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

async fn run_application(cli: Cli, out: impl io::Write) -> vox::error::Result<()> {
    let home = match cli.home {
        Some(home) => home,
        None => vox_home()?,
    };
    let demo = Config::demo_settings(&home);

    if let Command::Demo {
        script,
        plain: false,
    } = cli.command
    {
        return Ok(run_demo(script, &demo).await?);
    }

    let client = VoxClient::open(&home)?;
    let copier = CopyHelper::system().with_display_duration(demo.copied_for());
    let mut runner = CommandRunner::new(client, copier, demo, out);
    runner.run(cli.command).await
}

async fn run_demo(script: DemoScript, demo: &DemoSettings) -> Result<()> {
    // Restore the terminal before the default hook prints the panic.
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode().context("Failed to enable raw mode for terminal")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let timing = RevealTiming::new(demo.interval(), demo.pause());
    let copier = CopyHelper::system().with_display_duration(demo.copied_for());
    let theme = Theme::by_name_or_default(&demo.theme).clone();
    let mut app = App::new(script, timing, copier, theme);

    let mut event_reader = CrosstermEventReader;
    let run_result = run_app(&mut terminal, &mut app, &mut event_reader).await;

    // Always restore, even if the loop failed
    let cleanup_result = cleanup_terminal(&mut terminal);
    drop(panic::take_hook());

    run_result?;
    cleanup_result?;
    Ok(())
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("Failed to restore terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_reader: &mut dyn EventReader,
) -> Result<()> {
    loop {
        terminal
            .draw(|f| ui::render(f, app))
            .map_err(|e| anyhow::anyhow!("Failed to draw terminal UI: {e}"))?;

        let poll_timeout = if app.is_animating() {
            Duration::from_millis(16)
        } else {
            Duration::from_millis(100)
        };

        // Let the reveal and clipboard timers run between frames.
        tokio::task::yield_now().await;

        let Some(event) = event_reader.read_event(poll_timeout)? else {
            continue;
        };

        if let Event::Key(key) = event {
            if key.kind == event::KeyEventKind::Press {
                app.handle_key(key);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
