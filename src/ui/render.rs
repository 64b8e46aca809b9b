use crate::content::{COMMAND_REFERENCE, INSTALL_STEPS, SKILL_MD};
use crate::reveal::RevealSnapshot;
use crate::ui::app::{App, FocusPane};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Prompt shown before every terminal line.
pub const PROMPT: &str = "$ ";
/// Glyph drawn after the partial line while the cursor is lit.
pub const CURSOR_GLYPH: &str = "_";
pub const COPIED_LABEL: &str = "✓ Copied to Clipboard";

/// Text of the demo terminal for a reveal state: every committed line behind
/// a prompt, then the line being typed with the cursor. Once finished only
/// the bare prompt and cursor follow the committed lines.
pub fn terminal_lines(snapshot: &RevealSnapshot, cursor_visible: bool) -> Vec<String> {
    let cursor = if cursor_visible { CURSOR_GLYPH } else { " " };
    let mut lines: Vec<String> = snapshot
        .committed
        .iter()
        .map(|line| format!("{PROMPT}{line}"))
        .collect();
    if snapshot.finished {
        lines.push(format!("{PROMPT}{cursor}"));
    } else {
        lines.push(format!("{PROMPT}{}{cursor}", snapshot.partial));
    }
    lines
}

pub fn render(frame: &mut Frame, app: &App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Footer
        ])
        .split(frame.area());

    render_header(frame, app, main_chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(main_chunks[1]);

    render_terminal(frame, app, body_chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(body_chunks[1]);

    render_reference(frame, app, right_chunks[0]);
    render_skill(frame, app, right_chunks[1]);

    render_footer(frame, app, main_chunks[2]);
}

fn border_style(app: &App, pane: FocusPane) -> Style {
    if app.focus == pane {
        Style::default().fg(app.theme.accent)
    } else {
        Style::default().fg(app.theme.fg_dim)
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "  VOX  ",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Agent-to-agent messaging for AI agents",
            Style::default().fg(theme.fg),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent)),
    )
    .style(Style::default().bg(theme.bg));

    frame.render_widget(header, area);
}

fn render_terminal(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let text: Vec<Line> = terminal_lines(&app.snapshot(), app.cursor_visible())
        .into_iter()
        .map(|line| match line.strip_prefix(PROMPT) {
            Some(rest) => Line::from(vec![
                Span::styled(PROMPT, Style::default().fg(theme.accent)),
                Span::styled(rest.to_string(), Style::default().fg(theme.fg)),
            ]),
            None => Line::from(line),
        })
        .collect();

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", app.script.title()))
                .border_style(border_style(app, FocusPane::Terminal)),
        )
        .style(Style::default().bg(theme.bg))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn render_reference(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let heading = Style::default()
        .fg(theme.secondary)
        .add_modifier(Modifier::BOLD);

    let mut text = vec![Line::from(Span::styled("Get Started", heading))];
    for (i, (title, command)) in INSTALL_STEPS.iter().enumerate() {
        text.push(Line::from(vec![
            Span::styled(format!("{}. {title}  ", i + 1), Style::default().fg(theme.fg_dim)),
            Span::styled(*command, Style::default().fg(theme.fg)),
        ]));
    }

    for group in COMMAND_REFERENCE {
        text.push(Line::from(""));
        text.push(Line::from(Span::styled(group.category, heading)));
        for (usage, description) in group.commands {
            text.push(Line::from(vec![
                Span::styled(*usage, Style::default().fg(theme.fg)),
                Span::styled(format!("  {description}"), Style::default().fg(theme.fg_dim)),
            ]));
        }
    }

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Commands ")
                .border_style(border_style(app, FocusPane::Reference)),
        )
        .wrap(Wrap { trim: true })
        .scroll((app.reference_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_skill(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let text: Vec<Line> = SKILL_MD
        .lines()
        .map(|line| {
            if line.starts_with('#') {
                Line::from(Span::styled(
                    line,
                    Style::default()
                        .fg(theme.secondary)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(Span::styled(line, Style::default().fg(theme.fg)))
            }
        })
        .collect();

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" skill.md ")
                .border_style(border_style(app, FocusPane::Skill)),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.skill_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let help_text = match app.focus {
        FocusPane::Terminal => "[r] Replay  [n] Next Script  [y] Copy skill.md  [c] Copy Install  [Tab] Switch  [q] Quit",
        FocusPane::Reference | FocusPane::Skill => {
            "[↑↓/jk] Scroll  [y] Copy skill.md  [c] Copy Install  [Tab] Switch  [q] Quit"
        }
    };

    let mut spans = vec![Span::styled(help_text, Style::default().fg(theme.fg_dim))];
    if app.copier.is_copied() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            COPIED_LABEL,
            Style::default()
                .fg(theme.success)
                .add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
