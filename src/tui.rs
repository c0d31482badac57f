//! Full-screen terminal interface built on Ratatui.
//!
//! # Architecture
//! - `TuiInterface`: owns the terminal, polls input and redraws
//! - `render_static`: draws an `App` into any frame, so it also renders
//!   against a `TestBackend`
//!
//! Key handling lives in `App`; this module only filters raw terminal events
//! and paints the current screen.

use crate::app::{App, AppAction, Screen};
use crate::cli::{format_timestamp, stage_marker};
use crate::evaluate::{Evaluation, KeyboardState, LetterResult};
use crate::geofence::GeoStatus;
use crate::progress::{Stage, StageState};
use crate::puzzle::{Puzzle, Status};
use crate::{debug_log, info_log};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use std::io;
use std::time::Duration;

const EVENT_POLL_TIMEOUT_MS: u64 = 100;
const ROW_SPACING: u16 = 2;
const ASCII_CONTROL_CHAR_THRESHOLD: u32 = 32;
const KEYBOARD_ROWS: [&str; 3] = ["QWERTYUIOP", "ASDFGHJKL", "ZXCVBNM"];

// Style constants for consistent UI
const HEADER_STYLE: Style = Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD);
const ERROR_STYLE: Style = Style::new().fg(Color::Red);
const SUCCESS_STYLE: Style = Style::new().fg(Color::Green).add_modifier(Modifier::BOLD);
const INFO_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);
const MESSAGE_STYLE: Style = Style::new().fg(Color::Cyan);
const LOCKED_STYLE: Style = Style::new().fg(Color::DarkGray);
const SELECTED_STYLE: Style = Style::new().add_modifier(Modifier::REVERSED);

/// (background, foreground) for a scored or unscored letter.
fn letter_colors(result: Option<LetterResult>) -> (Color, Color) {
    match result {
        None => (Color::DarkGray, Color::White),
        Some(LetterResult::Correct) => (Color::Green, Color::Black),
        Some(LetterResult::Present) => (Color::Yellow, Color::Black),
        Some(LetterResult::Absent) => (Color::Gray, Color::White),
    }
}

fn tile(letter: char, result: Option<LetterResult>) -> Span<'static> {
    let (bg, fg) = letter_colors(result);
    Span::styled(format!(" {letter} "), Style::default().fg(fg).bg(bg))
}

/// Main TUI interface component.
pub struct TuiInterface {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TuiInterface {
    pub fn new() -> Result<Self, io::Error> {
        info_log!("TuiInterface::new() - Initializing TUI");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        info_log!("Terminal setup complete: alternate screen, cursor hidden");
        Ok(Self { terminal })
    }

    pub fn cleanup(&mut self) -> Result<(), io::Error> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            cursor::Show
        )?;
        Ok(())
    }

    /// Event loop: draw, collect background results, apply one key.
    pub fn run(&mut self, app: &mut App) -> Result<(), io::Error> {
        loop {
            self.terminal.draw(|f| render_static(f, app))?;
            app.tick();
            if let Some(key) = Self::read_key()?
                && app.handle_key(key) == Some(AppAction::Quit)
            {
                info_log!("run() - Quit requested");
                return Ok(());
            }
        }
    }

    /// Next usable key press, or `None` when the poll times out.
    fn read_key() -> Result<Option<KeyEvent>, io::Error> {
        if !event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            return Ok(None);
        }

        let Event::Key(key) = event::read()? else {
            // Mouse, focus, paste and resize events carry nothing for us
            return Ok(None);
        };

        // Only process Press events, ignore Release and Repeat to avoid double input
        if key.kind != event::KeyEventKind::Press {
            debug_log!("read_key() - Ignoring non-Press key event: {:?}", key.kind);
            return Ok(None);
        }

        // Alt-tab can leak replacement and control characters
        if let KeyCode::Char(c) = key.code
            && (c == '\u{FFFD}' || (c as u32) < ASCII_CONTROL_CHAR_THRESHOLD)
        {
            debug_log!("read_key() - Ignoring invalid character: {:?}", c);
            return Ok(None);
        }

        Ok(Some(key))
    }
}

impl Drop for TuiInterface {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Render the complete UI for `app`.
pub fn render_static(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(12),   // Current screen
            Constraint::Length(3), // Message line
            Constraint::Length(3), // Instructions
        ])
        .split(f.area());

    render_title(f, chunks[0], app.screen());
    match app.screen() {
        Screen::Home => render_home(f, chunks[1], app),
        Screen::Word => render_word(f, chunks[1], app),
        Screen::Anagram => render_anagram(f, chunks[1], app),
        Screen::Lock => render_lock(f, chunks[1], app),
        Screen::Location => render_location(f, chunks[1], app),
        Screen::Activity => render_activity(f, chunks[1], app),
    }
    render_message(f, chunks[2], app.message(), app.error_message());
    render_instructions(f, chunks[3], app.screen());
}

fn render_title(f: &mut Frame, area: Rect, screen: Screen) {
    let title = Paragraph::new(screen.title())
        .style(HEADER_STYLE)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn render_home(f: &mut Frame, area: Rect, app: &App) {
    let progress = app.progress();
    let mut lines = vec![
        Line::from(Span::styled("Welcome to The Hunt!", HEADER_STYLE)),
        Line::from(""),
    ];

    for (i, (stage, state)) in progress.iter().enumerate() {
        let mut style = match state {
            StageState::Locked => LOCKED_STYLE,
            StageState::Unlocked => Style::default(),
            StageState::Done => SUCCESS_STYLE,
        };
        if i == app.selected() {
            style = style.patch(SELECTED_STYLE);
        }
        lines.push(Line::from(Span::styled(
            format!(
                " {} {}. {} → ",
                stage_marker(state),
                stage.number(),
                stage.title()
            ),
            style,
        )));
        lines.push(Line::from(""));
    }

    let paragraph =
        Paragraph::new(lines).block(Block::default().title("Stages").borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_line(f: &mut Frame, area: Rect, y: u16, spans: Vec<Span>) {
    let paragraph = Paragraph::new(Line::from(spans));
    f.render_widget(
        paragraph,
        Rect {
            x: area.x,
            y,
            width: area.width,
            height: 1,
        },
    );
}

fn render_word(f: &mut Frame, area: Rect, app: &App) {
    let game = app.word();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(5)])
        .split(area);

    let block = Block::default().title("Guesses").borders(Borders::ALL);
    let inner = block.inner(chunks[0]);
    f.render_widget(block, chunks[0]);

    let showing_input = game.status() == Status::Playing;
    let rows_needed = game.evaluations().len() + usize::from(showing_input);
    let available_rows = (inner.height / ROW_SPACING).max(1) as usize;
    // Keep the most recent guesses in view
    let skip_count = rows_needed.saturating_sub(available_rows);

    let mut y = inner.y;
    for evaluation in game.evaluations().iter().skip(skip_count) {
        render_line(f, inner, y, evaluation_spans(evaluation));
        y += ROW_SPACING;
    }
    if showing_input && y < inner.y + inner.height {
        let mut spans = vec![Span::raw("  ")];
        let mut typed = game.attempt().chars();
        for _ in 0..game.target_len() {
            spans.push(tile(typed.next().unwrap_or(' '), None));
            spans.push(Span::raw(" "));
        }
        render_line(f, inner, y, spans);
    }

    render_keyboard(f, chunks[1], game.keys());
}

fn evaluation_spans(evaluation: &Evaluation) -> Vec<Span<'static>> {
    let mut spans = vec![Span::raw("  ")];
    for (letter, result) in evaluation.iter() {
        spans.push(tile(letter, Some(result)));
        spans.push(Span::raw(" "));
    }
    spans
}

fn render_keyboard(f: &mut Frame, area: Rect, keys: &KeyboardState) {
    let lines: Vec<Line> = KEYBOARD_ROWS
        .iter()
        .map(|row| {
            let spans: Vec<Span> = row
                .chars()
                .flat_map(|c| [tile(c, keys.get(c)), Span::raw(" ")])
                .collect();
            Line::from(spans)
        })
        .collect();
    let paragraph =
        Paragraph::new(lines).block(Block::default().title("Keyboard").borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_anagram(f: &mut Frame, area: Rect, app: &App) {
    let game = app.anagram();
    let slot_result = match game.status() {
        Status::Won => Some(LetterResult::Correct),
        Status::Wrong => Some(LetterResult::Absent),
        Status::Playing => None,
    };

    let mut slots = vec![Span::raw("  ")];
    let mut typed = game.attempt().chars();
    for _ in 0..game.target_len() {
        slots.push(tile(typed.next().unwrap_or('_'), slot_result));
        slots.push(Span::raw(" "));
    }

    let mut pool = vec![Span::raw("  ")];
    for (i, &letter) in game.pool().iter().enumerate() {
        if game.is_used(i) {
            pool.push(Span::styled(format!(" {letter} "), LOCKED_STYLE));
        } else {
            pool.push(tile(letter, None));
        }
        pool.push(Span::raw(" "));
    }

    let lines = vec![
        Line::from("Rearrange the letters to find the second clue."),
        Line::from(""),
        Line::from(slots),
        Line::from(""),
        Line::from(pool),
        Line::from(""),
        Line::from(Span::styled(format!("Attempts: {}", game.attempts()), INFO_STYLE)),
    ];
    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("Anagram").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn render_lock(f: &mut Frame, area: Rect, app: &App) {
    let game = app.lock();
    let mut lines = vec![Line::from(Span::styled("Clues:", HEADER_STYLE))];
    for clue in &app.settings().lock_clues {
        lines.push(Line::from(format!("  • {clue}")));
    }
    lines.push(Line::from(""));

    let slot_style = match game.status() {
        Status::Won => SUCCESS_STYLE,
        Status::Wrong => ERROR_STYLE,
        Status::Playing => Style::default(),
    };
    let mut typed = game.attempt().chars();
    let slots: Vec<Span> = (0..game.target_len())
        .map(|_| Span::styled(format!("[{}]", typed.next().unwrap_or(' ')), slot_style))
        .collect();
    lines.push(Line::from(slots));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Attempts: {}", game.attempts()),
        INFO_STYLE,
    )));

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("Lockbox").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_location(f: &mut Frame, area: Rect, app: &App) {
    let gate = app.gate();
    let settings = app.settings();
    let label = gate.distance_label().unwrap_or_default();
    let mut lines = vec![
        Line::from(format!(
            "We need to confirm your current location is {}' {}!",
            settings.anagram_answer, settings.word_answer
        )),
        Line::from(""),
    ];

    match gate.status() {
        GeoStatus::Idle => lines.push(Line::from("Press C to check your location.")),
        GeoStatus::Requesting => lines.push(Line::from(Span::styled("Checking…", INFO_STYLE))),
        GeoStatus::Inside { .. } => {
            lines.push(Line::from(Span::styled(
                "🎉 You made it to the correct location!",
                SUCCESS_STYLE,
            )));
            lines.push(Line::from(format!(
                "You were within the allowed area ({label} from target)."
            )));
        }
        GeoStatus::Outside { .. } => lines.push(Line::from(Span::styled(
            format!("You're currently (~{label} away)."),
            INFO_STYLE,
        ))),
        GeoStatus::Error { message } => {
            lines.push(Line::from(Span::styled(message.clone(), ERROR_STYLE)));
        }
    }

    if let Some(ts) = gate.last_checked_at() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Last checked: {}", format_timestamp(ts)),
            LOCKED_STYLE,
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("Location").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_activity(f: &mut Frame, area: Rect, app: &App) {
    let step = |n: u8| Line::from(Span::styled(format!("Step {n}"), HEADER_STYLE));
    let mut lines = vec![
        Line::from("Look around, you guessed it... You are here to dance 💃 🕺"),
        Line::from("For this activity someone in your team will Moonwalk and someone else will Airwalk."),
        Line::from(""),
        step(1),
        Line::from("Watch the short tutorial videos (less than 30 seconds)"),
    ];
    for (i, video) in app.settings().videos.iter().enumerate() {
        lines.push(Line::from(format!("  [{}] Play {}", i + 1, video.label)));
        if app.is_revealed(i) {
            lines.push(Line::from(Span::styled(format!("      {}", video.url), MESSAGE_STYLE)));
        }
    }
    lines.extend([
        step(2),
        Line::from("Practice and perfect your moves"),
        step(3),
        Line::from("Record a 5+ second video of both the moonwalk and airwalk"),
        step(4),
        Line::from("Share with everyone at the end of the day 🍻"),
        step(5),
        Line::from("For a bonus point, share the videos on your socials"),
    ]);

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(Stage::Activity.title()).borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_message(f: &mut Frame, area: Rect, message: &str, error_message: &str) {
    let line = if error_message.is_empty() {
        Line::from(Span::styled(message, MESSAGE_STYLE))
    } else {
        Line::from(Span::styled(error_message, ERROR_STYLE))
    };
    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_instructions(f: &mut Frame, area: Rect, screen: Screen) {
    let text = match screen {
        Screen::Home => "↑/↓ or 1-4: Choose stage | ENTER: Open | Q/ESC: Quit",
        Screen::Word => "Type letters | ENTER: Submit | TAB: Second clue | F5: Reset | ESC: Home",
        Screen::Anagram => {
            "Type letters | SPACE: Shuffle | DEL: Clear | TAB: First clue | F5: Reset | ESC: Home"
        }
        Screen::Lock => "Type digits | ENTER: Submit | F5: Reset | ESC: Home",
        Screen::Location => "C/ENTER: Check my location | R: Reset | ESC: Home",
        Screen::Activity => "1-9: Show video link | ESC: Home",
    };

    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::store::MemoryStore;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| render_static(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_home_lists_stages() {
        let store = MemoryStore::new();
        let app = App::new(Settings::default(), &store, None);
        let text = screen_text(&app);
        assert!(text.contains("Welcome to The Hunt!"));
        assert!(text.contains("1. Location clue"));
        assert!(text.contains("[locked] 4. Activity"));
    }

    #[test]
    fn test_word_board_shows_guesses() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        press(&mut app, KeyCode::Enter);
        for c in "llama".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        let text = screen_text(&app);
        assert!(text.contains(" L   L   A   M   A "));
        assert!(text.contains("Keyboard"));
    }

    #[test]
    fn test_lock_shows_clues() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        // Stage 2 stays locked, so the home screen is still shown
        press(&mut app, KeyCode::Char('2'));
        let text = screen_text(&app);
        assert!(text.contains("Stage 2 is locked"));
        assert!(!text.contains("Clues:"));
    }

    #[test]
    fn test_letter_colors() {
        assert_eq!(letter_colors(Some(LetterResult::Correct)).0, Color::Green);
        assert_eq!(letter_colors(Some(LetterResult::Present)).0, Color::Yellow);
        assert_eq!(letter_colors(None).0, Color::DarkGray);
    }
}
