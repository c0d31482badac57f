//! Screen state for the full-screen hunt.
//!
//! `App` owns every puzzle session and the geofence gate and turns key
//! presses into state changes. It never touches the terminal, so tests can
//! drive it key by key.
//!
//! # Screens
//! `Home` → `Word` ⇄ `Anagram` (stage 1), `Lock` (stage 2), `Location`
//! (stage 3), `Activity` (stage 4). `Esc` always returns home.

use crate::cli::{PuzzleKind, win_message};
use crate::config::Settings;
use crate::geofence::GeofenceGate;
use crate::location::{Coordinate, LocationError, LocationProvider};
use crate::progress::{self, ProgressInputs, ProgressSnapshot, Stage};
use crate::puzzle::{AnagramGame, LockGame, Puzzle, PuzzleSession, Rejection, WordGame};
use crate::store::KeyValueStore;
use crate::{debug_log, info_log};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Word,
    Anagram,
    Lock,
    Location,
    Activity,
}

impl Screen {
    const fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::LocationClues => Self::Word,
            Stage::Lockbox => Self::Lock,
            Stage::GoToLocation => Self::Location,
            Stage::Activity => Self::Activity,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Home => "THE HUNT",
            Self::Word => "Location clue (1)",
            Self::Anagram => "Location clue (2)",
            Self::Lock => "Lockbox clue",
            Self::Location => "Go to location",
            Self::Activity => "Activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

type LocationResult = Result<Coordinate, LocationError>;

pub struct App<'s> {
    settings: Settings,
    store: &'s dyn KeyValueStore,
    provider: Option<Arc<dyn LocationProvider>>,
    screen: Screen,
    selected: usize,
    word: PuzzleSession<'s, WordGame>,
    anagram: PuzzleSession<'s, AnagramGame>,
    lock: PuzzleSession<'s, LockGame>,
    gate: GeofenceGate,
    pending_check: Option<Receiver<LocationResult>>,
    revealed: Vec<bool>,
    message: String,
    error_message: String,
}

impl<'s> App<'s> {
    pub fn new(
        settings: Settings,
        store: &'s dyn KeyValueStore,
        provider: Option<Arc<dyn LocationProvider>>,
    ) -> Self {
        let word = PuzzleSession::open(WordGame::new(&settings.word_answer), store);
        let anagram = PuzzleSession::open(AnagramGame::new(&settings.anagram_answer), store);
        let lock = PuzzleSession::open(LockGame::new(&settings.lock_code), store);
        let gate = GeofenceGate::new(settings.target, settings.radius_m).hydrate(store);
        let revealed = vec![false; settings.videos.len()];
        info_log!(
            "App::new() - word={}, anagram={}, lock={}, gate={:?}",
            word.state().status(),
            anagram.state().status(),
            lock.state().status(),
            gate.status()
        );

        Self {
            settings,
            store,
            provider,
            screen: Screen::Home,
            selected: 0,
            word,
            anagram,
            lock,
            gate,
            pending_check: None,
            revealed,
            message: String::new(),
            error_message: String::new(),
        }
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.screen
    }

    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn word(&self) -> &WordGame {
        self.word.state()
    }

    #[must_use]
    pub fn anagram(&self) -> &AnagramGame {
        self.anagram.state()
    }

    #[must_use]
    pub fn lock(&self) -> &LockGame {
        self.lock.state()
    }

    #[must_use]
    pub fn gate(&self) -> &GeofenceGate {
        &self.gate
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    #[must_use]
    pub fn is_revealed(&self, video: usize) -> bool {
        self.revealed.get(video).copied().unwrap_or(false)
    }

    /// Gating from the in-memory state, so a store that cannot write still
    /// lets the team progress for this session.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        progress::aggregate(&ProgressInputs {
            word: Some(self.word.state().status()),
            anagram: Some(self.anagram.state().status()),
            lock: Some(self.lock.state().status()),
            geofence: self.gate.record(),
        })
    }

    /// Handle one key press. Returns `Some(AppAction::Quit)` to leave.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(AppAction::Quit);
        }
        if key.modifiers.contains(KeyModifiers::ALT) || key.modifiers.contains(KeyModifiers::CONTROL) {
            debug_log!("handle_key() - Ignoring key with modifier: {:?}", key.modifiers);
            return None;
        }

        self.error_message.clear();
        debug_log!("handle_key() - {:?} on {:?}", key.code, self.screen);

        if key.code == KeyCode::Esc && self.screen != Screen::Home {
            self.go_home();
            return None;
        }

        match self.screen {
            Screen::Home => return self.handle_home_key(key),
            Screen::Word => self.handle_word_key(key),
            Screen::Anagram => self.handle_anagram_key(key),
            Screen::Lock => self.handle_lock_key(key),
            Screen::Location => self.handle_location_key(key),
            Screen::Activity => self.handle_activity_key(key),
        }
        None
    }

    /// Collect a finished location request, if any.
    pub fn tick(&mut self) {
        let Some(rx) = &self.pending_check else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                Err(LocationError::Unknown("Location request ended unexpectedly.".to_string()))
            }
        };
        self.pending_check = None;
        self.finish_check(result);
    }

    fn go_home(&mut self) {
        self.screen = Screen::Home;
        self.message.clear();
    }

    fn open_stage(&mut self, stage: Stage) {
        if self.progress().is_reachable(stage) {
            info_log!("open_stage() - Opening stage {}", stage.number());
            self.screen = Screen::for_stage(stage);
            self.message.clear();
        } else {
            self.error_message = format!(
                "Stage {} is locked. Finish the earlier stages first.",
                stage.number()
            );
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        let last = Stage::ALL.len() - 1;
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.selected = (self.selected + 1).min(last),
            KeyCode::Enter => self.open_stage(Stage::ALL[self.selected]),
            KeyCode::Char(c @ '1'..='4') => {
                self.selected = c as usize - '1' as usize;
                self.open_stage(Stage::ALL[self.selected]);
            }
            _ => {}
        }
        None
    }

    fn show_rejection(&mut self, rejection: &Rejection) {
        match rejection {
            // Typing into a full or finished puzzle is simply ignored
            Rejection::Full | Rejection::AlreadyWon | Rejection::Empty => {}
            _ => self.error_message = rejection.to_string(),
        }
    }

    fn handle_word_key(&mut self, key: KeyEvent) {
        let outcome = match key.code {
            KeyCode::Tab => {
                self.screen = Screen::Anagram;
                return;
            }
            KeyCode::F(5) => {
                self.word.reset();
                self.message = "Game reset.".to_string();
                return;
            }
            KeyCode::Char(c) if !c.is_ascii_alphabetic() => {
                self.error_message = format!("Only letters are allowed! ('{c}' is not a letter)");
                return;
            }
            KeyCode::Char(c) => self.word.apply(|g| g.push_letter(c)),
            KeyCode::Backspace => self.word.apply(WordGame::backspace),
            KeyCode::Enter => match self.word.apply(WordGame::submit) {
                Ok(evaluation) => {
                    info_log!("Word guess scored {}", evaluation.markers());
                    if evaluation.is_win() {
                        self.message = win_message(PuzzleKind::Word, &self.settings);
                    }
                    Ok(())
                }
                Err(Rejection::WrongLength { expected, .. }) => {
                    self.error_message = format!("Guess must be exactly {expected} letters!");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            _ => Ok(()),
        };
        if let Err(rejection) = outcome {
            self.show_rejection(&rejection);
        }
    }

    fn report_arrangement(&mut self, solved: bool) {
        if solved {
            self.message = win_message(PuzzleKind::Anagram, &self.settings);
        } else {
            self.error_message = "Try again".to_string();
        }
    }

    fn handle_anagram_key(&mut self, key: KeyEvent) {
        let outcome = match key.code {
            KeyCode::Tab => {
                self.screen = Screen::Word;
                return;
            }
            KeyCode::F(5) => {
                self.anagram.reset();
                self.message = "Game reset.".to_string();
                return;
            }
            KeyCode::Char(' ') => self.anagram.apply(|g| g.shuffle(&mut rand::rng())),
            KeyCode::Delete => self.anagram.apply(AnagramGame::clear),
            KeyCode::Backspace => self.anagram.apply(AnagramGame::backspace),
            KeyCode::Char(c) => match self.anagram.apply(|g| g.type_letter(c)) {
                Ok(Some(solved)) => {
                    self.report_arrangement(solved);
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            },
            KeyCode::Enter => match self.anagram.apply(AnagramGame::submit) {
                Ok(solved) => {
                    self.report_arrangement(solved);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            _ => Ok(()),
        };
        if let Err(rejection) = outcome {
            self.show_rejection(&rejection);
        }
    }

    fn handle_lock_key(&mut self, key: KeyEvent) {
        let outcome = match key.code {
            KeyCode::F(5) => {
                self.lock.reset();
                self.message = "Lock reset.".to_string();
                return;
            }
            KeyCode::Char(d) => self.lock.apply(|g| g.push_digit(d)),
            KeyCode::Backspace => self.lock.apply(LockGame::backspace),
            KeyCode::Enter => match self.lock.apply(LockGame::submit) {
                Ok(true) => {
                    self.message = win_message(PuzzleKind::Lock, &self.settings);
                    Ok(())
                }
                Ok(false) => {
                    self.error_message = "Wrong code. Try again.".to_string();
                    Ok(())
                }
                Err(e) => Err(e),
            },
            _ => Ok(()),
        };
        if let Err(rejection) = outcome {
            self.show_rejection(&rejection);
        }
    }

    fn handle_location_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('c') => self.start_check(),
            KeyCode::Char('r') => {
                // Any request still running is superseded
                self.pending_check = None;
                self.gate.reset(self.store);
                info_log!("Geofence reset");
            }
            _ => {}
        }
    }

    fn handle_activity_key(&mut self, key: KeyEvent) {
        if let KeyCode::Char(c) = key.code
            && let Some(n) = c.to_digit(10)
            && let Some(slot) = (n as usize).checked_sub(1).and_then(|i| self.revealed.get_mut(i))
        {
            *slot = !*slot;
        }
    }

    /// Start a location request unless one is already running.
    pub fn start_check(&mut self) {
        if self.gate.is_requesting() {
            debug_log!("start_check() - Request already in flight");
            return;
        }
        let Some(provider) = self.provider.as_ref().map(Arc::clone) else {
            self.gate.check_now(None, &self.settings.position, self.store);
            return;
        };

        self.gate.begin_check();
        let (tx, rx) = mpsc::channel();
        let options = self.settings.position;
        let spawned = thread::Builder::new()
            .name("location".to_string())
            .spawn(move || {
                // The receiver is gone if the request was superseded
                let _ = tx.send(provider.current_position(&options));
            });
        match spawned {
            Ok(_) => self.pending_check = Some(rx),
            Err(e) => self.finish_check(Err(LocationError::Unknown(e.to_string()))),
        }
    }

    fn finish_check(&mut self, result: LocationResult) {
        self.gate
            .complete_check(result, chrono::Utc::now().timestamp_millis(), self.store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::{DEFAULT_TARGET, GeoStatus};
    use crate::location::FixedLocation;
    use crate::progress::StageState;
    use crate::puzzle::Status;
    use crate::store::MemoryStore;
    use std::time::{Duration, Instant};

    fn press(app: &mut App, code: KeyCode) -> Option<AppAction> {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn wait_for_check(app: &mut App) {
        let started = Instant::now();
        while app.gate().is_requesting() && started.elapsed() < Duration::from_secs(5) {
            app.tick();
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn solve_clues(app: &mut App) {
        press(app, KeyCode::Char('1'));
        type_text(app, "alley");
        press(app, KeyCode::Enter);
        press(app, KeyCode::Tab);
        type_text(app, "dancers");
        press(app, KeyCode::Esc);
    }

    #[test]
    fn test_home_navigation_and_quit() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        assert_eq!(app.screen(), Screen::Home);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected(), 2);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected(), 1);
        assert_eq!(press(&mut app, KeyCode::Char('q')), Some(AppAction::Quit));
    }

    #[test]
    fn test_locked_stage_refuses_entry() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.screen(), Screen::Home);
        assert_eq!(
            app.error_message(),
            "Stage 2 is locked. Finish the earlier stages first."
        );
    }

    #[test]
    fn test_word_screen_flow() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.screen(), Screen::Word);

        type_text(&mut app, "all");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.error_message(), "Guess must be exactly 5 letters!");
        assert_eq!(app.word().attempt(), "ALL");

        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.error_message(), "Only letters are allowed! ('3' is not a letter)");

        type_text(&mut app, "eyz");
        assert_eq!(app.word().attempt(), "ALLEY");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.word().status(), Status::Won);
        assert_eq!(
            app.message(),
            "Congratulations! Your first location clue is ALLEY"
        );
    }

    #[test]
    fn test_anagram_screen_flow() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.screen(), Screen::Anagram);

        type_text(&mut app, "scarned");
        assert_eq!(app.anagram().status(), Status::Wrong);
        assert_eq!(app.error_message(), "Try again");

        press(&mut app, KeyCode::Delete);
        assert_eq!(app.anagram().attempt(), "");
        assert_eq!(app.anagram().status(), Status::Playing);

        press(&mut app, KeyCode::Char('z'));
        assert_eq!(app.error_message(), "No 'Z' left to use");

        press(&mut app, KeyCode::Char(' '));
        type_text(&mut app, "dancers");
        assert_eq!(app.anagram().status(), Status::Won);
    }

    #[test]
    fn test_both_clues_open_lockbox() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        solve_clues(&mut app);
        assert_eq!(app.progress().location_clues, StageState::Done);

        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.screen(), Screen::Lock);
        type_text(&mut app, "7663");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.error_message(), "Wrong code. Try again.");

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.lock().status(), Status::Won);
        assert_eq!(app.progress().go_to_location, StageState::Unlocked);
    }

    #[test]
    fn test_progress_survives_restart() {
        let store = MemoryStore::new();
        {
            let mut app = App::new(Settings::default(), &store, None);
            solve_clues(&mut app);
        }
        let app = App::new(Settings::default(), &store, None);
        assert_eq!(app.progress().lockbox, StageState::Unlocked);
    }

    #[test]
    fn test_location_check_without_provider() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        app.screen = Screen::Location;
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(
            app.gate().status(),
            &GeoStatus::Error {
                message: LocationError::Unsupported.to_string()
            }
        );
    }

    #[test]
    fn test_location_check_on_background_thread() {
        let store = MemoryStore::new();
        let provider: Arc<dyn LocationProvider> = Arc::new(FixedLocation(DEFAULT_TARGET));
        let mut app = App::new(Settings::default(), &store, Some(provider));
        app.screen = Screen::Location;

        press(&mut app, KeyCode::Enter);
        assert!(app.gate().is_requesting());
        // A second press while requesting is ignored
        press(&mut app, KeyCode::Enter);
        wait_for_check(&mut app);

        assert!(app.gate().is_inside());
        assert!(app.gate().last_checked_at().is_some());

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.gate().status(), &GeoStatus::Idle);
        assert_eq!(app.gate().record(), None);
    }

    #[test]
    fn test_reset_supersedes_pending_check() {
        let store = MemoryStore::new();
        let provider: Arc<dyn LocationProvider> = Arc::new(FixedLocation(DEFAULT_TARGET));
        let mut app = App::new(Settings::default(), &store, Some(provider));
        app.screen = Screen::Location;

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('r'));
        thread::sleep(Duration::from_millis(50));
        app.tick();
        assert_eq!(app.gate().status(), &GeoStatus::Idle);
    }

    #[test]
    fn test_activity_reveals_videos() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        app.screen = Screen::Activity;
        assert!(!app.is_revealed(0));
        press(&mut app, KeyCode::Char('1'));
        assert!(app.is_revealed(0));
        assert!(!app.is_revealed(1));
        press(&mut app, KeyCode::Char('9'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.screen(), Screen::Home);
    }

    #[test]
    fn test_modifier_keys_ignored() {
        let store = MemoryStore::new();
        let mut app = App::new(Settings::default(), &store, None);
        press(&mut app, KeyCode::Char('1'));
        app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::ALT));
        assert_eq!(app.word().attempt(), "");
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(AppAction::Quit)
        );
    }
}
