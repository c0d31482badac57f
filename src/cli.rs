use crate::config::Settings;
use crate::geofence::{GeoStatus, GeofenceGate};
use crate::location::{Coordinate, FixFileLocation, FixedLocation, LocationProvider};
use crate::progress::{self, ProgressSnapshot, Stage, StageState};
use crate::puzzle::{AnagramGame, LockGame, Puzzle, PuzzleSession, Rejection, WordGame};
use crate::store::{KeyValueStore, clear_record};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// The Hunt: a gated scavenger hunt in your terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory for saved progress and the log file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to a config.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Report this position to the geofence check
    #[arg(long, global = true, value_name = "LAT,LNG", allow_hyphen_values = true)]
    pub position: Option<Coordinate>,

    /// Read positions from a fix file written by a GPS bridge
    #[arg(long, global = true, value_name = "PATH")]
    pub location_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Full-screen hunt (default)
    Play,
    /// Solve one puzzle line by line on stdin
    Solve {
        #[arg(value_enum)]
        puzzle: PuzzleKind,
    },
    /// Show which stages are open
    Status,
    /// Run the geofence check once
    CheckLocation,
    /// Forget saved progress
    Reset {
        #[arg(value_enum)]
        target: ResetTarget,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuzzleKind {
    Word,
    Anagram,
    Lock,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    Word,
    Anagram,
    Lock,
    Geofence,
    All,
}

#[must_use]
pub fn parse_cli() -> Cli {
    Cli::parse()
}

impl Cli {
    /// `--position` wins over `--location-file`, which wins over the config.
    #[must_use]
    pub fn location_provider(&self, settings: &Settings) -> Option<Arc<dyn LocationProvider>> {
        if let Some(position) = self.position {
            return Some(Arc::new(FixedLocation(position)));
        }
        self.location_file
            .as_ref()
            .or(settings.fix_file.as_ref())
            .map(|path| Arc::new(FixFileLocation::new(path)) as Arc<dyn LocationProvider>)
    }
}

impl PuzzleKind {
    #[must_use]
    pub const fn stage(self) -> Stage {
        match self {
            Self::Word | Self::Anagram => Stage::LocationClues,
            Self::Lock => Stage::Lockbox,
        }
    }
}

/// Message shown once a puzzle is solved.
#[must_use]
pub fn win_message(kind: PuzzleKind, settings: &Settings) -> String {
    match kind {
        PuzzleKind::Word => format!(
            "Congratulations! Your first location clue is {}",
            settings.word_answer
        ),
        PuzzleKind::Anagram => format!(
            "Congratulations! Your second location clue is {}'",
            settings.anagram_answer
        ),
        PuzzleKind::Lock => format!(
            "Congratulations! The lockbox is now unlocked! Proceed to {}' {} to do the activity!",
            settings.anagram_answer, settings.word_answer
        ),
    }
}

#[must_use]
pub fn stage_marker(state: StageState) -> &'static str {
    match state {
        StageState::Locked => "[locked]",
        StageState::Unlocked => "[ open ]",
        StageState::Done => "[ done ]",
    }
}

pub fn display_status<W: Write>(snapshot: &ProgressSnapshot, out: &mut W) -> io::Result<()> {
    writeln!(out, "Welcome to The Hunt!")?;
    for (stage, state) in snapshot.iter() {
        writeln!(out, "{} {}. {}", stage_marker(state), stage.number(), stage.title())?;
    }
    Ok(())
}

pub fn display_location<W: Write>(gate: &GeofenceGate, out: &mut W) -> io::Result<()> {
    match gate.status() {
        GeoStatus::Inside { .. } => writeln!(
            out,
            "You made it to the correct location! ({} from target)",
            gate.distance_label().unwrap_or_default()
        )?,
        GeoStatus::Outside { .. } => writeln!(
            out,
            "You're currently ~{} away.",
            gate.distance_label().unwrap_or_default()
        )?,
        GeoStatus::Error { message } => writeln!(out, "{message}")?,
        GeoStatus::Idle | GeoStatus::Requesting => writeln!(out, "Location not checked yet.")?,
    }
    if let Some(ts) = gate.last_checked_at() {
        writeln!(out, "Last checked: {}", format_timestamp(ts))?;
    }
    Ok(())
}

/// Local wall-clock rendering of epoch millis.
#[must_use]
pub fn format_timestamp(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn run_check_location<W: Write>(
    settings: &Settings,
    provider: Option<&dyn LocationProvider>,
    store: &dyn KeyValueStore,
    out: &mut W,
) -> io::Result<()> {
    let snapshot = progress::aggregate(&progress::load_inputs(store, settings));
    if !snapshot.is_reachable(Stage::GoToLocation) {
        return display_locked(Stage::GoToLocation, out);
    }
    let mut gate = GeofenceGate::new(settings.target, settings.radius_m);
    writeln!(out, "Checking your location...")?;
    gate.check_now(provider, &settings.position, store);
    display_location(&gate, out)
}

pub fn run_reset<W: Write>(target: ResetTarget, store: &dyn KeyValueStore, out: &mut W) -> io::Result<()> {
    let everything = target == ResetTarget::All;
    if everything || target == ResetTarget::Word {
        clear_record::<WordGame>(store);
    }
    if everything || target == ResetTarget::Anagram {
        clear_record::<AnagramGame>(store);
    }
    if everything || target == ResetTarget::Lock {
        clear_record::<LockGame>(store);
    }
    if everything || target == ResetTarget::Geofence {
        crate::store::clear_key(store, crate::geofence::STORAGE_KEY);
    }
    writeln!(out, "Progress cleared.")
}

fn display_locked<W: Write>(stage: Stage, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "Stage {} ({}) is locked. Finish the earlier stages first.",
        stage.number(),
        stage.title()
    )
}

// Line-mode input

enum LineInput {
    Exit,
    Reset,
    Shuffle,
    Attempt(String),
}

/// `None` at end of input.
fn read_line_input<R: BufRead>(reader: &mut R) -> io::Result<Option<LineInput>> {
    let mut input = String::new();
    if reader.read_line(&mut input)? == 0 {
        return Ok(None);
    }
    let input = input.trim();
    Ok(Some(match input.to_ascii_lowercase().as_str() {
        "exit" => LineInput::Exit,
        "reset" => LineInput::Reset,
        "shuffle" => LineInput::Shuffle,
        _ => LineInput::Attempt(input.to_string()),
    }))
}

/// Play one puzzle from line input: each line is a full attempt.
pub fn run_solve<R: BufRead, W: Write>(
    kind: PuzzleKind,
    settings: &Settings,
    store: &dyn KeyValueStore,
    mut reader: R,
    out: &mut W,
) -> io::Result<()> {
    let snapshot = progress::aggregate(&progress::load_inputs(store, settings));
    if !snapshot.is_reachable(kind.stage()) {
        return display_locked(kind.stage(), out);
    }

    match kind {
        PuzzleKind::Word => solve_word(settings, store, &mut reader, out),
        PuzzleKind::Anagram => solve_anagram(settings, store, &mut reader, out),
        PuzzleKind::Lock => solve_lock(settings, store, &mut reader, out),
    }
}

fn clear_attempt<P: Puzzle>(
    session: &mut PuzzleSession<'_, P>,
    backspace: fn(&mut P) -> Result<(), Rejection>,
) {
    while !session.state().attempt().is_empty() {
        if session.apply(backspace).is_err() {
            break;
        }
    }
}

fn solve_word<R: BufRead, W: Write>(
    settings: &Settings,
    store: &dyn KeyValueStore,
    reader: &mut R,
    out: &mut W,
) -> io::Result<()> {
    let mut session = PuzzleSession::open(WordGame::new(&settings.word_answer), store);
    let len = session.state().target_len();
    writeln!(out, "Guess the {len}-letter word ('exit' to quit, 'reset' to start over).")?;
    for (guess, eval) in session.state().guesses().iter().zip(session.state().evaluations()) {
        writeln!(out, "{guess}  {}", eval.markers())?;
    }

    loop {
        if session.state().status().is_won() {
            writeln!(out, "{}", win_message(PuzzleKind::Word, settings))?;
            return Ok(());
        }
        let guess = match read_line_input(reader)? {
            None | Some(LineInput::Exit) => return Ok(()),
            Some(LineInput::Reset) => {
                session.reset();
                writeln!(out, "Game reset.")?;
                continue;
            }
            Some(LineInput::Shuffle) => "shuffle".to_string(),
            Some(LineInput::Attempt(guess)) => guess,
        };

        clear_attempt(&mut session, WordGame::backspace);
        let typed = guess
            .chars()
            .try_for_each(|c| session.apply(|g| g.push_letter(c)));
        let result = typed.and_then(|()| session.apply(WordGame::submit));
        match result {
            Ok(eval) => writeln!(out, "{}  {}", eval.letters.iter().collect::<String>(), eval.markers())?,
            Err(Rejection::Full | Rejection::WrongLength { .. }) => {
                writeln!(out, "Invalid guess. Please enter {len} letters.")?;
                clear_attempt(&mut session, WordGame::backspace);
            }
            Err(e) => {
                writeln!(out, "Invalid guess: {e}")?;
                clear_attempt(&mut session, WordGame::backspace);
            }
        }
    }
}

fn solve_anagram<R: BufRead, W: Write>(
    settings: &Settings,
    store: &dyn KeyValueStore,
    reader: &mut R,
    out: &mut W,
) -> io::Result<()> {
    let mut session = PuzzleSession::open(AnagramGame::new(&settings.anagram_answer), store);
    writeln!(
        out,
        "Rearrange the letters ('shuffle' to mix, 'exit' to quit, 'reset' to start over)."
    )?;

    loop {
        if session.state().status().is_won() {
            writeln!(out, "{}", win_message(PuzzleKind::Anagram, settings))?;
            return Ok(());
        }
        let letters: String = session.state().pool().iter().collect();
        writeln!(out, "Letters: {letters}")?;

        let attempt = match read_line_input(reader)? {
            None | Some(LineInput::Exit) => return Ok(()),
            Some(LineInput::Reset) => {
                session.reset();
                writeln!(out, "Game reset.")?;
                continue;
            }
            Some(LineInput::Shuffle) => {
                if let Err(e) = session.apply(|g| g.shuffle(&mut rand::rng())) {
                    writeln!(out, "Cannot shuffle: {e}")?;
                }
                continue;
            }
            Some(LineInput::Attempt(attempt)) => attempt,
        };

        let mut outcome = session.apply(AnagramGame::clear).map(|()| None);
        for c in attempt.chars().filter(|c| !c.is_whitespace()) {
            if outcome.is_err() {
                break;
            }
            outcome = session.apply(|g| g.type_letter(c));
        }
        // Filling every slot submits on its own; anything shorter is refused
        let outcome = match outcome {
            Ok(None) => session.apply(AnagramGame::submit),
            Ok(Some(solved)) => Ok(solved),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(true) => {}
            Ok(false) => writeln!(out, "Try again")?,
            Err(e) => writeln!(out, "Invalid arrangement: {e}")?,
        }
    }
}

fn solve_lock<R: BufRead, W: Write>(
    settings: &Settings,
    store: &dyn KeyValueStore,
    reader: &mut R,
    out: &mut W,
) -> io::Result<()> {
    let mut session = PuzzleSession::open(LockGame::new(&settings.lock_code), store);
    let len = session.state().target_len();
    for clue in &settings.lock_clues {
        writeln!(out, "- {clue}")?;
    }
    writeln!(out, "Enter the {len}-digit code ('exit' to quit, 'reset' to start over).")?;

    loop {
        if session.state().status().is_won() {
            writeln!(out, "{}", win_message(PuzzleKind::Lock, settings))?;
            return Ok(());
        }
        let code = match read_line_input(reader)? {
            None | Some(LineInput::Exit) => return Ok(()),
            Some(LineInput::Reset) => {
                session.reset();
                writeln!(out, "Lock reset.")?;
                continue;
            }
            Some(LineInput::Shuffle) => "shuffle".to_string(),
            Some(LineInput::Attempt(code)) => code,
        };

        clear_attempt(&mut session, LockGame::backspace);
        let typed = code.chars().try_for_each(|d| session.apply(|g| g.push_digit(d)));
        match typed.and_then(|()| session.apply(LockGame::submit)) {
            Ok(true) => {}
            Ok(false) => writeln!(out, "Wrong code. Try again.")?,
            Err(e) => {
                writeln!(out, "Invalid code: {e}")?;
                clear_attempt(&mut session, LockGame::backspace);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::io::Cursor;

    fn run(kind: PuzzleKind, store: &MemoryStore, input: &str) -> String {
        let mut out = Vec::new();
        run_solve(kind, &Settings::default(), store, Cursor::new(input), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_solve_subcommand() {
        let cli = Cli::try_parse_from(["the-hunt", "solve", "lock"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Solve {
                puzzle: PuzzleKind::Lock
            })
        );
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "the-hunt",
            "-vv",
            "--position",
            "-33.87625,151.201083",
            "check-location",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.position, Some(Coordinate::new(-33.87625, 151.201083)));
        assert_eq!(cli.command, Some(Command::CheckLocation));
    }

    #[test]
    fn test_parse_no_subcommand() {
        let cli = Cli::try_parse_from(["the-hunt"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(Cli::try_parse_from(["the-hunt", "reset", "everything"]).is_err());
    }

    #[test]
    fn test_provider_precedence() {
        let settings = Settings::default();
        let cli = Cli::try_parse_from(["the-hunt"]).unwrap();
        assert!(cli.location_provider(&settings).is_none());

        let cli = Cli::try_parse_from(["the-hunt", "--location-file", "/tmp/fix.json"]).unwrap();
        assert!(cli.location_provider(&settings).is_some());
    }

    #[test]
    fn test_word_line_mode() {
        let store = MemoryStore::new();
        let out = run(PuzzleKind::Word, &store, "llama\nabc\nalley\n");
        assert!(out.contains("LLAMA  YGYXX"));
        assert!(out.contains("Invalid guess. Please enter 5 letters."));
        assert!(out.contains("Your first location clue is ALLEY"));
    }

    #[test]
    fn test_word_line_mode_rejects_digits() {
        let store = MemoryStore::new();
        let out = run(PuzzleKind::Word, &store, "al1ey\nexit\n");
        assert!(out.contains("Invalid guess: '1' is not allowed here"));
    }

    #[test]
    fn test_lock_is_gated() {
        let store = MemoryStore::new();
        let out = run(PuzzleKind::Lock, &store, "7662\n");
        assert!(out.contains("Stage 2 (Lockbox code clue) is locked"));
    }

    #[test]
    fn test_lock_after_clues() {
        let store = MemoryStore::new();
        run(PuzzleKind::Word, &store, "ALLEY\n");
        run(PuzzleKind::Anagram, &store, "DANCERS\n");
        let out = run(PuzzleKind::Lock, &store, "7663\n76\n7662\n");
        assert!(out.contains("Wrong code. Try again."));
        assert!(out.contains("Invalid code: Answer must be exactly 4 characters!"));
        assert!(out.contains("The lockbox is now unlocked!"));
    }

    #[test]
    fn test_anagram_line_mode() {
        let store = MemoryStore::new();
        let out = run(PuzzleKind::Anagram, &store, "scarned\nshuffle\ndan\nxyz\ndancers\n");
        assert!(out.contains("Try again"));
        assert!(out.contains("Invalid arrangement: Answer must be exactly 7 characters!"));
        assert!(out.contains("Invalid arrangement: No 'X' left to use"));
        assert!(out.contains("Your second location clue is DANCERS'"));
    }

    #[test]
    fn test_anagram_shuffle_line_keeps_letters() {
        let store = MemoryStore::new();
        let out = run(PuzzleKind::Anagram, &store, "shuffle\nshuffle\ndancers\n");
        assert!(!out.contains("Cannot shuffle"));
        let mut rounds = 0;
        for line in out.lines().filter_map(|l| l.strip_prefix("Letters: ")) {
            let mut letters: Vec<char> = line.chars().collect();
            letters.sort_unstable();
            assert_eq!(letters.iter().collect::<String>(), "ACDENRS");
            rounds += 1;
        }
        assert_eq!(rounds, 3);
        assert!(out.contains("Your second location clue is DANCERS'"));
    }

    #[test]
    fn test_status_output() {
        let store = MemoryStore::new();
        run(PuzzleKind::Word, &store, "ALLEY\n");
        let snapshot = progress::aggregate(&progress::load_inputs(&store, &Settings::default()));
        let mut out = Vec::new();
        display_status(&snapshot, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("[ open ] 1. Location clue"));
        assert!(out.contains("[locked] 2. Lockbox code clue"));
    }

    #[test]
    fn test_reset_all() {
        let store = MemoryStore::new();
        run(PuzzleKind::Word, &store, "ALLEY\n");
        run_reset(ResetTarget::All, &store, &mut Vec::new()).unwrap();
        let out = run(PuzzleKind::Word, &store, "exit\n");
        assert!(!out.contains("Congratulations"));
    }

    #[test]
    fn test_check_location_needs_open_stage() {
        let store = MemoryStore::new();
        let mut out = Vec::new();
        let here = FixedLocation(crate::geofence::DEFAULT_TARGET);
        run_check_location(&Settings::default(), Some(&here), &store, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Stage 3 (Go to location) is locked"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(i64::MAX), "unknown");
        assert_eq!(format_timestamp(0).len(), 19);
    }
}
