//! Puzzle state machines.
//!
//! Each puzzle owns its current attempt, its history and a `Status`, and is
//! persisted under its own storage key. Edits and submissions return an
//! outcome instead of touching the store; `PuzzleSession` handles the
//! write-after-every-change rule.

pub mod anagram;
pub mod lock;
pub mod word;

use crate::store::{KeyValueStore, Persisted, clear_record, load_record, save_record};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use anagram::AnagramGame;
pub use lock::LockGame;
pub use word::WordGame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Playing,
    Won,
    Wrong,
}

impl Status {
    #[must_use]
    pub const fn is_won(self) -> bool {
        matches!(self, Self::Won)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Playing => "playing",
            Self::Won => "won",
            Self::Wrong => "wrong",
        };
        f.write_str(label)
    }
}

/// Why an edit or a submission was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The puzzle is solved; nothing changes any more.
    AlreadyWon,
    /// Submission shorter or longer than the target.
    WrongLength { expected: usize, actual: usize },
    /// Character the puzzle does not accept (digit in a word, letter in a code).
    InvalidCharacter(char),
    /// Attempt already holds as many characters as the target.
    Full,
    /// Nothing to remove.
    Empty,
    /// No unused tile carries this letter.
    NotInPool(char),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyWon => f.write_str("Already solved!"),
            Self::WrongLength { expected, .. } => write!(f, "Answer must be exactly {expected} characters!"),
            Self::InvalidCharacter(c) => write!(f, "'{c}' is not allowed here"),
            Self::Full => f.write_str("No more room"),
            Self::Empty => f.write_str("Nothing to remove"),
            Self::NotInPool(c) => write!(f, "No '{c}' left to use"),
        }
    }
}

pub type EditResult = Result<(), Rejection>;

/// Common surface of the three puzzles.
pub trait Puzzle: Persisted {
    /// Fresh state for this puzzle's configured target.
    fn initial(&self) -> Self;

    fn status(&self) -> Status;

    /// Characters typed so far in the attempt.
    fn attempt(&self) -> &str;

    /// Length a submission must have.
    fn target_len(&self) -> usize;

    /// Adopt a persisted record for this puzzle's target. The target is not
    /// part of the record, so a record saved for a different target (say, a
    /// changed answer length) is refused here.
    fn restore(&self, saved: Self) -> Option<Self>;
}

/// A puzzle bound to its store: hydrated on creation, written on every
/// change, cleared on reset.
pub struct PuzzleSession<'s, P: Puzzle> {
    state: P,
    store: &'s dyn KeyValueStore,
}

impl<'s, P: Puzzle> PuzzleSession<'s, P> {
    /// Hydrate `fresh` from the store. Records that fail validation or were
    /// saved for a different target leave `fresh` untouched.
    pub fn open(fresh: P, store: &'s dyn KeyValueStore) -> Self {
        let state = load_record::<P>(store)
            .and_then(|saved| fresh.restore(saved))
            .unwrap_or(fresh);
        Self { state, store }
    }

    #[must_use]
    pub fn state(&self) -> &P {
        &self.state
    }

    /// Apply a change and persist the result if anything was accepted.
    pub fn apply<T>(&mut self, change: impl FnOnce(&mut P) -> Result<T, Rejection>) -> Result<T, Rejection> {
        let outcome = change(&mut self.state)?;
        save_record(self.store, &self.state);
        Ok(outcome)
    }

    pub fn reset(&mut self) {
        clear_record::<P>(self.store);
        self.state = self.state.initial();
    }
}

/// Keep only ASCII letters, upper-cased, at most `max` of them.
#[must_use]
pub fn sanitize_letters(input: &str, max: usize) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .take(max)
        .collect()
}

/// Keep only ASCII digits, at most `max` of them.
#[must_use]
pub fn sanitize_digits(input: &str, max: usize) -> String {
    input.chars().filter(char::is_ascii_digit).take(max).collect()
}
