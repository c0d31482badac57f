use super::{EditResult, Puzzle, Rejection, Status, sanitize_digits};
use crate::evaluate::exact_match;
use crate::store::Persisted;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CODE: &str = "7662";

pub const DEFAULT_CLUES: [&str; 4] = [
    "One of us is an odd number but take a letter away and we're all even.",
    "In time, 9 plus 5 makes the smallest of us.",
    "We start at the summit and end at the floor.",
    "All together we are twenty-one.",
];

/// Numeric combination lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockGame {
    #[serde(skip)]
    code: String,
    current: String,
    status: Status,
    #[serde(default)]
    attempts: u32,
}

impl LockGame {
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            current: String::new(),
            status: Status::Playing,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A wrong code stays on screen until the next edit, which also puts the
    /// lock back into play.
    fn begin_edit(&mut self) -> EditResult {
        match self.status {
            Status::Won => Err(Rejection::AlreadyWon),
            Status::Wrong => {
                self.status = Status::Playing;
                Ok(())
            }
            Status::Playing => Ok(()),
        }
    }

    pub fn push_digit(&mut self, digit: char) -> EditResult {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        if !digit.is_ascii_digit() {
            return Err(Rejection::InvalidCharacter(digit));
        }
        // A key press reopens a wrong lock even when the digit does not fit
        self.begin_edit()?;
        if self.current.len() >= self.target_len() {
            return Err(Rejection::Full);
        }
        self.current.push(digit);
        Ok(())
    }

    pub fn backspace(&mut self) -> EditResult {
        self.begin_edit()?;
        self.current.pop();
        Ok(())
    }

    /// Compare the attempt with the code; `true` on a match.
    pub fn submit(&mut self) -> Result<bool, Rejection> {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        if self.current.len() != self.target_len() {
            return Err(Rejection::WrongLength {
                expected: self.target_len(),
                actual: self.current.len(),
            });
        }
        self.attempts += 1;
        let opened = exact_match(&self.current, &self.code);
        self.status = if opened { Status::Won } else { Status::Wrong };
        Ok(opened)
    }
}

impl Persisted for LockGame {
    const STORAGE_KEY: &'static str = "number-game-v1";
    const VERSION: u32 = 2;

    fn is_valid(&self) -> bool {
        self.current.chars().all(|c| c.is_ascii_digit())
    }
}

impl Puzzle for LockGame {
    fn initial(&self) -> Self {
        Self::new(&self.code)
    }

    fn status(&self) -> Status {
        self.status
    }

    fn attempt(&self) -> &str {
        &self.current
    }

    fn target_len(&self) -> usize {
        self.code.len()
    }

    fn restore(&self, saved: Self) -> Option<Self> {
        let len = self.target_len();
        // A saved win only counts if the saved digits still open this lock
        if saved.status.is_won() && !exact_match(&saved.current, &self.code) {
            return None;
        }
        Some(Self {
            code: self.code.clone(),
            current: sanitize_digits(&saved.current, len),
            ..saved
        })
    }
}
