use super::{EditResult, Puzzle, Rejection, Status, sanitize_letters};
use crate::evaluate::{Evaluation, KeyboardState, evaluate_guess};
use crate::store::Persisted;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ANSWER: &str = "ALLEY";

/// Wordle-style puzzle with unlimited guesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordGame {
    #[serde(skip)]
    answer: String,
    guesses: Vec<String>,
    evaluations: Vec<Evaluation>,
    keys: KeyboardState,
    status: Status,
    #[serde(default)]
    current: String,
}

impl WordGame {
    #[must_use]
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_ascii_uppercase(),
            guesses: Vec::new(),
            evaluations: Vec::new(),
            keys: KeyboardState::new(),
            status: Status::Playing,
            current: String::new(),
        }
    }

    #[must_use]
    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    #[must_use]
    pub fn guesses(&self) -> &[String] {
        &self.guesses
    }

    #[must_use]
    pub fn keys(&self) -> &KeyboardState {
        &self.keys
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn push_letter(&mut self, letter: char) -> EditResult {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        if !letter.is_ascii_alphabetic() {
            return Err(Rejection::InvalidCharacter(letter));
        }
        if self.current.len() >= self.target_len() {
            return Err(Rejection::Full);
        }
        self.current.push(letter.to_ascii_uppercase());
        Ok(())
    }

    pub fn backspace(&mut self) -> EditResult {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        self.current.pop().map(|_| ()).ok_or(Rejection::Empty)
    }

    /// Score the current attempt. Incomplete attempts are rejected and leave
    /// the state as it was.
    pub fn submit(&mut self) -> Result<Evaluation, Rejection> {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        let guess = sanitize_letters(&self.current, self.target_len());
        let evaluation = evaluate_guess(&guess, &self.answer).map_err(|_| Rejection::WrongLength {
            expected: self.target_len(),
            actual: guess.len(),
        })?;

        self.keys.merge_evaluation(&evaluation);
        if evaluation.is_win() {
            self.status = Status::Won;
        }
        self.guesses.push(guess);
        self.evaluations.push(evaluation.clone());
        self.current.clear();
        Ok(evaluation)
    }
}

impl Persisted for WordGame {
    const STORAGE_KEY: &'static str = "word-game-v1";
    const VERSION: u32 = 1;

    fn is_valid(&self) -> bool {
        let valid_guess = |g: &String| !g.is_empty() && g.chars().all(|c| c.is_ascii_uppercase());
        let won = self.evaluations.last().is_some_and(Evaluation::is_win);

        self.status != Status::Wrong
            && self.guesses.len() == self.evaluations.len()
            && self.guesses.iter().all(valid_guess)
            && self
                .evaluations
                .iter()
                .all(|e| e.letters.len() == e.states.len())
            && self.keys.is_valid()
            && won == self.status.is_won()
    }
}

impl Puzzle for WordGame {
    fn initial(&self) -> Self {
        Self::new(&self.answer)
    }

    fn status(&self) -> Status {
        self.status
    }

    fn attempt(&self) -> &str {
        &self.current
    }

    fn target_len(&self) -> usize {
        self.answer.len()
    }

    fn restore(&self, saved: Self) -> Option<Self> {
        let len = self.target_len();
        // Every saved guess must score the same against this answer
        let fits = saved.guesses.len() == saved.evaluations.len()
            && saved
                .guesses
                .iter()
                .zip(&saved.evaluations)
                .all(|(g, e)| evaluate_guess(g, &self.answer).is_ok_and(|fresh| fresh == *e));
        fits.then(|| Self {
            answer: self.answer.clone(),
            current: sanitize_letters(&saved.current, len),
            ..saved
        })
    }
}
