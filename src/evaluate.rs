use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Per-position result of scoring a guess.
///
/// Variants are declared weakest first so the derived `Ord` is the
/// keyboard strength order: `Absent < Present < Correct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterResult {
    Absent,  // Gray
    Present, // Yellow
    Correct, // Green
}

impl LetterResult {
    #[must_use]
    pub const fn strength(self) -> u8 {
        match self {
            Self::Absent => 0,
            Self::Present => 1,
            Self::Correct => 2,
        }
    }

    /// Single-character marker used by the line-mode output.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Correct => 'G',
            Self::Present => 'Y',
            Self::Absent => 'X',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluateError {
    #[error("guess has {guess} letters but the answer has {answer}")]
    LengthMismatch { guess: usize, answer: usize },
}

/// Scored guess: the guessed letters and one result per position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub letters: Vec<char>,
    pub states: Vec<LetterResult>,
}

impl Evaluation {
    #[must_use]
    pub fn is_win(&self) -> bool {
        !self.states.is_empty() && self.states.iter().all(|s| *s == LetterResult::Correct)
    }

    #[must_use]
    pub fn markers(&self) -> String {
        self.states.iter().map(|s| s.marker()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, LetterResult)> + '_ {
        self.letters.iter().copied().zip(self.states.iter().copied())
    }
}

/// Score `guess` against `answer` with duplicate-letter handling.
///
/// Exact matches are marked first and only the unmatched answer letters are
/// counted, so `Present` is never handed out more often than the answer has
/// spare copies of a letter.
pub fn evaluate_guess(guess: &str, answer: &str) -> Result<Evaluation, EvaluateError> {
    let guess: Vec<char> = guess.chars().map(|c| c.to_ascii_uppercase()).collect();
    let answer: Vec<char> = answer.chars().map(|c| c.to_ascii_uppercase()).collect();
    if guess.len() != answer.len() {
        return Err(EvaluateError::LengthMismatch {
            guess: guess.len(),
            answer: answer.len(),
        });
    }

    let mut states: Vec<Option<LetterResult>> = vec![None; guess.len()];
    let mut remaining: HashMap<char, usize> = HashMap::new();

    // First pass: greens
    for (i, (g, a)) in guess.iter().zip(&answer).enumerate() {
        if g == a {
            states[i] = Some(LetterResult::Correct);
        } else {
            *remaining.entry(*a).or_insert(0) += 1;
        }
    }

    // Second pass: yellows from what the greens left over
    for (i, g) in guess.iter().enumerate() {
        if states[i].is_some() {
            continue;
        }
        states[i] = match remaining.get_mut(g) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Some(LetterResult::Present)
            }
            _ => Some(LetterResult::Absent),
        };
    }

    Ok(Evaluation {
        letters: guess,
        states: states
            .into_iter()
            .map(|s| s.unwrap_or(LetterResult::Absent))
            .collect(),
    })
}

/// Case-insensitive exact comparison used by the lock and the anagram.
#[must_use]
pub fn exact_match(attempt: &str, target: &str) -> bool {
    attempt.len() == target.len() && attempt.eq_ignore_ascii_case(target)
}

/// Strongest result seen for each letter across every guess of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyboardState {
    keys: BTreeMap<char, LetterResult>,
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, letter: char) -> Option<LetterResult> {
        self.keys.get(&letter.to_ascii_uppercase()).copied()
    }

    /// Record `result` for `letter` unless a stronger one is already known.
    pub fn merge(&mut self, letter: char, result: LetterResult) {
        let letter = letter.to_ascii_uppercase();
        match self.keys.get(&letter) {
            Some(current) if current.strength() >= result.strength() => {}
            _ => {
                self.keys.insert(letter, result);
            }
        }
    }

    pub fn merge_evaluation(&mut self, evaluation: &Evaluation) {
        for (letter, result) in evaluation.iter() {
            self.merge(letter, result);
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.keys.keys().all(char::is_ascii_uppercase)
    }
}
