use super::{EditResult, Puzzle, Rejection, Status};
use crate::evaluate::exact_match;
use crate::store::Persisted;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ANSWER: &str = "DANCERS";

/// Rearrange a shuffled pool of tiles into the answer.
///
/// `used` holds pool indices in the order they were picked, so a pool with
/// repeated letters still tracks exactly which tile went where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnagramGame {
    #[serde(skip)]
    answer: String,
    pool: Vec<char>,
    used: Vec<usize>,
    current: String,
    status: Status,
    attempts: u32,
}

impl AnagramGame {
    /// New game with the answer's letters shuffled by the thread RNG.
    #[must_use]
    pub fn new(answer: &str) -> Self {
        Self::with_rng(answer, &mut rand::rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(answer: &str, rng: &mut R) -> Self {
        let answer = answer.to_ascii_uppercase();
        let mut pool: Vec<char> = answer.chars().collect();
        pool.shuffle(rng);
        Self {
            answer,
            pool,
            used: Vec::new(),
            current: String::new(),
            status: Status::Playing,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &[char] {
        &self.pool
    }

    #[must_use]
    pub fn is_used(&self, index: usize) -> bool {
        self.used.contains(&index)
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn reopen_after_wrong(&mut self) {
        if self.status == Status::Wrong {
            self.status = Status::Playing;
        }
    }

    /// Pick pool tile `index`. Filling the last slot while playing submits
    /// straight away; the returned flag is the submission result, if any.
    pub fn select(&mut self, index: usize) -> Result<Option<bool>, Rejection> {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        if self.current.chars().count() >= self.target_len() {
            return Err(Rejection::Full);
        }
        let Some(&letter) = self.pool.get(index) else {
            return Err(Rejection::Empty);
        };
        if self.is_used(index) {
            return Err(Rejection::NotInPool(letter));
        }
        self.used.push(index);
        self.current.push(letter);

        let full = self.current.chars().count() == self.target_len();
        if full && self.status == Status::Playing {
            return self.submit().map(Some);
        }
        Ok(None)
    }

    /// Pick the first unused tile showing `letter`.
    pub fn type_letter(&mut self, letter: char) -> Result<Option<bool>, Rejection> {
        if !letter.is_ascii_alphabetic() {
            return Err(Rejection::InvalidCharacter(letter));
        }
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        if self.current.chars().count() >= self.target_len() {
            return Err(Rejection::Full);
        }
        let letter = letter.to_ascii_uppercase();
        let index = self
            .pool
            .iter()
            .enumerate()
            .position(|(i, c)| *c == letter && !self.is_used(i))
            .ok_or(Rejection::NotInPool(letter))?;
        self.select(index)
    }

    pub fn backspace(&mut self) -> EditResult {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        self.used.pop().ok_or(Rejection::Empty)?;
        self.current.pop();
        self.reopen_after_wrong();
        Ok(())
    }

    /// Return every picked tile to the pool.
    pub fn clear(&mut self) -> EditResult {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        self.used.clear();
        self.current.clear();
        self.reopen_after_wrong();
        Ok(())
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> EditResult {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        self.pool.shuffle(rng);
        self.clear()
    }

    /// Compare the arrangement with the answer; `true` on a match.
    pub fn submit(&mut self) -> Result<bool, Rejection> {
        if self.status.is_won() {
            return Err(Rejection::AlreadyWon);
        }
        let len = self.current.chars().count();
        if len != self.target_len() {
            return Err(Rejection::WrongLength {
                expected: self.target_len(),
                actual: len,
            });
        }
        self.attempts += 1;
        let solved = exact_match(&self.current, &self.answer);
        self.status = if solved { Status::Won } else { Status::Wrong };
        Ok(solved)
    }
}

impl Persisted for AnagramGame {
    const STORAGE_KEY: &'static str = "anagram-game-v1";
    const VERSION: u32 = 1;

    fn is_valid(&self) -> bool {
        let mut seen = vec![false; self.pool.len()];
        for &i in &self.used {
            match seen.get_mut(i) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        let picked: String = self.used.iter().map(|&i| self.pool[i]).collect();
        picked == self.current
    }
}

impl Puzzle for AnagramGame {
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
        self.answer.chars().count()
    }

    fn restore(&self, saved: Self) -> Option<Self> {
        // The saved pool must be a permutation of this answer
        let mut saved_letters = saved.pool.clone();
        let mut letters: Vec<char> = self.answer.chars().collect();
        saved_letters.sort_unstable();
        letters.sort_unstable();
        if saved_letters != letters {
            return None;
        }
        if saved.status.is_won() && !exact_match(&saved.current, &self.answer) {
            return None;
        }
        Some(Self {
            answer: self.answer.clone(),
            ..saved
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::PuzzleSession;
    use crate::store::{KeyValueStore, MemoryStore};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn game() -> AnagramGame {
        AnagramGame::with_rng(DEFAULT_ANSWER, &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_pool_is_permutation_of_answer() {
        let game = game();
        let mut pool = game.pool().to_vec();
        pool.sort_unstable();
        let mut expected: Vec<char> = DEFAULT_ANSWER.chars().collect();
        expected.sort_unstable();
        assert_eq!(pool, expected);
    }

    #[test]
    fn test_typing_answer_auto_submits_and_wins() {
        let mut game = game();
        let mut last = None;
        for c in "dancers".chars() {
            last = game.type_letter(c).unwrap();
        }
        assert_eq!(last, Some(true));
        assert_eq!(game.status(), Status::Won);
        assert_eq!(game.attempts(), 1);
    }

    #[test]
    fn test_wrong_arrangement_then_backspace_reopens() {
        let mut game = game();
        let mut last = None;
        for c in "SCARNED".chars() {
            last = game.type_letter(c).unwrap();
        }
        assert_eq!(last, Some(false));
        assert_eq!(game.status(), Status::Wrong);

        game.backspace().unwrap();
        assert_eq!(game.status(), Status::Playing);
        assert_eq!(game.attempt(), "SCARNE");
    }

    #[test]
    fn test_manual_resubmit_after_wrong() {
        let mut game = game();
        for c in "SCARNED".chars() {
            game.type_letter(c).unwrap();
        }
        assert_eq!(game.submit(), Ok(false));
        assert_eq!(game.attempts(), 2);
    }

    #[test]
    fn test_letter_not_in_pool() {
        let mut game = game();
        assert_eq!(game.type_letter('z'), Err(Rejection::NotInPool('Z')));
        game.type_letter('d').unwrap();
        assert_eq!(game.type_letter('d'), Err(Rejection::NotInPool('D')));
        assert_eq!(game.type_letter('4'), Err(Rejection::InvalidCharacter('4')));
    }

    #[test]
    fn test_typing_into_full_wrong_arrangement_reports_full() {
        let mut game = game();
        for c in "SCARNED".chars() {
            game.type_letter(c).unwrap();
        }
        assert_eq!(game.status(), Status::Wrong);
        assert_eq!(game.type_letter('D'), Err(Rejection::Full));
        assert_eq!(game.attempt(), "SCARNED");
    }

    #[test]
    fn test_select_same_tile_twice_rejected() {
        let mut game = game();
        game.select(0).unwrap();
        assert!(game.select(0).is_err());
        assert_eq!(game.attempt().len(), 1);
    }

    #[test]
    fn test_short_submit_rejected() {
        let mut game = game();
        game.type_letter('D').unwrap();
        assert_eq!(
            game.submit(),
            Err(Rejection::WrongLength {
                expected: 7,
                actual: 1
            })
        );
        assert_eq!(game.attempts(), 0);
    }

    #[test]
    fn test_clear_and_shuffle_return_tiles() {
        let mut game = game();
        game.type_letter('D').unwrap();
        game.type_letter('A').unwrap();
        game.clear().unwrap();
        assert_eq!(game.attempt(), "");
        assert!(!game.is_used(0));

        game.type_letter('D').unwrap();
        game.shuffle(&mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(game.attempt(), "");
    }

    #[test]
    fn test_won_is_terminal() {
        let mut game = game();
        for c in "DANCERS".chars() {
            game.type_letter(c).unwrap();
        }
        assert_eq!(game.backspace(), Err(Rejection::AlreadyWon));
        assert_eq!(game.clear(), Err(Rejection::AlreadyWon));
        assert_eq!(game.select(0), Err(Rejection::AlreadyWon));
    }

    #[test]
    fn test_hydrate_keeps_pool_order() {
        let store = MemoryStore::new();
        let mut session = PuzzleSession::open(game(), &store);
        session.apply(|g| g.type_letter('N')).unwrap();
        let pool = session.state().pool().to_vec();

        let reopened = PuzzleSession::open(AnagramGame::new(DEFAULT_ANSWER), &store);
        assert_eq!(reopened.state().pool(), pool.as_slice());
        assert_eq!(reopened.state().attempt(), "N");
    }

    #[test]
    fn test_inconsistent_selection_discarded() {
        let store = MemoryStore::new();
        store
            .set(
                AnagramGame::STORAGE_KEY,
                r#"{"version":1,"pool":["D","A","N","C","E","R","S"],"used":[0,0],
                    "current":"DD","status":"playing","attempts":0}"#,
            )
            .unwrap();
        let session = PuzzleSession::open(AnagramGame::new(DEFAULT_ANSWER), &store);
        assert_eq!(session.state().attempt(), "");
    }

    #[test]
    fn test_pool_for_other_answer_discarded() {
        let store = MemoryStore::new();
        store
            .set(
                AnagramGame::STORAGE_KEY,
                r#"{"version":1,"pool":["S","T","A","R","E","D","X"],"used":[],
                    "current":"","status":"playing","attempts":3}"#,
            )
            .unwrap();
        let session = PuzzleSession::open(AnagramGame::new(DEFAULT_ANSWER), &store);
        assert_eq!(session.state().attempts(), 0);
    }
}
