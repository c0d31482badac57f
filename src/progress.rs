//! Home-screen gating.
//!
//! `aggregate` is pure: it takes the latest state of each dependency as a
//! parameter. `load_inputs` is the only part that touches the store.

use crate::config::Settings;
use crate::geofence::{GeofenceGate, GeofenceRecord};
use crate::puzzle::{AnagramGame, LockGame, Puzzle, Status, WordGame};
use crate::store::{KeyValueStore, load_record};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    LocationClues,
    Lockbox,
    GoToLocation,
    Activity,
}

impl Stage {
    pub const ALL: [Self; 4] = [
        Self::LocationClues,
        Self::Lockbox,
        Self::GoToLocation,
        Self::Activity,
    ];

    #[must_use]
    pub const fn number(self) -> usize {
        match self {
            Self::LocationClues => 1,
            Self::Lockbox => 2,
            Self::GoToLocation => 3,
            Self::Activity => 4,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::LocationClues => "Location clue",
            Self::Lockbox => "Lockbox code clue",
            Self::GoToLocation => "Go to location",
            Self::Activity => "Activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Locked,
    Unlocked,
    Done,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Locked => "locked",
            Self::Unlocked => "open",
            Self::Done => "done",
        })
    }
}

/// Latest known state of every dependency; `None` means never played.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressInputs {
    pub word: Option<Status>,
    pub anagram: Option<Status>,
    pub lock: Option<Status>,
    pub geofence: Option<GeofenceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub location_clues: StageState,
    pub lockbox: StageState,
    pub go_to_location: StageState,
    pub activity: StageState,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn state(&self, stage: Stage) -> StageState {
        match stage {
            Stage::LocationClues => self.location_clues,
            Stage::Lockbox => self.lockbox,
            Stage::GoToLocation => self.go_to_location,
            Stage::Activity => self.activity,
        }
    }

    #[must_use]
    pub fn is_reachable(&self, stage: Stage) -> bool {
        self.state(stage) != StageState::Locked
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, StageState)> + '_ {
        Stage::ALL.into_iter().map(|stage| (stage, self.state(stage)))
    }
}

fn won(status: Option<Status>) -> bool {
    status.is_some_and(Status::is_won)
}

fn gate(reachable: bool, done: bool) -> StageState {
    match (reachable, done) {
        (false, _) => StageState::Locked,
        (true, true) => StageState::Done,
        (true, false) => StageState::Unlocked,
    }
}

/// Derive the linear unlock sequence.
///
/// A stage opens only when every stage before it is done, so a leftover
/// record further down the chain never skips a puzzle. The lockbox needs
/// *both* location clues solved.
#[must_use]
pub fn aggregate(inputs: &ProgressInputs) -> ProgressSnapshot {
    let clues_done = won(inputs.word) && won(inputs.anagram);
    let lock_done = clues_done && won(inputs.lock);
    let arrived = lock_done && inputs.geofence.is_some_and(|r| r.inside);

    ProgressSnapshot {
        location_clues: gate(true, clues_done),
        lockbox: gate(clues_done, lock_done),
        go_to_location: gate(lock_done, arrived),
        // No completion record exists for the activity itself
        activity: gate(arrived, false),
    }
}

/// Read every dependency from the store for `aggregate`.
///
/// Records are judged against the configured answers, the same way an
/// opened session would judge them.
pub fn load_inputs(store: &dyn KeyValueStore, settings: &Settings) -> ProgressInputs {
    ProgressInputs {
        word: load_status(WordGame::new(&settings.word_answer), store),
        anagram: load_status(AnagramGame::new(&settings.anagram_answer), store),
        lock: load_status(LockGame::new(&settings.lock_code), store),
        geofence: GeofenceGate::new(settings.target, settings.radius_m)
            .hydrate(store)
            .record(),
    }
}

fn load_status<P: Puzzle>(fresh: P, store: &dyn KeyValueStore) -> Option<Status> {
    load_record::<P>(store)
        .and_then(|saved| fresh.restore(saved))
        .map(|p| p.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::PuzzleSession;
    use crate::store::MemoryStore;

    fn record(inside: bool) -> GeofenceRecord {
        GeofenceRecord {
            ts: 1,
            lat: 0.0,
            lng: 0.0,
            distance: if inside { 10.0 } else { 5000.0 },
            inside,
        }
    }

    fn all_won() -> ProgressInputs {
        ProgressInputs {
            word: Some(Status::Won),
            anagram: Some(Status::Won),
            lock: Some(Status::Won),
            geofence: Some(record(true)),
        }
    }

    #[test]
    fn test_nothing_played() {
        let snapshot = aggregate(&ProgressInputs::default());
        assert_eq!(snapshot.location_clues, StageState::Unlocked);
        assert_eq!(snapshot.lockbox, StageState::Locked);
        assert_eq!(snapshot.go_to_location, StageState::Locked);
        assert_eq!(snapshot.activity, StageState::Locked);
    }

    #[test]
    fn test_one_clue_is_not_enough() {
        for inputs in [
            ProgressInputs {
                word: Some(Status::Won),
                ..Default::default()
            },
            ProgressInputs {
                anagram: Some(Status::Won),
                ..Default::default()
            },
        ] {
            let snapshot = aggregate(&inputs);
            assert_eq!(snapshot.location_clues, StageState::Unlocked);
            assert_eq!(snapshot.lockbox, StageState::Locked);
        }
    }

    #[test]
    fn test_both_clues_unlock_lockbox() {
        let snapshot = aggregate(&ProgressInputs {
            word: Some(Status::Won),
            anagram: Some(Status::Won),
            lock: Some(Status::Wrong),
            geofence: None,
        });
        assert_eq!(snapshot.location_clues, StageState::Done);
        assert_eq!(snapshot.lockbox, StageState::Unlocked);
        assert_eq!(snapshot.go_to_location, StageState::Locked);
    }

    #[test]
    fn test_outside_keeps_activity_locked() {
        let snapshot = aggregate(&ProgressInputs {
            geofence: Some(record(false)),
            ..all_won()
        });
        assert_eq!(snapshot.go_to_location, StageState::Unlocked);
        assert_eq!(snapshot.activity, StageState::Locked);
    }

    #[test]
    fn test_everything_done() {
        let snapshot = aggregate(&all_won());
        assert_eq!(snapshot.location_clues, StageState::Done);
        assert_eq!(snapshot.lockbox, StageState::Done);
        assert_eq!(snapshot.go_to_location, StageState::Done);
        assert_eq!(snapshot.activity, StageState::Unlocked);
    }

    #[test]
    fn test_later_progress_without_earlier_stays_locked() {
        // A stray geofence record must not skip the puzzles
        let snapshot = aggregate(&ProgressInputs {
            geofence: Some(record(true)),
            lock: Some(Status::Won),
            ..Default::default()
        });
        assert_eq!(snapshot.lockbox, StageState::Locked);
        assert_eq!(snapshot.go_to_location, StageState::Locked);
        assert_eq!(snapshot.activity, StageState::Locked);
    }

    #[test]
    fn test_load_inputs_from_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(
            load_inputs(&store, &Settings::default()),
            ProgressInputs::default()
        );
    }

    #[test]
    fn test_load_inputs_ignores_win_for_other_code() {
        let store = MemoryStore::new();
        let mut session = PuzzleSession::open(LockGame::new("1234"), &store);
        for d in "1234".chars() {
            session.apply(|lock| lock.push_digit(d)).unwrap();
        }
        session.apply(LockGame::submit).unwrap();
        assert_eq!(session.state().status(), Status::Won);

        let inputs = load_inputs(&store, &Settings::default());
        assert_eq!(inputs.lock, None);
    }

    #[test]
    fn test_iter_in_order() {
        let stages: Vec<usize> = aggregate(&all_won()).iter().map(|(s, _)| s.number()).collect();
        assert_eq!(stages, vec![1, 2, 3, 4]);
    }
}
