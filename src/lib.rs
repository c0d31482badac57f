// Library interface for the-hunt
// This allows integration tests to access internal modules

pub mod logging;

pub mod app;
pub mod cli;
pub mod config;
pub mod evaluate;
pub mod geofence;
pub mod location;
pub mod progress;
pub mod puzzle;
pub mod store;
pub mod tui;

// Re-export commonly used items for easier testing
pub use evaluate::{Evaluation, KeyboardState, LetterResult, evaluate_guess, exact_match};
pub use geofence::{GeofenceGate, haversine_meters};
pub use progress::{ProgressSnapshot, Stage, StageState, aggregate};
pub use puzzle::{AnagramGame, LockGame, PuzzleSession, Status, WordGame};
pub use store::{FileStore, KeyValueStore, MemoryStore};
