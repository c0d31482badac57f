use crate::geofence::{DEFAULT_RADIUS_M, DEFAULT_TARGET};
use crate::location::{Coordinate, DEFAULT_TIMEOUT, PositionOptions};
use crate::puzzle::{anagram, lock, word};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "the-hunt";

const MOONWALK_URL: &str = "https://www.youtube.com/embed/fXQAAoFsWrA?autoplay=1&playsinline=1";
const AIRWALK_URL: &str = "https://www.youtube.com/embed/H0qQfljdhCg?autoplay=1&playsinline=1";

/// `config.toml` as written by the organisers. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct HuntConfig {
    pub puzzles: Option<PuzzlesConfig>,
    pub geofence: Option<GeofenceConfig>,
    pub activity: Option<ActivityConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PuzzlesConfig {
    pub word_answer: Option<String>,
    pub anagram_answer: Option<String>,
    pub lock_code: Option<String>,
    pub lock_clues: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeofenceConfig {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_m: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub fix_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityConfig {
    pub videos: Option<Vec<VideoConfig>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoConfig {
    pub label: String,
    pub url: String,
}

impl HuntConfig {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file is silent; unreadable or invalid files are logged and skipped.
    pub fn load(path: Option<&Path>) -> Option<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("Failed to read config at {:?}: {}", path, err);
                return None;
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                log::warn!("Failed to parse config at {:?}: {}", path, err);
                None
            }
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Default data directory, `<data_dir>/the-hunt`.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR))
}

/// Fully resolved settings used by the rest of the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub word_answer: String,
    pub anagram_answer: String,
    pub lock_code: String,
    pub lock_clues: Vec<String>,
    pub target: Coordinate,
    pub radius_m: f64,
    pub position: PositionOptions,
    pub fix_file: Option<PathBuf>,
    pub videos: Vec<VideoConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            word_answer: word::DEFAULT_ANSWER.to_string(),
            anagram_answer: anagram::DEFAULT_ANSWER.to_string(),
            lock_code: lock::DEFAULT_CODE.to_string(),
            lock_clues: lock::DEFAULT_CLUES.iter().map(ToString::to_string).collect(),
            target: DEFAULT_TARGET,
            radius_m: DEFAULT_RADIUS_M,
            position: PositionOptions::default(),
            fix_file: None,
            videos: vec![
                VideoConfig {
                    label: "Moonwalk tutorial".to_string(),
                    url: MOONWALK_URL.to_string(),
                },
                VideoConfig {
                    label: "Airwalk tutorial".to_string(),
                    url: AIRWALK_URL.to_string(),
                },
            ],
        }
    }
}

fn letters_only(value: String, field: &str) -> Option<String> {
    let ok = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic());
    if !ok {
        log::warn!("Ignoring {field} = {value:?}: letters only");
    }
    ok.then(|| value.to_ascii_uppercase())
}

impl From<HuntConfig> for Settings {
    fn from(config: HuntConfig) -> Self {
        let mut settings = Self::default();

        if let Some(puzzles) = config.puzzles {
            if let Some(answer) = puzzles.word_answer.and_then(|v| letters_only(v, "word_answer")) {
                settings.word_answer = answer;
            }
            if let Some(answer) = puzzles
                .anagram_answer
                .and_then(|v| letters_only(v, "anagram_answer"))
            {
                settings.anagram_answer = answer;
            }
            match puzzles.lock_code {
                Some(code) if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) => {
                    settings.lock_code = code;
                }
                Some(code) => log::warn!("Ignoring lock_code = {code:?}: digits only"),
                None => {}
            }
            if let Some(clues) = puzzles.lock_clues {
                settings.lock_clues = clues;
            }
        }

        if let Some(geofence) = config.geofence {
            let target = Coordinate::new(
                geofence.lat.unwrap_or(settings.target.lat),
                geofence.lng.unwrap_or(settings.target.lng),
            );
            if target.is_valid() {
                settings.target = target;
            } else {
                log::warn!("Ignoring geofence target {target:?}: out of range");
            }
            if let Some(radius) = geofence.radius_m.filter(|r| r.is_finite() && *r >= 0.0) {
                settings.radius_m = radius;
            }
            settings.position.timeout = geofence
                .timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
            settings.fix_file = geofence.fix_file;
        }

        if let Some(videos) = config.activity.and_then(|a| a.videos) {
            settings.videos = videos;
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_match_the_hunt() {
        let settings = Settings::default();
        assert_eq!(settings.word_answer, "ALLEY");
        assert_eq!(settings.anagram_answer, "DANCERS");
        assert_eq!(settings.lock_code, "7662");
        assert_eq!(settings.lock_clues.len(), 4);
        assert_eq!(settings.radius_m, 200.0);
        assert_eq!(settings.position.timeout, Duration::from_secs(10));
        assert_eq!(settings.position.maximum_age, Duration::ZERO);
        assert_eq!(settings.videos.len(), 2);
    }

    #[test]
    fn test_load_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[puzzles]
word_answer = "crane"
lock_code = "1234"

[geofence]
lat = -33.87625
lng = 151.201083
radius_m = 50.0
timeout_secs = 3
fix_file = "/tmp/fix.json"
"#,
        )
        .unwrap();

        let settings = Settings::from(HuntConfig::load(Some(&path)).unwrap());
        assert_eq!(settings.word_answer, "CRANE");
        assert_eq!(settings.anagram_answer, "DANCERS");
        assert_eq!(settings.lock_code, "1234");
        assert_eq!(settings.target, Coordinate::new(-33.87625, 151.201083));
        assert_eq!(settings.radius_m, 50.0);
        assert_eq!(settings.position.timeout, Duration::from_secs(3));
        assert_eq!(settings.fix_file, Some(PathBuf::from("/tmp/fix.json")));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config: HuntConfig = toml::from_str(
            r#"
[puzzles]
word_answer = "al1ey"
lock_code = "76a2"

[geofence]
lat = 123.0
radius_m = -4.0
"#,
        )
        .unwrap();
        let settings = Settings::from(config);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HuntConfig::load(Some(&dir.path().join("absent.toml"))).is_none());
    }

    #[test]
    fn test_invalid_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[puzzles\nword_answer = ").unwrap();
        assert!(HuntConfig::load(Some(&path)).is_none());
    }
}
