//! One-shot "where am I" requests.
//!
//! A terminal has no built-in positioning, so fixes come from either a
//! coordinate given on the command line or a fix file kept up to date by an
//! external GPS bridge (`{"lat": .., "lng": .., "ts": <epoch millis>}`).

use crate::{debug_log, info_log};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const FIX_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl FromStr for Coordinate {
    type Err = String;

    /// Parses `"LAT,LNG"` in decimal degrees.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LNG but got '{s}'"))?;
        let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
        let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
        let coordinate = Self::new(lat, lng);
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(format!("coordinate out of range: {lat},{lng}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// Oldest fix that may be reused. Zero means only fixes taken after the
    /// request started count.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

/// Why no position came back. Each variant renders its own message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Geolocation is not available in this terminal.")]
    Unsupported,
    #[error("Permission denied. Please allow location access.")]
    PermissionDenied,
    #[error("Location unavailable. Move to an open area or try again.")]
    PositionUnavailable,
    #[error("Timed out. Try again.")]
    Timeout,
    #[error("{}", unknown_message(.0))]
    Unknown(String),
}

fn unknown_message(detail: &str) -> &str {
    if detail.is_empty() { "Unknown error." } else { detail }
}

pub trait LocationProvider: Send + Sync {
    fn current_position(&self, options: &PositionOptions) -> Result<Coordinate, LocationError>;
}

/// Always reports the same point.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinate);

impl LocationProvider for FixedLocation {
    fn current_position(&self, _options: &PositionOptions) -> Result<Coordinate, LocationError> {
        Ok(self.0)
    }
}

#[derive(Debug, Deserialize)]
struct Fix {
    lat: f64,
    lng: f64,
    /// Epoch millis when the fix was taken.
    ts: i64,
}

/// Polls a fix file until a fresh enough fix shows up.
#[derive(Debug, Clone)]
pub struct FixFileLocation {
    path: PathBuf,
}

impl FixFileLocation {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_fix(&self) -> Result<Option<Fix>, LocationError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(LocationError::PermissionDenied);
            }
            Err(e) => return Err(LocationError::Unknown(e.to_string())),
        };
        // The bridge may be mid-write; an unreadable fix is retried
        Ok(serde_json::from_str(&raw).ok())
    }
}

impl LocationProvider for FixFileLocation {
    fn current_position(&self, options: &PositionOptions) -> Result<Coordinate, LocationError> {
        let started = Instant::now();
        let max_age_ms = i64::try_from(options.maximum_age.as_millis()).unwrap_or(i64::MAX);
        let oldest_ok = chrono::Utc::now().timestamp_millis().saturating_sub(max_age_ms);
        let mut saw_fix = false;

        info_log!("Waiting for a fix in {}", self.path.display());
        loop {
            if let Some(fix) = self.read_fix()? {
                saw_fix = true;
                let coordinate = Coordinate::new(fix.lat, fix.lng);
                if fix.ts >= oldest_ok {
                    if !coordinate.is_valid() {
                        return Err(LocationError::PositionUnavailable);
                    }
                    return Ok(coordinate);
                }
                debug_log!("Stale fix from {} (need >= {})", fix.ts, oldest_ok);
            }

            if started.elapsed() >= options.timeout {
                // Never saw anything at all: nothing is feeding positions
                return Err(if saw_fix {
                    LocationError::Timeout
                } else {
                    LocationError::PositionUnavailable
                });
            }
            thread::sleep(FIX_POLL_INTERVAL.min(options.timeout));
        }
    }
}
