//! Physical-presence gate: is the team within `radius` metres of the target?

use crate::info_log;
use crate::location::{Coordinate, LocationError, LocationProvider, PositionOptions};
use crate::store::{KeyValueStore, clear_key};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const DEFAULT_RADIUS_M: f64 = 200.0;
pub const DEFAULT_TARGET: Coordinate = Coordinate::new(-33.510_910, 151.333_041);
pub const STORAGE_KEY: &str = "geofence-gate-v1";

/// Great-circle distance between two points in metres (haversine).
#[must_use]
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Inclusive: a point exactly on the boundary is inside.
#[must_use]
pub fn is_inside(distance_m: f64, radius_m: f64) -> bool {
    distance_m <= radius_m
}

/// `"184 m"` below a kilometre, `"2.35 km"` from there on.
#[must_use]
pub fn format_distance(distance_m: f64) -> String {
    let m = distance_m.round();
    if m < 1000.0 {
        format!("{m:.0} m")
    } else {
        format!("{:.2} km", m / 1000.0)
    }
}

/// Last successful check, also used to avoid asking again on start-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRecord {
    /// Epoch millis of the check.
    pub ts: i64,
    pub lat: f64,
    pub lng: f64,
    pub distance: f64,
    pub inside: bool,
}

impl GeofenceRecord {
    fn is_valid(&self) -> bool {
        self.ts >= 0
            && Coordinate::new(self.lat, self.lng).is_valid()
            && self.distance.is_finite()
            && self.distance >= 0.0
    }
}

/// Read the record under `key`; anything malformed is treated as absent.
pub fn load_record(store: &dyn KeyValueStore, key: &str) -> Option<GeofenceRecord> {
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            log::warn!("Failed to read '{key}': {e}");
            return None;
        }
    };
    serde_json::from_str::<GeofenceRecord>(&raw)
        .ok()
        .filter(GeofenceRecord::is_valid)
}

pub fn save_record(store: &dyn KeyValueStore, key: &str, record: &GeofenceRecord) {
    let encoded = match serde_json::to_string(record) {
        Ok(encoded) => encoded,
        Err(e) => {
            log::warn!("Failed to encode '{key}': {e}");
            return;
        }
    };
    if let Err(e) = store.set(key, &encoded) {
        log::warn!("Failed to save '{key}': {e}");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoStatus {
    Idle,
    Requesting,
    Inside { distance_m: f64 },
    Outside { distance_m: f64 },
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct GeofenceGate {
    target: Coordinate,
    radius_m: f64,
    status: GeoStatus,
    record: Option<GeofenceRecord>,
}

impl GeofenceGate {
    #[must_use]
    pub fn new(target: Coordinate, radius_m: f64) -> Self {
        Self {
            target,
            radius_m,
            status: GeoStatus::Idle,
            record: None,
        }
    }

    /// Restore the previous decision so the team is not asked again.
    ///
    /// The saved position is measured again against the configured target,
    /// so a record from an older target or radius cannot open the activity.
    #[must_use]
    pub fn hydrate(mut self, store: &dyn KeyValueStore) -> Self {
        if let Some(saved) = load_record(store, STORAGE_KEY) {
            let distance = haversine_meters(Coordinate::new(saved.lat, saved.lng), self.target);
            let inside = is_inside(distance, self.radius_m);
            self.record = Some(GeofenceRecord {
                distance,
                inside,
                ..saved
            });
            self.status = if inside {
                GeoStatus::Inside { distance_m: distance }
            } else {
                GeoStatus::Outside { distance_m: distance }
            };
        }
        self
    }

    #[must_use]
    pub fn status(&self) -> &GeoStatus {
        &self.status
    }

    #[must_use]
    pub fn last_checked_at(&self) -> Option<i64> {
        self.record.map(|r| r.ts)
    }

    /// Latest successful check, as persisted.
    #[must_use]
    pub fn record(&self) -> Option<GeofenceRecord> {
        self.record
    }

    #[must_use]
    pub fn is_requesting(&self) -> bool {
        self.status == GeoStatus::Requesting
    }

    #[must_use]
    pub fn is_inside(&self) -> bool {
        matches!(self.status, GeoStatus::Inside { .. })
    }

    #[must_use]
    pub fn distance_label(&self) -> Option<String> {
        match self.status {
            GeoStatus::Inside { distance_m } | GeoStatus::Outside { distance_m } => {
                Some(format_distance(distance_m))
            }
            _ => None,
        }
    }

    pub fn begin_check(&mut self) {
        self.status = GeoStatus::Requesting;
    }

    /// Settle a check. Successful fixes are scored and persisted; failures
    /// only change the on-screen message.
    pub fn complete_check(
        &mut self,
        result: Result<Coordinate, LocationError>,
        now_ms: i64,
        store: &dyn KeyValueStore,
    ) {
        let position = match result {
            Ok(position) => position,
            Err(e) => {
                info_log!("Location check failed: {:?}", e);
                self.status = GeoStatus::Error {
                    message: e.to_string(),
                };
                return;
            }
        };

        let distance = haversine_meters(position, self.target);
        let inside = is_inside(distance, self.radius_m);
        info_log!("Location check: {:.1} m from target, inside={}", distance, inside);

        self.status = if inside {
            GeoStatus::Inside {
                distance_m: distance,
            }
        } else {
            GeoStatus::Outside {
                distance_m: distance,
            }
        };
        let record = GeofenceRecord {
            ts: now_ms,
            lat: position.lat,
            lng: position.lng,
            distance,
            inside,
        };
        self.record = Some(record);
        save_record(store, STORAGE_KEY, &record);
    }

    /// Blocking check against `provider`; `None` means this terminal has no
    /// way of locating itself.
    pub fn check_now(
        &mut self,
        provider: Option<&dyn LocationProvider>,
        options: &PositionOptions,
        store: &dyn KeyValueStore,
    ) {
        self.begin_check();
        let result = provider.map_or(Err(LocationError::Unsupported), |p| p.current_position(options));
        self.complete_check(result, chrono::Utc::now().timestamp_millis(), store);
    }

    pub fn reset(&mut self, store: &dyn KeyValueStore) {
        clear_key(store, STORAGE_KEY);
        self.status = GeoStatus::Idle;
        self.record = None;
    }
}
