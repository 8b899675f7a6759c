use std::collections::{HashMap, HashSet, hash_map::Entry};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LocationError;

/// Format of `dt_txt` in forecast entries, e.g. `2023-01-01 09:00:00`.
pub const FORECAST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Seconds after midnight of the forecast slot shown per day.
const MORNING_SLOT_SECS: i64 = 9 * 3600;

/// How far from 09:00 a reading may drift and still stand in for a day
/// that has no exact 09:00:00 entry.
const MORNING_SLOT_TOLERANCE_SECS: i64 = 90 * 60;

/// Geographic position of the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !valid {
            return Err(LocationError::InvalidCoordinates { latitude, longitude });
        }

        Ok(Self { latitude, longitude })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Read access to the fields of an OpenWeather reading.
///
/// Both the current-weather payload and each forecast entry share the
/// `main` / `weather` / `wind` layout, so the renderer goes through this
/// trait for either. Missing or ill-typed fields read as `None`.
pub trait Reading {
    fn fields(&self) -> &Map<String, Value>;

    fn temperature(&self) -> Option<f64> {
        self.fields().get("main")?.get("temp")?.as_f64()
    }

    fn feels_like(&self) -> Option<f64> {
        self.fields().get("main")?.get("feels_like")?.as_f64()
    }

    fn humidity(&self) -> Option<u64> {
        self.fields().get("main")?.get("humidity")?.as_u64()
    }

    fn wind_speed(&self) -> Option<f64> {
        self.fields().get("wind")?.get("speed")?.as_f64()
    }

    fn description(&self) -> Option<&str> {
        self.fields().get("weather")?.get(0)?.get("description")?.as_str()
    }
}

/// Payload of the current-weather endpoint, kept as returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrentConditions(Map<String, Value>);

impl CurrentConditions {
    /// Wraps a JSON object; an object without fields carries no conditions.
    pub fn from_object(object: Map<String, Value>) -> Option<Self> {
        if object.is_empty() { None } else { Some(Self(object)) }
    }

    /// Location name reported by the service.
    pub fn location_name(&self) -> Option<&str> {
        self.0.get("name")?.as_str()
    }
}

impl Reading for CurrentConditions {
    fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// One periodic reading of the forecast list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub dt_txt: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ForecastEntry {
    /// Stable identity of the entry within a forecast.
    pub fn key(&self) -> &str {
        &self.dt_txt
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.dt_txt, FORECAST_TIME_FORMAT).ok()
    }
}

impl Reading for ForecastEntry {
    fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

pub type ForecastList = Vec<ForecastEntry>;

/// Keeps one reading per day: the 09:00:00 entry.
///
/// A day without an exact 09:00:00 entry keeps its reading nearest to 09:00
/// if that lies within 90 minutes; otherwise the day is dropped. Entries
/// with an unparseable `dt_txt` are dropped. Order is preserved and the
/// operation is idempotent.
pub fn filter_morning_slot(entries: Vec<ForecastEntry>) -> ForecastList {
    let mut nearest: HashMap<NaiveDate, (usize, i64)> = HashMap::new();
    let mut days: Vec<NaiveDate> = Vec::new();

    for (idx, entry) in entries.iter().enumerate() {
        let Some(ts) = entry.timestamp() else {
            tracing::warn!(dt_txt = %entry.dt_txt, "skipping forecast entry with unparseable time");
            continue;
        };

        let offset = (i64::from(ts.num_seconds_from_midnight()) - MORNING_SLOT_SECS).abs();

        match nearest.entry(ts.date()) {
            Entry::Occupied(mut slot) => {
                if offset < slot.get().1 {
                    slot.insert((idx, offset));
                }
            }
            Entry::Vacant(slot) => {
                days.push(ts.date());
                slot.insert((idx, offset));
            }
        }
    }

    let keep: HashSet<usize> = days
        .iter()
        .filter_map(|day| {
            let &(idx, offset) = nearest.get(day)?;
            if offset == 0 {
                Some(idx)
            } else if offset <= MORNING_SLOT_TOLERANCE_SECS {
                tracing::debug!(
                    %day,
                    dt_txt = %entries[idx].dt_txt,
                    "no 09:00:00 reading, using nearest"
                );
                Some(idx)
            } else {
                tracing::warn!(%day, "no forecast reading near 09:00, skipping day");
                None
            }
        })
        .collect();

    entries
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep.contains(idx))
        .map(|(_, entry)| entry)
        .collect()
}
