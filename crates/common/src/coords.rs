//! Coordinate normalization.
//!
//! Points reach us in several shapes: `[lng, lat]` arrays from GeoJSON and the
//! routing API, `{lat, lng}` objects from the map page and `{latitude,
//! longitude}` objects from device location and stored route records. Every
//! one of them is folded into a [`Coordinate`] here, so the rest of the code
//! only ever sees canonical `(longitude, latitude)` pairs.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::haversine_distance;

const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;
const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;

/// A canonical geographic point.
///
/// Serializes as a `[longitude, latitude]` array. Deserializes from any of the
/// shapes accepted by [`normalize_value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// `true` when both axes fall inside their geographic ranges.
    pub fn is_valid(&self) -> bool {
        LONGITUDE_RANGE.contains(&self.longitude) && LATITUDE_RANGE.contains(&self.latitude)
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.longitude, self.latitude)
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Point::new(c.longitude, c.latitude)
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.longitude, y: c.latitude }
    }
}

impl From<geo::Coord<f64>> for Coordinate {
    fn from(c: geo::Coord<f64>) -> Self {
        Coordinate::new(c.x, c.y)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        normalize_value(&value)
            .ok_or_else(|| de::Error::custom(format!("unsupported coordinate shape: {value}")))
    }
}

/// A point as it arrived at the boundary, before axis order is settled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawPoint {
    /// Bare numeric pair, axis order unknown.
    Pair(f64, f64),
    /// `{ lat, lng }`
    LatLng { lat: f64, lng: f64 },
    /// `{ latitude, longitude }`
    LatitudeLongitude { latitude: f64, longitude: f64 },
}

impl RawPoint {
    /// Recognizes one of the supported shapes in a JSON value.
    ///
    /// Arrays need at least two numbers; anything after the second (altitude)
    /// is ignored. Returns `None` when no finite numeric pair can be found.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) if items.len() >= 2 => {
                let a = finite(&items[0])?;
                let b = finite(&items[1])?;
                Some(RawPoint::Pair(a, b))
            }
            Value::Object(map) => {
                if let (Some(lat), Some(lng)) = (map.get("lat"), map.get("lng")) {
                    return Some(RawPoint::LatLng {
                        lat: finite(lat)?,
                        lng: finite(lng)?,
                    });
                }
                if let (Some(latitude), Some(longitude)) = (map.get("latitude"), map.get("longitude")) {
                    return Some(RawPoint::LatitudeLongitude {
                        latitude: finite(latitude)?,
                        longitude: finite(longitude)?,
                    });
                }
                None
            }
            _ => None,
        }
    }

    pub fn normalize(self) -> Coordinate {
        Normalizer::default().raw(self)
    }
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// Settles the axis order of a bare numeric pair.
///
/// `[a, b]` that reads as `[lng, lat]` is kept. Otherwise, if it reads as
/// `[lat, lng]`, it is swapped. Pairs that fit neither reading are passed
/// through unchanged. A pair that fits both readings is assumed to already be
/// `[lng, lat]`; use a [`Normalizer`] with a reference point to settle those.
pub fn normalize_pair(a: f64, b: f64) -> Coordinate {
    Normalizer::default().pair(a, b)
}

/// Normalizes one point of any supported shape.
pub fn normalize_value(value: &Value) -> Option<Coordinate> {
    Normalizer::default().value(value)
}

/// Normalizes a batch, skipping points that cannot be resolved.
pub fn normalize_all(values: &[Value]) -> Vec<Coordinate> {
    Normalizer::default().all(values)
}

/// Coordinate normalizer, optionally anchored to the service area.
///
/// Without a reference, ambiguous pairs (valid in either order) are kept as
/// given. With one, the reading closer to the reference wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    reference: Option<Coordinate>,
}

impl Normalizer {
    pub fn near(reference: Coordinate) -> Self {
        Self {
            reference: Some(reference),
        }
    }

    pub fn pair(&self, a: f64, b: f64) -> Coordinate {
        let as_given = LONGITUDE_RANGE.contains(&a) && LATITUDE_RANGE.contains(&b);
        let as_swapped = LATITUDE_RANGE.contains(&a) && LONGITUDE_RANGE.contains(&b);
        match (as_given, as_swapped, self.reference) {
            (true, true, Some(reference)) => {
                let given = Coordinate::new(a, b);
                let swapped = Coordinate::new(b, a);
                if haversine_distance(swapped, reference) < haversine_distance(given, reference) {
                    swapped
                } else {
                    given
                }
            }
            (true, _, _) => Coordinate::new(a, b),
            (false, true, _) => Coordinate::new(b, a),
            (false, false, _) => Coordinate::new(a, b),
        }
    }

    pub fn raw(&self, point: RawPoint) -> Coordinate {
        match point {
            RawPoint::Pair(a, b) => self.pair(a, b),
            RawPoint::LatLng { lat, lng } => Coordinate::new(lng, lat),
            RawPoint::LatitudeLongitude { latitude, longitude } => Coordinate::new(longitude, latitude),
        }
    }

    pub fn value(&self, value: &Value) -> Option<Coordinate> {
        RawPoint::from_value(value).map(|point| self.raw(point))
    }

    pub fn all(&self, values: &[Value]) -> Vec<Coordinate> {
        values
            .iter()
            .enumerate()
            .filter_map(|(index, value)| {
                let point = self.value(value);
                if point.is_none() {
                    tracing::warn!(index, %value, "Skipping malformed coordinate");
                }
                point
            })
            .collect()
    }
}
