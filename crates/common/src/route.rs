//! Bus route model.
//!
//! [`StoredRoute`] is a record exactly as the route collection holds it,
//! coordinates in whatever shape the editor of the day wrote them.
//! [`StoredRoute::normalize`] is the only way to turn one into a [`Route`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coords::{Coordinate, Normalizer};
use crate::error::{Result, TransitError};
use crate::geometry::{bounding_box, path_length, BoundingBox};
use crate::polyline;

pub const DEFAULT_ROUTE_COLOR: &str = "#1E88E5";

/// A single vertex of a route, with optional display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl From<Coordinate> for RoutePoint {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            street: None,
            label: None,
        }
    }
}

/// A normalized route: always at least two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteFields")]
pub struct Route {
    pub id: String,
    pub name: String,
    pub color: String,
    pub points: Vec<RoutePoint>,
}

#[derive(Deserialize)]
struct RouteFields {
    id: String,
    name: String,
    color: String,
    points: Vec<RoutePoint>,
}

impl TryFrom<RouteFields> for Route {
    type Error = TransitError;

    fn try_from(fields: RouteFields) -> Result<Self> {
        Route::new(fields.id, fields.name, fields.color, fields.points)
    }
}

impl Route {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        color: impl Into<String>,
        points: Vec<RoutePoint>,
    ) -> Result<Self> {
        let id = id.into();
        if points.len() < 2 {
            return Err(TransitError::InvalidRoute(format!(
                "route '{}' has {} usable point(s), at least 2 required",
                id,
                points.len()
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            color: color.into(),
            points,
        })
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.points.iter().map(|p| p.coordinate).collect()
    }

    /// Length in metres along the route.
    pub fn length_m(&self) -> f64 {
        path_length(&self.coordinates())
    }

    pub fn bounds(&self) -> BoundingBox {
        // A route always has points, so bounds always exist.
        bounding_box(&self.coordinates()).unwrap_or(BoundingBox {
            south_west: self.points[0].coordinate,
            north_east: self.points[0].coordinate,
        })
    }

    pub fn start(&self) -> Coordinate {
        self.points[0].coordinate
    }

    pub fn end(&self) -> Coordinate {
        self.points[self.points.len() - 1].coordinate
    }
}

/// A route record as held by the document store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRoute {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub coordinates: Vec<Value>,
    #[serde(default)]
    pub encoded_polyline: Option<String>,
    #[serde(default)]
    pub streets: Vec<Option<String>>,
    #[serde(default)]
    pub labels: Vec<Option<String>>,
}

impl StoredRoute {
    /// Builds a [`Route`] with the default normalizer.
    pub fn normalize(&self, fallback_id: &str) -> Result<Route> {
        self.normalize_with(&Normalizer::default(), fallback_id)
    }

    /// Builds a [`Route`], using `fallback_id` when the record carries none.
    ///
    /// Malformed coordinates are skipped. When none of `coordinates` survive,
    /// the encoded polyline (if any) supplies the geometry instead.
    pub fn normalize_with(&self, normalizer: &Normalizer, fallback_id: &str) -> Result<Route> {
        let id = self.id.clone().unwrap_or_else(|| fallback_id.to_string());

        let mut points: Vec<RoutePoint> = self
            .coordinates
            .iter()
            .enumerate()
            .filter_map(|(index, value)| match normalizer.value(value) {
                Some(coordinate) => Some(RoutePoint {
                    coordinate,
                    street: self.streets.get(index).cloned().flatten(),
                    label: self.labels.get(index).cloned().flatten(),
                }),
                None => {
                    tracing::warn!(route = %id, index, %value, "Skipping malformed route coordinate");
                    None
                }
            })
            .collect();

        if points.is_empty() {
            if let Some(encoded) = self.encoded_polyline.as_deref() {
                points = polyline::decode(encoded).into_iter().map(RoutePoint::from).collect();
            }
        }

        let name = self.name.clone().unwrap_or_else(|| id.clone());
        let color = self
            .color
            .clone()
            .unwrap_or_else(|| DEFAULT_ROUTE_COLOR.to_string());
        Route::new(id, name, color, points)
    }
}
