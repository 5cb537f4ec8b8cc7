//! Client for the OpenRouteService directions API.
//!
//! Only the route geometry, summary and step list are consumed. When the API
//! cannot be reached the caller can fall back to a straight-line estimate.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::coords::Coordinate;
use crate::error::{Result, TransitError};
use crate::geometry::{haversine_distance, straight_line};
use crate::polyline;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    DrivingCar,
    FootWalking,
    CyclingRegular,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::DrivingCar => "driving-car",
            Profile::FootWalking => "foot-walking",
            Profile::CyclingRegular => "cycling-regular",
        }
    }

    /// Average speed in m/s used for straight-line duration estimates.
    pub fn nominal_speed(self) -> f64 {
        match self {
            Profile::DrivingCar => 8.33,
            Profile::FootWalking => 1.39,
            Profile::CyclingRegular => 4.17,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = TransitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "driving-car" => Ok(Profile::DrivingCar),
            "foot-walking" => Ok(Profile::FootWalking),
            "cycling-regular" => Ok(Profile::CyclingRegular),
            other => Err(TransitError::Config(format!("unknown routing profile '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub instruction: String,
    #[serde(default)]
    pub name: String,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// A computed path between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directions {
    pub coordinates: Vec<Coordinate>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub steps: Vec<Step>,
    /// `true` when this is a straight-line estimate rather than a routed path.
    pub approximate: bool,
}

impl Directions {
    pub fn straight_line(start: Coordinate, end: Coordinate, profile: Profile) -> Self {
        let distance_m = haversine_distance(start, end);
        Self {
            coordinates: straight_line(start, end),
            distance_m,
            duration_s: distance_m / profile.nominal_speed(),
            steps: Vec::new(),
            approximate: true,
        }
    }
}

// --- wire format ---

#[derive(Deserialize)]
struct OrsResponse {
    #[serde(default)]
    routes: Vec<OrsRoute>,
    error: Option<OrsError>,
}

#[derive(Deserialize)]
struct OrsError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct OrsRoute {
    summary: OrsSummary,
    #[serde(default)]
    segments: Vec<OrsSegment>,
    geometry: String,
}

#[derive(Deserialize)]
struct OrsSummary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Deserialize)]
struct OrsSegment {
    #[serde(default)]
    steps: Vec<OrsStep>,
}

#[derive(Deserialize)]
struct OrsStep {
    #[serde(default)]
    instruction: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

/// Parses a directions response body.
pub fn parse_directions(body: &str) -> Result<Directions> {
    let response: OrsResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        return Err(TransitError::Routing(error.message));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| TransitError::Routing("response contains no routes".to_string()))?;

    let coordinates = polyline::decode(&route.geometry);
    if coordinates.len() < 2 {
        return Err(TransitError::Routing(format!(
            "route geometry decoded to {} point(s)",
            coordinates.len()
        )));
    }

    let steps = route
        .segments
        .into_iter()
        .flat_map(|segment| segment.steps)
        .map(|step| Step {
            instruction: step.instruction,
            name: step.name,
            distance_m: step.distance,
            duration_s: step.duration,
        })
        .collect();

    Ok(Directions {
        coordinates,
        distance_m: route.summary.distance,
        duration_s: route.summary.duration,
        steps,
        approximate: false,
    })
}

#[derive(Debug, Clone)]
pub struct RoutingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RoutingClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.routing_api_url.clone(), config.routing_api_key.clone())
    }

    /// Requests a routed path from `start` to `end`.
    pub async fn directions(&self, start: Coordinate, end: Coordinate, profile: Profile) -> Result<Directions> {
        let url = format!("{}/v2/directions/{}", self.base_url, profile);
        let body = serde_json::json!({
            "coordinates": [start.to_array(), end.to_array()],
            "instructions": true,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            // Error bodies usually carry a message; fall back to the status.
            return Err(match parse_directions(&text) {
                Err(TransitError::Routing(message)) if !message.is_empty() => TransitError::Routing(message),
                _ => TransitError::Routing(format!("HTTP {}", status)),
            });
        }
        parse_directions(&text)
    }

    /// Like [`directions`](Self::directions), degrading to a straight line on any failure.
    pub async fn directions_or_straight_line(&self, start: Coordinate, end: Coordinate, profile: Profile) -> Directions {
        match self.directions(start, end, profile).await {
            Ok(directions) => directions,
            Err(e) => {
                tracing::warn!("Routing failed ({}), using straight-line approximation", e);
                Directions::straight_line(start, end, profile)
            }
        }
    }
}
