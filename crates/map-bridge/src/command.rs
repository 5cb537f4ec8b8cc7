//! Commands sent from the host to the embedded map page.
//!
//! Every command is a JSON object tagged by `type`. The page dispatches on the
//! tag and reads a fixed payload, so no host data is ever spliced into script
//! source.

use serde::{Deserialize, Serialize};
use transit_common::geometry::BoundingBox;
use transit_common::route::Route;
use transit_common::routing::Directions;
use transit_common::{Coordinate, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerKind {
    User,
    Origin,
    Destination,
    Stop,
    AdminPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub position: Coordinate,
    pub kind: MarkerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A path drawn on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOverlay {
    pub id: String,
    pub color: String,
    pub coordinates: Vec<Coordinate>,
    /// Drawn dashed: the path is an estimate, not a routed one.
    #[serde(default)]
    pub dashed: bool,
    #[serde(default)]
    pub fit_bounds: bool,
}

impl From<&Route> for RouteOverlay {
    fn from(route: &Route) -> Self {
        Self {
            id: route.id.clone(),
            color: route.color.clone(),
            coordinates: route.coordinates(),
            dashed: false,
            fit_bounds: false,
        }
    }
}

impl RouteOverlay {
    pub fn from_directions(id: impl Into<String>, color: impl Into<String>, directions: &Directions) -> Self {
        Self {
            id: id.into(),
            color: color.into(),
            coordinates: directions.coordinates.clone(),
            dashed: directions.approximate,
            fit_bounds: true,
        }
    }

    /// An overlay with no coordinates: the page erases the path with this id.
    pub fn cleared(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            color: String::new(),
            coordinates: Vec::new(),
            dashed: false,
            fit_bounds: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapType {
    Standard,
    Satellite,
    Terrain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MapCommand {
    UpdateLocation {
        position: Coordinate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accuracy: Option<f64>,
    },
    UpdateMarkers {
        markers: Vec<Marker>,
    },
    UpdateRoute {
        route: RouteOverlay,
    },
    ShowPopup {
        position: Coordinate,
        title: String,
        #[serde(default)]
        body: String,
    },
    ClearAll,
    EnablePointSelection {
        enabled: bool,
    },
    SetFollowUser {
        follow: bool,
    },
    ChangeMapType {
        map_type: MapType,
    },
    CenterOnRoute {
        bounds: BoundingBox,
    },
}

/// Tag of a [`MapCommand`], used to key pending retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    UpdateLocation,
    UpdateMarkers,
    UpdateRoute,
    ShowPopup,
    ClearAll,
    EnablePointSelection,
    SetFollowUser,
    ChangeMapType,
    CenterOnRoute,
}

impl CommandKind {
    /// A newer command of this kind makes an undelivered older one obsolete.
    ///
    /// Popups and clears are one-off actions, so they stack instead.
    pub fn supersedes_pending(self) -> bool {
        !matches!(self, CommandKind::ShowPopup | CommandKind::ClearAll)
    }
}

impl MapCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            MapCommand::UpdateLocation { .. } => CommandKind::UpdateLocation,
            MapCommand::UpdateMarkers { .. } => CommandKind::UpdateMarkers,
            MapCommand::UpdateRoute { .. } => CommandKind::UpdateRoute,
            MapCommand::ShowPopup { .. } => CommandKind::ShowPopup,
            MapCommand::ClearAll => CommandKind::ClearAll,
            MapCommand::EnablePointSelection { .. } => CommandKind::EnablePointSelection,
            MapCommand::SetFollowUser { .. } => CommandKind::SetFollowUser,
            MapCommand::ChangeMapType { .. } => CommandKind::ChangeMapType,
            MapCommand::CenterOnRoute { .. } => CommandKind::CenterOnRoute,
        }
    }

    /// Serialized form posted to the page.
    pub fn to_message(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
