//! Events posted by the embedded map page back to the host.
//!
//! Pages send either a JSON envelope (`{"type": "...", ...}`) or, for the
//! readiness signal, sometimes just the bare string `mapReady`. [`MapEvent::parse`]
//! is the one place where that raw text becomes a typed event.

use serde::Serialize;
use serde_json::{Map, Value};
use transit_common::coords::normalize_value;
use transit_common::{Coordinate, Result, TransitError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MapEvent {
    MapReady,
    PointSelected { point: Coordinate },
    Error { message: String },
    AdminMapPoint { point: Coordinate },
    RouteClicked { route_id: String },
    WebviewDebug { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MapReady,
    PointSelected,
    Error,
    AdminMapPoint,
    RouteClicked,
    WebviewDebug,
}

impl MapEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MapEvent::MapReady => EventKind::MapReady,
            MapEvent::PointSelected { .. } => EventKind::PointSelected,
            MapEvent::Error { .. } => EventKind::Error,
            MapEvent::AdminMapPoint { .. } => EventKind::AdminMapPoint,
            MapEvent::RouteClicked { .. } => EventKind::RouteClicked,
            MapEvent::WebviewDebug { .. } => EventKind::WebviewDebug,
        }
    }

    /// Parses one raw message from the page.
    ///
    /// JSON envelopes are dispatched on their `type`. Text that is not JSON is
    /// matched literally. Unrecognized types yield [`TransitError::UnknownEvent`].
    pub fn parse(raw: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(envelope)) => Self::from_envelope(&envelope),
            Ok(Value::String(literal)) => Self::from_literal(&literal),
            Ok(other) => Err(TransitError::MalformedEvent(format!("unexpected payload: {}", other))),
            Err(e) => {
                tracing::debug!("Event is not JSON ({}), matching literally", e);
                Self::from_literal(raw.trim())
            }
        }
    }

    fn from_literal(literal: &str) -> Result<Self> {
        match literal {
            "mapReady" => Ok(MapEvent::MapReady),
            other => Err(TransitError::UnknownEvent(other.to_string())),
        }
    }

    fn from_envelope(envelope: &Map<String, Value>) -> Result<Self> {
        let event_type = envelope
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TransitError::MalformedEvent("missing 'type'".to_string()))?;

        match event_type {
            "mapReady" => Ok(MapEvent::MapReady),
            "pointSelected" => Ok(MapEvent::PointSelected {
                point: point_field(envelope, event_type)?,
            }),
            "adminMapPoint" => Ok(MapEvent::AdminMapPoint {
                point: point_field(envelope, event_type)?,
            }),
            "routeClicked" => {
                let route_id = ["routeId", "id"]
                    .iter()
                    .find_map(|key| match envelope.get(*key) {
                        Some(Value::String(s)) => Some(s.clone()),
                        Some(Value::Number(n)) => Some(n.to_string()),
                        _ => None,
                    })
                    .ok_or_else(|| TransitError::MalformedEvent("routeClicked without route id".to_string()))?;
                Ok(MapEvent::RouteClicked { route_id })
            }
            "error" => Ok(MapEvent::Error {
                message: text_field(envelope),
            }),
            "webviewDebug" => Ok(MapEvent::WebviewDebug {
                message: text_field(envelope),
            }),
            other => Err(TransitError::UnknownEvent(other.to_string())),
        }
    }
}

/// Finds the point carried by an envelope: a `point`/`coordinate` field, or
/// coordinates inlined next to `type`.
fn point_field(envelope: &Map<String, Value>, event_type: &str) -> Result<Coordinate> {
    ["point", "coordinate", "coordinates"]
        .iter()
        .filter_map(|key| envelope.get(*key))
        .find_map(normalize_value)
        .or_else(|| normalize_value(&Value::Object(envelope.clone())))
        .ok_or_else(|| TransitError::MalformedEvent(format!("{} without a usable point", event_type)))
}

fn text_field(envelope: &Map<String, Value>) -> String {
    match envelope.get("message").or_else(|| envelope.get("data")) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_ready_signal() {
        assert_eq!(MapEvent::parse("mapReady").unwrap(), MapEvent::MapReady);
        assert_eq!(MapEvent::parse(" mapReady\n").unwrap(), MapEvent::MapReady);
        assert_eq!(MapEvent::parse("\"mapReady\"").unwrap(), MapEvent::MapReady);
    }

    #[test]
    fn enveloped_ready_signal() {
        assert_eq!(MapEvent::parse(r#"{"type":"mapReady"}"#).unwrap(), MapEvent::MapReady);
    }

    #[test]
    fn point_selected_accepts_every_shape() {
        let expected = MapEvent::PointSelected {
            point: Coordinate::new(-66.1568, -17.3895),
        };
        for raw in [
            r#"{"type":"pointSelected","lat":-17.3895,"lng":-66.1568}"#,
            r#"{"type":"pointSelected","point":{"latitude":-17.3895,"longitude":-66.1568}}"#,
            r#"{"type":"pointSelected","coordinate":[-66.1568,-17.3895]}"#,
        ] {
            assert_eq!(MapEvent::parse(raw).unwrap(), expected, "raw {raw}");
        }
    }

    #[test]
    fn admin_point_and_route_click() {
        assert_eq!(
            MapEvent::parse(r#"{"type":"adminMapPoint","lat":-17.39,"lng":-66.15}"#).unwrap().kind(),
            EventKind::AdminMapPoint
        );
        assert_eq!(
            MapEvent::parse(r#"{"type":"routeClicked","routeId":"linea-10"}"#).unwrap(),
            MapEvent::RouteClicked { route_id: "linea-10".to_string() }
        );
        assert_eq!(
            MapEvent::parse(r#"{"type":"routeClicked","id":7}"#).unwrap(),
            MapEvent::RouteClicked { route_id: "7".to_string() }
        );
    }

    #[test]
    fn error_and_debug_carry_text() {
        assert_eq!(
            MapEvent::parse(r#"{"type":"error","message":"tiles failed"}"#).unwrap(),
            MapEvent::Error { message: "tiles failed".to_string() }
        );
        assert_eq!(
            MapEvent::parse(r#"{"type":"webviewDebug","data":{"zoom":14}}"#).unwrap(),
            MapEvent::WebviewDebug { message: r#"{"zoom":14}"#.to_string() }
        );
    }

    #[test]
    fn unknown_and_malformed_are_errors_not_panics() {
        assert!(matches!(MapEvent::parse("hello"), Err(TransitError::UnknownEvent(_))));
        assert!(matches!(MapEvent::parse(r#"{"type":"zoomed"}"#), Err(TransitError::UnknownEvent(_))));
        assert!(matches!(MapEvent::parse(r#"{"lat":1}"#), Err(TransitError::MalformedEvent(_))));
        assert!(matches!(MapEvent::parse("[1,2]"), Err(TransitError::MalformedEvent(_))));
        assert!(matches!(
            MapEvent::parse(r#"{"type":"pointSelected","lat":"x"}"#),
            Err(TransitError::MalformedEvent(_))
        ));
    }

    #[test]
    fn serialized_events_parse_back() {
        let event = MapEvent::RouteClicked { route_id: "r1".to_string() };
        let raw = serde_json::to_string(&event).unwrap();
        assert_eq!(MapEvent::parse(&raw).unwrap(), event);

        let event = MapEvent::AdminMapPoint { point: Coordinate::new(-66.15, -17.39) };
        let raw = serde_json::to_string(&event).unwrap();
        assert_eq!(MapEvent::parse(&raw).unwrap(), event);
    }
}
