//! WebSocket host for embedded map pages.
//!
//! Every connection is one page mount. Commands queued on connect are held by
//! the session until the page reports `mapReady`; page events update the
//! session's host state and trigger follow-up commands.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use common::location::locate_with_timeout;
use common::route::Route;
use common::{Result, TransitError};
use futures_util::{SinkExt, StreamExt};
use map_bridge::{MapCommand, MapEvent, MapPage, MapSession, Marker, MarkerKind, RouteOverlay};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::AppState;

const LOCATION_TIMEOUT: Duration = Duration::from_secs(5);
const TRIP_ROUTE_ID: &str = "trip";
const TRIP_COLOR: &str = "#43A047";
const ADMIN_DRAFT_ID: &str = "admin-draft";
const ADMIN_DRAFT_COLOR: &str = "#FB8C00";

/// The page end of a socket: commands are queued to the socket writer task.
struct SocketPage {
    tx: mpsc::UnboundedSender<String>,
}

impl MapPage for SocketPage {
    fn post_message(&self, message: &str) -> Result<()> {
        self.tx
            .send(message.to_string())
            .map_err(|_| TransitError::PageUnavailable("socket closed".to_string()))
    }
}

#[derive(Deserialize)]
pub(crate) struct MountParams {
    /// Route shown when the page loads.
    route: Option<String>,
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<MountParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, params: MountParams) {
    info!("🔌 Map page connected");
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(Message::Text(message)).await.is_err() {
                // Client disconnected
                break;
            }
        }
    });

    let mut session = MapSession::new(state.retry);
    session.attach(Arc::new(SocketPage { tx })).await;

    if let Err(e) = prime(&mut session, &state, params.route.as_deref()).await {
        warn!("Failed to queue initial map commands: {}", e);
    }

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        };

        if let Some(event) = session.handle_message(&text) {
            if let Err(e) = follow_up(&session, &state, &event).await {
                error!("Failed to answer {:?}: {}", event.kind(), e);
            }
        }
    }

    session.unmount().await;
    writer.abort();
    info!("Map page disconnected");
}

/// Commands every freshly mounted page needs. They wait for `mapReady`.
async fn prime(session: &mut MapSession, state: &AppState, initial_route: Option<&str>) -> Result<()> {
    match locate_with_timeout(&state.location, LOCATION_TIMEOUT).await {
        Ok(location) => {
            session
                .send(MapCommand::UpdateLocation {
                    position: location.coordinate(),
                    accuracy: Some(location.accuracy),
                })
                .await?;
            session.set_follow_user(true).await?;
        }
        Err(e) => warn!("Device location unavailable: {}", e),
    }

    let routes = state.routes.list().await;
    session
        .send(MapCommand::UpdateMarkers {
            markers: terminal_markers(&routes),
        })
        .await?;

    let initial = match initial_route {
        Some(id) => routes.iter().find(|r| r.id == id),
        None => routes.first(),
    };
    if let Some(route) = initial {
        session
            .send(MapCommand::UpdateRoute {
                route: RouteOverlay::from(route),
            })
            .await?;
    }

    session
        .send(MapCommand::EnablePointSelection { enabled: true })
        .await?;
    Ok(())
}

/// Reacts to a page event that has already been folded into host state.
async fn follow_up(session: &MapSession, state: &AppState, event: &MapEvent) -> Result<()> {
    match event {
        MapEvent::PointSelected { .. } => {
            let host = session.state().clone();
            session
                .send(MapCommand::UpdateMarkers {
                    markers: trip_markers(host.origin, host.destination),
                })
                .await?;

            if let Some((start, end)) = host.trip() {
                let directions = state
                    .routing
                    .directions_or_straight_line(start, end, state.profile)
                    .await;
                session
                    .send(MapCommand::UpdateRoute {
                        route: RouteOverlay::from_directions(TRIP_ROUTE_ID, TRIP_COLOR, &directions),
                    })
                    .await?;
                if let Some(bounds) = common::geometry::bounding_box(&directions.coordinates) {
                    session.send(MapCommand::CenterOnRoute { bounds }).await?;
                }
            } else {
                // Selection restarted: the previous trip line must go.
                session
                    .send(MapCommand::UpdateRoute {
                        route: RouteOverlay::cleared(TRIP_ROUTE_ID),
                    })
                    .await?;
            }
        }
        MapEvent::RouteClicked { route_id } => {
            let Some(route) = state.routes.get(route_id).await else {
                warn!("Clicked route '{}' is not loaded", route_id);
                return Ok(());
            };
            session
                .send(MapCommand::UpdateRoute {
                    route: RouteOverlay::from(&route),
                })
                .await?;
            session
                .send(MapCommand::CenterOnRoute {
                    bounds: route.bounds().padded(0.1),
                })
                .await?;
            session
                .send(MapCommand::ShowPopup {
                    position: route.start(),
                    title: route.name.clone(),
                    body: format!("{:.1} km", route.length_m() / 1000.0),
                })
                .await?;
        }
        MapEvent::AdminMapPoint { .. } => {
            let points = session.state().admin_points.clone();
            let markers = points
                .iter()
                .enumerate()
                .map(|(i, p)| Marker {
                    id: format!("admin-{}", i),
                    position: *p,
                    kind: MarkerKind::AdminPoint,
                    label: Some((i + 1).to_string()),
                })
                .collect();
            session.send(MapCommand::UpdateMarkers { markers }).await?;

            if points.len() >= 2 {
                session
                    .send(MapCommand::UpdateRoute {
                        route: RouteOverlay {
                            id: ADMIN_DRAFT_ID.to_string(),
                            color: ADMIN_DRAFT_COLOR.to_string(),
                            coordinates: points,
                            dashed: true,
                            fit_bounds: false,
                        },
                    })
                    .await?;
            }
        }
        MapEvent::MapReady | MapEvent::Error { .. } | MapEvent::WebviewDebug { .. } => {}
    }
    Ok(())
}

/// First and last stop of every route.
fn terminal_markers(routes: &[Route]) -> Vec<Marker> {
    routes
        .iter()
        .flat_map(|route| {
            [
                Marker {
                    id: format!("{}-start", route.id),
                    position: route.start(),
                    kind: MarkerKind::Stop,
                    label: Some(route.name.clone()),
                },
                Marker {
                    id: format!("{}-end", route.id),
                    position: route.end(),
                    kind: MarkerKind::Stop,
                    label: Some(route.name.clone()),
                },
            ]
        })
        .collect()
}

fn trip_markers(origin: Option<common::Coordinate>, destination: Option<common::Coordinate>) -> Vec<Marker> {
    let origin = origin.map(|position| Marker {
        id: "origin".to_string(),
        position,
        kind: MarkerKind::Origin,
        label: None,
    });
    let destination = destination.map(|position| Marker {
        id: "destination".to_string(),
        position,
        kind: MarkerKind::Destination,
        label: None,
    });
    origin.into_iter().chain(destination).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::coords::Normalizer;
    use common::location::FixedLocationProvider;
    use common::route::StoredRoute;
    use common::routing::{Profile, RoutingClient};
    use common::store::RouteStore;
    use common::Coordinate;
    use map_bridge::RetryPolicy;
    use serde_json::{json, Value};

    fn app_state() -> AppState {
        let records: Vec<StoredRoute> = serde_json::from_value(json!([
            {
                "id": "linea-10",
                "name": "Línea 10",
                "coordinates": [[-66.1568, -17.3895], [-66.1589, -17.3921], [-66.1612, -17.3950]]
            },
            {
                "id": "linea-2",
                "name": "Línea 2",
                "coordinates": [{ "lat": -17.3742, "lng": -66.1520 }, { "lat": -17.3870, "lng": -66.1561 }]
            }
        ]))
        .unwrap();
        let normalizer = Normalizer::default();
        AppState {
            routes: RouteStore::from_records(&records, &normalizer),
            // Nothing listens on the discard port: directions fall back to a straight line.
            routing: RoutingClient::new("http://127.0.0.1:9", None).unwrap(),
            profile: Profile::DrivingCar,
            location: FixedLocationProvider::new(Coordinate::new(-66.1568, -17.3895)),
            normalizer,
            retry: RetryPolicy::default(),
        }
    }

    async fn mounted() -> (MapSession, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = MapSession::new(RetryPolicy::default());
        session.attach(Arc::new(SocketPage { tx })).await;
        (session, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut sent = Vec::new();
        while let Ok(message) = rx.try_recv() {
            sent.push(serde_json::from_str(&message).unwrap());
        }
        sent
    }

    fn types(sent: &[Value]) -> Vec<&str> {
        sent.iter().map(|c| c["type"].as_str().unwrap()).collect()
    }

    async fn feed(session: &mut MapSession, state: &AppState, raw: &str) {
        let event = session.handle_message(raw).unwrap();
        follow_up(session, state, &event).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn primed_commands_wait_for_map_ready() {
        let state = app_state();
        let (mut session, mut rx) = mounted().await;

        prime(&mut session, &state, Some("linea-2")).await.unwrap();
        assert!(drain(&mut rx).is_empty());
        assert!(session.state().follow_user);

        session.handle_message("mapReady");
        tokio::time::sleep(Duration::from_millis(1)).await;

        let sent = drain(&mut rx);
        let mut kinds = types(&sent);
        kinds.sort_unstable();
        assert_eq!(
            kinds,
            vec![
                "enablePointSelection",
                "setFollowUser",
                "updateLocation",
                "updateMarkers",
                "updateRoute",
            ]
        );

        let route = sent.iter().find(|c| c["type"] == "updateRoute").unwrap();
        assert_eq!(route["route"]["id"], "linea-2");
        let location = sent.iter().find(|c| c["type"] == "updateLocation").unwrap();
        assert_eq!(location["position"], json!([-66.1568, -17.3895]));
        let markers = sent.iter().find(|c| c["type"] == "updateMarkers").unwrap();
        assert_eq!(markers["markers"].as_array().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_trip_draws_fallback_directions() {
        let state = app_state();
        let (mut session, mut rx) = mounted().await;
        session.handle_message("mapReady");

        feed(&mut session, &state, r#"{"type":"pointSelected","point":[-66.15,-17.39]}"#).await;
        let sent = drain(&mut rx);
        assert_eq!(types(&sent), vec!["updateMarkers", "updateRoute"]);
        assert_eq!(sent[0]["markers"].as_array().unwrap().len(), 1);
        assert_eq!(sent[1]["route"]["coordinates"], json!([]));

        feed(&mut session, &state, r#"{"type":"pointSelected","lat":-17.40,"lng":-66.16}"#).await;
        let sent = drain(&mut rx);
        assert_eq!(types(&sent), vec!["updateMarkers", "updateRoute", "centerOnRoute"]);
        assert_eq!(sent[0]["markers"].as_array().unwrap().len(), 2);
        let trip = &sent[1]["route"];
        assert_eq!(trip["id"], TRIP_ROUTE_ID);
        assert_eq!(trip["dashed"], true);
        assert_eq!(trip["fitBounds"], true);
        assert_eq!(trip["coordinates"], json!([[-66.15, -17.39], [-66.16, -17.40]]));
        assert_eq!(sent[2]["bounds"]["southWest"], json!([-66.16, -17.40]));
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_selection_erases_the_trip() {
        let state = app_state();
        let (mut session, mut rx) = mounted().await;
        session.handle_message("mapReady");

        feed(&mut session, &state, r#"{"type":"pointSelected","point":[-66.15,-17.39]}"#).await;
        feed(&mut session, &state, r#"{"type":"pointSelected","point":[-66.16,-17.40]}"#).await;
        drain(&mut rx);

        feed(&mut session, &state, r#"{"type":"pointSelected","point":[-66.17,-17.41]}"#).await;
        let sent = drain(&mut rx);
        assert_eq!(types(&sent), vec!["updateMarkers", "updateRoute"]);
        assert_eq!(sent[0]["markers"][0]["position"], json!([-66.17, -17.41]));
        assert_eq!(sent[1]["route"]["id"], TRIP_ROUTE_ID);
        assert_eq!(sent[1]["route"]["coordinates"], json!([]));
        assert_eq!(session.state().trip(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn clicked_route_is_drawn_centred_and_described() {
        let state = app_state();
        let (mut session, mut rx) = mounted().await;
        session.handle_message("mapReady");

        feed(&mut session, &state, r#"{"type":"routeClicked","routeId":"linea-10"}"#).await;
        let sent = drain(&mut rx);
        assert_eq!(types(&sent), vec!["updateRoute", "centerOnRoute", "showPopup"]);
        assert_eq!(sent[0]["route"]["id"], "linea-10");
        assert_eq!(sent[0]["route"]["dashed"], false);
        assert_eq!(sent[2]["title"], "Línea 10");
        assert_eq!(sent[2]["position"], json!([-66.1568, -17.3895]));
        assert!(sent[2]["body"].as_str().unwrap().ends_with(" km"));

        feed(&mut session, &state, r#"{"type":"routeClicked","routeId":"missing"}"#).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn admin_points_grow_a_dashed_draft() {
        let state = app_state();
        let (mut session, mut rx) = mounted().await;
        session.handle_message("mapReady");

        feed(&mut session, &state, r#"{"type":"adminMapPoint","point":[-66.15,-17.39]}"#).await;
        let sent = drain(&mut rx);
        assert_eq!(types(&sent), vec!["updateMarkers"]);
        assert_eq!(sent[0]["markers"][0]["label"], "1");

        feed(&mut session, &state, r#"{"type":"adminMapPoint","latitude":-17.40,"longitude":-66.16}"#).await;
        let sent = drain(&mut rx);
        assert_eq!(types(&sent), vec!["updateMarkers", "updateRoute"]);
        assert_eq!(sent[0]["markers"].as_array().unwrap().len(), 2);
        let draft = &sent[1]["route"];
        assert_eq!(draft["id"], ADMIN_DRAFT_ID);
        assert_eq!(draft["dashed"], true);
        assert_eq!(draft["coordinates"], json!([[-66.15, -17.39], [-66.16, -17.40]]));
    }

    #[test]
    fn trip_markers_follow_selection() {
        assert!(trip_markers(None, None).is_empty());

        let origin = Coordinate::new(-66.15, -17.39);
        let markers = trip_markers(Some(origin), None);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind, MarkerKind::Origin);

        let markers = trip_markers(Some(origin), Some(Coordinate::new(-66.16, -17.40)));
        assert_eq!(markers[1].kind, MarkerKind::Destination);
    }

    #[test]
    fn every_route_contributes_two_terminals() {
        let route = Route::new(
            "linea-1",
            "Línea 1",
            "#000000",
            vec![
                Coordinate::new(-66.15, -17.39).into(),
                Coordinate::new(-66.155, -17.395).into(),
                Coordinate::new(-66.16, -17.40).into(),
            ],
        )
        .unwrap();
        let markers = terminal_markers(&[route]);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1].id, "linea-1-end");
        assert_eq!(markers[1].position, Coordinate::new(-66.16, -17.40));
    }

    #[test]
    fn closed_socket_reports_unavailable_page() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let page = SocketPage { tx };
        assert!(matches!(
            page.post_message("{}"),
            Err(TransitError::PageUnavailable(_))
        ));
    }
}
