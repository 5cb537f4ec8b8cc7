use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::coords::Normalizer;
use common::geometry::BoundingBox;
use common::route::{Route, StoredRoute};
use common::routing::{Directions, Profile};
use common::Coordinate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;

const ADMIN_ROUTE_PREFIX: &str = "admin-route";

pub(crate) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

#[derive(Serialize)]
pub(crate) struct HealthStatus {
    status: String,
    routes_loaded: usize,
}

pub(crate) async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK".to_string(),
        routes_loaded: state.routes.len().await,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RouteView {
    #[serde(flatten)]
    route: Route,
    length_m: f64,
    bounds: BoundingBox,
}

impl From<Route> for RouteView {
    fn from(route: Route) -> Self {
        Self {
            length_m: route.length_m(),
            bounds: route.bounds(),
            route,
        }
    }
}

pub(crate) async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Vec<RouteView>> {
    let routes = state.routes.list().await;
    info!("📍 Routes requested, sending {}", routes.len());
    Json(routes.into_iter().map(RouteView::from).collect())
}

pub(crate) async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RouteView>, ApiError> {
    state
        .routes
        .get(&id)
        .await
        .map(|route| Json(route.into()))
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("route '{}' not found", id)))
}

/// Accepts a route record in any stored shape and keeps its normalized form.
pub(crate) async fn save_route(
    State(state): State<Arc<AppState>>,
    Json(record): Json<StoredRoute>,
) -> Result<(StatusCode, Json<RouteView>), ApiError> {
    let (route, replaced) = state
        .routes
        .save(&record, &state.normalizer, ADMIN_ROUTE_PREFIX)
        .await
        .map_err(|e| ApiError(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    info!(route = %route.id, points = route.points.len(), replaced, "Route saved");
    let status = if replaced { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(route.into())))
}

#[derive(Deserialize)]
pub(crate) struct DirectionsQuery {
    from: String,
    to: String,
    profile: Option<String>,
}

pub(crate) async fn directions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DirectionsQuery>,
) -> Result<Json<Directions>, ApiError> {
    let start = parse_point(&query.from, &state.normalizer)
        .ok_or_else(|| ApiError(StatusCode::BAD_REQUEST, format!("invalid 'from' point: {}", query.from)))?;
    let end = parse_point(&query.to, &state.normalizer)
        .ok_or_else(|| ApiError(StatusCode::BAD_REQUEST, format!("invalid 'to' point: {}", query.to)))?;
    let profile = match query.profile.as_deref() {
        Some(p) => p
            .parse::<Profile>()
            .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => state.profile,
    };

    let directions = state.routing.directions_or_straight_line(start, end, profile).await;
    if directions.approximate {
        warn!("Serving straight-line directions from {} to {}", start, end);
    }
    Ok(Json(directions))
}

/// Parses `a,b` into a coordinate, settling axis order with `normalizer`.
pub(crate) fn parse_point(raw: &str, normalizer: &Normalizer) -> Option<Coordinate> {
    let (a, b) = raw.split_once(',')?;
    let a: f64 = a.trim().parse().ok()?;
    let b: f64 = b.trim().parse().ok()?;
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    Some(normalizer.pair(a, b))
}
