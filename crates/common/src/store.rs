//! In-memory route collection loaded from a document-store export.

use std::path::Path;

use tokio::sync::RwLock;

use crate::coords::Normalizer;
use crate::error::Result;
use crate::route::{Route, StoredRoute};

#[derive(Debug, Default)]
pub struct RouteStore {
    routes: RwLock<Vec<Route>>,
}

impl RouteStore {
    /// Normalizes every record, dropping the ones that do not form a route.
    pub fn from_records(records: &[StoredRoute], normalizer: &Normalizer) -> Self {
        let routes = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                match record.normalize_with(normalizer, &format!("route-{}", index)) {
                    Ok(route) => Some(route),
                    Err(e) => {
                        tracing::warn!("Dropping stored route #{}: {}", index, e);
                        None
                    }
                }
            })
            .collect();
        Self {
            routes: RwLock::new(routes),
        }
    }

    /// Reads a JSON array of route records from `path`.
    pub async fn load_from_file(path: impl AsRef<Path>, normalizer: &Normalizer) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("🚌 Loading routes from: {}", path.display());
        let raw = tokio::fs::read_to_string(path).await?;
        let records: Vec<StoredRoute> = serde_json::from_str(&raw)?;
        let store = Self::from_records(&records, normalizer);
        tracing::info!(
            "✅ Routes loaded: {} of {} records usable",
            store.len().await,
            records.len()
        );
        Ok(store)
    }

    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }

    pub async fn list(&self) -> Vec<Route> {
        self.routes.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Route> {
        self.routes.read().await.iter().find(|r| r.id == id).cloned()
    }

    /// Inserts or replaces by id. Returns `true` when an existing route was replaced.
    pub async fn upsert(&self, route: Route) -> bool {
        let mut routes = self.routes.write().await;
        Self::upsert_locked(&mut routes, route)
    }

    /// Normalizes `record` and upserts it.
    ///
    /// A record without an id gets the first free `{prefix}-N`, picked under
    /// the same write lock as the insert.
    pub async fn save(
        &self,
        record: &StoredRoute,
        normalizer: &Normalizer,
        prefix: &str,
    ) -> Result<(Route, bool)> {
        let mut routes = self.routes.write().await;
        let fallback_id = (routes.len() + 1..)
            .map(|n| format!("{}-{}", prefix, n))
            .find(|candidate| routes.iter().all(|r| &r.id != candidate))
            .unwrap_or_else(|| prefix.to_string());
        let route = record.normalize_with(normalizer, &fallback_id)?;
        let replaced = Self::upsert_locked(&mut routes, route.clone());
        Ok((route, replaced))
    }

    fn upsert_locked(routes: &mut Vec<Route>, route: Route) -> bool {
        match routes.iter_mut().find(|r| r.id == route.id) {
            Some(existing) => {
                *existing = route;
                true
            }
            None => {
                routes.push(route);
                false
            }
        }
    }
}
