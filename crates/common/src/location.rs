//! Device location.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;
use crate::error::{Result, TransitError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres.
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl Location {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.longitude, self.latitude)
    }
}

/// Source of the device's current position.
///
/// Fails with [`TransitError::LocationPermissionDenied`] or
/// [`TransitError::LocationTimeout`].
pub trait LocationProvider: Send + Sync {
    fn current_location(&self) -> impl Future<Output = Result<Location>> + Send;
}

/// Always reports the same position. Used when no positioning hardware exists.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    position: Coordinate,
    accuracy: f64,
}

impl FixedLocationProvider {
    pub fn new(position: Coordinate) -> Self {
        Self {
            position,
            accuracy: 0.0,
        }
    }
}

impl LocationProvider for FixedLocationProvider {
    async fn current_location(&self) -> Result<Location> {
        Ok(Location {
            latitude: self.position.latitude,
            longitude: self.position.longitude,
            accuracy: self.accuracy,
            timestamp: Utc::now(),
        })
    }
}

/// Asks `provider` for a fix, giving up after `timeout`.
pub async fn locate_with_timeout<P: LocationProvider>(provider: &P, timeout: Duration) -> Result<Location> {
    match tokio::time::timeout(timeout, provider.current_location()).await {
        Ok(result) => result,
        Err(_) => Err(TransitError::LocationTimeout),
    }
}
