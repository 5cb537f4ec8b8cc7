//! Common library for the transit map services.
//!
//! This crate provides shared functionality across the transit map crates,
//! including configuration management, error handling, telemetry, coordinate
//! normalization, polyline decoding, route geometry and the route collection.

// Configuration management
pub mod config;
pub use config::Config;

// Error handling types
pub mod error;
pub use error::{Result, TransitError};

// Telemetry and observability
pub mod telemetry;

// Coordinates, geometry and route data
pub mod coords;
pub mod geometry;
pub mod polyline;
pub mod route;
pub mod store;

// External collaborators: routing API and device location
pub mod location;
pub mod routing;

pub use coords::Coordinate;
pub use telemetry::init_tracing;
