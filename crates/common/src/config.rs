use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::coords::Coordinate;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_routes_path")]
    pub routes_path: String,
    #[serde(default = "default_routing_api_url")]
    pub routing_api_url: String,
    #[serde(default)]
    pub routing_api_key: Option<String>,
    #[serde(default = "default_routing_profile")]
    pub routing_profile: String,
    #[serde(default = "default_retry_interval_ms")]
    pub bridge_retry_interval_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub bridge_retry_max_attempts: u32,
    #[serde(default = "default_latitude")]
    pub default_latitude: f64,
    #[serde(default = "default_longitude")]
    pub default_longitude: f64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_routes_path() -> String {
    "data/routes.json".to_string()
}

fn default_routing_api_url() -> String {
    "https://api.openrouteservice.org".to_string()
}

fn default_routing_profile() -> String {
    "driving-car".to_string()
}

fn default_retry_interval_ms() -> u64 {
    300
}

fn default_retry_max_attempts() -> u32 {
    20
}

// Cochabamba city centre
fn default_latitude() -> f64 {
    -17.3895
}

fn default_longitude() -> f64 {
    -66.1568
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            routes_path: default_routes_path(),
            routing_api_url: default_routing_api_url(),
            routing_api_key: None,
            routing_profile: default_routing_profile(),
            bridge_retry_interval_ms: default_retry_interval_ms(),
            bridge_retry_max_attempts: default_retry_max_attempts(),
            default_latitude: default_latitude(),
            default_longitude: default_longitude(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        envy::from_env().context("Failed to load config from environment")
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.bridge_retry_interval_ms)
    }

    /// Position used when the device location is unavailable.
    pub fn default_position(&self) -> Coordinate {
        Coordinate::new(self.default_longitude, self.default_latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.bridge_retry_interval_ms, 300);
        assert_eq!(config.bridge_retry_max_attempts, 20);
        assert!(config.routing_api_key.is_none());
        assert_eq!(config.default_position(), Coordinate::new(-66.1568, -17.3895));
    }

    #[test]
    fn environment_overrides_defaults() {
        let vars = vec![
            ("BRIDGE_RETRY_INTERVAL_MS".to_string(), "150".to_string()),
            ("ROUTING_API_KEY".to_string(), "secret".to_string()),
            ("ROUTING_PROFILE".to_string(), "foot-walking".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.retry_interval(), Duration::from_millis(150));
        assert_eq!(config.routing_api_key.as_deref(), Some("secret"));
        assert_eq!(config.routing_profile, "foot-walking");
    }
}
