//! Hub config loader (strict parsing).

pub mod schema;

use std::fs;

use garden_core::{GardenError, Result};

pub use schema::{HubConfig, HubSection};

pub fn load_from_file(path: &str) -> Result<HubConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| GardenError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HubConfig> {
    let cfg: HubConfig = serde_yaml::from_str(s)
        .map_err(|e| GardenError::Malformed(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Environment overrides, applied after file parsing so deployments can
/// tweak a checked-in config without editing it.
pub fn apply_env_overrides(cfg: &mut HubConfig) -> Result<()> {
    if let Ok(host) = std::env::var("GARDEN_HUB_HOST") {
        cfg.hub.host = host;
    }
    if let Ok(port) = std::env::var("GARDEN_HUB_PORT") {
        cfg.hub.port = port
            .parse()
            .map_err(|_| GardenError::Malformed(format!("GARDEN_HUB_PORT invalid: {port}")))?;
    }
    if let Ok(origins) = std::env::var("GARDEN_HUB_ORIGINS") {
        cfg.hub.allowed_origins = origins;
    }
    cfg.validate()
}
