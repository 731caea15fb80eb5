use serde::Deserialize;

use garden_core::{GardenError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    pub version: u32,

    #[serde(default)]
    pub hub: HubSection,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { version: 1, hub: HubSection::default() }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GardenError::UnsupportedVersion);
        }
        self.hub.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    #[serde(default = "default_host")]
    pub host: String,

    /// First port to try; see `port_attempts`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// How many consecutive ports to try when the first is taken.
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u16,

    /// Comma-separated origin allowlist; `*` entries are wildcards.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            port_attempts: default_port_attempts(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl HubSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(GardenError::Malformed("hub.host must not be empty".into()));
        }
        if !(1..=50).contains(&self.port_attempts) {
            return Err(GardenError::Malformed(
                "hub.port_attempts must be between 1 and 50".into(),
            ));
        }
        if self.allowed_origins.trim().is_empty() {
            return Err(GardenError::Malformed(
                "hub.allowed_origins must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8787
}
fn default_port_attempts() -> u16 {
    5
}
fn default_allowed_origins() -> String {
    "*".into()
}
