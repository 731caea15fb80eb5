//! Garden signaling hub.
//!
//! Thin relay between WebRTC peers in a circle:
//! - join/leave bookkeeping with roster replies and joined/left notices
//! - verbatim relay of offer/answer/ice frames to their target peer
//! - origin allowlist enforced at upgrade time

use tracing_subscriber::{fmt, EnvFilter};

use garden_hub::config::{self, HubConfig};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // Config file is optional; defaults plus env overrides cover the
    // common single-process deployment.
    let path = std::env::var("GARDEN_HUB_CONFIG").unwrap_or_else(|_| "gardenhub.yaml".into());
    let mut cfg = if std::path::Path::new(&path).exists() {
        config::load_from_file(&path).expect("config load failed")
    } else {
        HubConfig::default()
    };
    config::apply_env_overrides(&mut cfg).expect("invalid environment override");

    let hub = garden_hub::start(cfg).await.expect("hub start failed");
    if let Err(e) = hub.handle.await {
        tracing::error!(error = %e, "hub task failed");
    }
}
