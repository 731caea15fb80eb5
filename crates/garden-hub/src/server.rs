//! Hub startup: bind (with port fallback) and serve.

use std::io::ErrorKind;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use garden_core::{GardenError, Result};

use crate::app_state::AppState;
use crate::config::{HubConfig, HubSection};
use crate::router;

/// A running hub: the address it actually bound (which may differ from
/// the configured port, see [`HubSection::port_attempts`]) and the
/// serve task.
#[derive(Debug)]
pub struct Hub {
    pub addr: SocketAddr,
    pub handle: JoinHandle<()>,
}

pub async fn start(cfg: HubConfig) -> Result<Hub> {
    cfg.validate()?;
    let listener = bind_with_fallback(&cfg.hub).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| GardenError::Internal(e.to_string()))?;

    let state = AppState::new(cfg);
    let app = router::build_router(state);

    tracing::info!(%addr, "garden-hub listening");
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server exited");
        }
    });

    Ok(Hub { addr, handle })
}

/// Walk `port..port + port_attempts` until one binds. A configured port
/// of 0 asks the OS for an ephemeral port and is bound exactly once.
async fn bind_with_fallback(hub: &HubSection) -> Result<TcpListener> {
    if hub.port == 0 {
        let addr = format!("{}:0", hub.host);
        return TcpListener::bind(&addr)
            .await
            .map_err(|e| GardenError::Transport(format!("bind {addr} failed: {e}")));
    }

    let mut last_port = hub.port;
    for attempt in 0..hub.port_attempts {
        let port = match hub.port.checked_add(attempt) {
            Some(port) => port,
            None => break,
        };
        last_port = port;
        let addr = format!("{}:{}", hub.host, port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                if attempt > 0 {
                    tracing::info!(configured = hub.port, bound = port, "port fallback used");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                tracing::warn!(port, "port in use; trying next");
            }
            Err(e) => {
                return Err(GardenError::Transport(format!("bind {addr} failed: {e}")));
            }
        }
    }

    Err(GardenError::Transport(format!(
        "no free port in {}..={}",
        hub.port, last_port
    )))
}
