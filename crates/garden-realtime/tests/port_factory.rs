#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use garden_core::GardenError;
use garden_realtime::{
    create_realtime, NoopPort, PortStatus, RealtimeKind, RealtimeOptions, RealtimePort,
    SimNetwork, WebRtcAdapter, WebRtcConfig,
};

fn unreachable_cfg() -> WebRtcConfig {
    WebRtcConfig {
        // Discard port: connection refused, immediately.
        signal_url: "ws://127.0.0.1:9".into(),
        ice_servers: Vec::new(),
        join_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

#[tokio::test]
async fn webrtc_join_fails_and_leaves_port_disconnected() {
    let port = WebRtcAdapter::new(unreachable_cfg());
    let err = port.join_circle("dawn".into()).await.unwrap_err();
    assert!(
        matches!(err, GardenError::Transport(_) | GardenError::Timeout),
        "unexpected error: {err}"
    );
    assert_eq!(port.status(), PortStatus::Disconnected);
}

#[tokio::test]
async fn webrtc_peer_ids_are_unique_and_prefixed() {
    let a = WebRtcAdapter::new(WebRtcConfig::default());
    let b = WebRtcAdapter::new(WebRtcConfig::default());
    assert!(a.my_peer_id().starts_with("peer:rtc-"));
    assert_ne!(a.my_peer_id(), b.my_peer_id());

    let fixed = WebRtcAdapter::new(WebRtcConfig {
        peer_id: Some("peer:fixed".into()),
        ..Default::default()
    });
    assert_eq!(fixed.my_peer_id(), "peer:fixed");
}

#[tokio::test]
async fn noop_port_rejects_join_but_tolerates_everything_else() {
    let port = NoopPort;
    let err = port.join_circle("dawn".into()).await.unwrap_err();
    assert!(matches!(err, GardenError::NotConfigured));
    assert_eq!(port.status(), PortStatus::Disconnected);
    port.leave_circle().await.unwrap();

    // Publishing and subscribing on a noop port must be safe no-ops.
    port.publish(
        garden_core::protocol::realtime::Topic::Presence,
        serde_json::json!({}).into(),
    );
    let sub = port.subscribe(
        garden_core::protocol::realtime::Topic::Presence,
        Arc::new(|_, _| {}),
    );
    sub.cancel();
}

#[tokio::test]
async fn factory_selects_the_right_adapter() {
    let sim = create_realtime(RealtimeOptions {
        kind: RealtimeKind::Sim,
        sim_network: Some(SimNetwork::new()),
        ..Default::default()
    });
    sim.join_circle("dawn".into()).await.unwrap();
    assert_eq!(sim.status(), PortStatus::Connected);

    let none = create_realtime(RealtimeOptions {
        kind: RealtimeKind::None,
        ..Default::default()
    });
    assert!(none.join_circle("dawn".into()).await.is_err());

    // Webrtc without a config degrades to the noop port.
    let missing = create_realtime(RealtimeOptions {
        kind: RealtimeKind::Webrtc,
        ..Default::default()
    });
    assert!(matches!(
        missing.join_circle("dawn".into()).await.unwrap_err(),
        GardenError::NotConfigured
    ));
}
