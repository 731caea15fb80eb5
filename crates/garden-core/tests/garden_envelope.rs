#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use garden_core::protocol::garden::{
    create_envelope, decode_envelope, encode_envelope, parse_envelope, BreathPayload, BreathStage,
    ConsentPayload, EnvelopeMeta, PulsePayload, Signal, SignalKind, WeavePayload,
};
use serde_json::json;

fn pulse(tick: f64) -> Signal {
    Signal::Pulse(Some(PulsePayload {
        tick,
        phase: Some("bloom".into()),
        mood: None,
        strength: Some(0.8),
    }))
}

#[test]
fn round_trip_law() {
    let cases = vec![
        create_envelope(pulse(3.0), EnvelopeMeta { actor: Some("ada".into()), ..Default::default() }),
        create_envelope(
            Signal::Breath(Some(BreathPayload {
                stage: BreathStage::Inhale,
                cadence_ms: Some(4000),
                depth: Some("deep".into()),
                coherence: Some(0.75),
                hue: None,
                phase: Some(BreathStage::Inhale),
            })),
            EnvelopeMeta { scene: Some("grove".into()), ts: Some(42), ..Default::default() },
        ),
        create_envelope(Signal::Weave(Some(WeavePayload::default())), EnvelopeMeta::default()),
        create_envelope(
            Signal::Consent(Some(ConsentPayload {
                scope: "share".into(),
                granted: true,
                depth: Some("ambient".into()),
                expires_at: Some(9999),
            })),
            EnvelopeMeta::default(),
        ),
        // Redacted payload still round-trips as null.
        create_envelope(Signal::Moment(None), EnvelopeMeta::default()),
    ];

    for env in cases {
        let decoded = decode_envelope(&encode_envelope(&env)).expect("valid envelope must decode");
        assert_eq!(decoded, env);
    }
}

#[test]
fn version_gate() {
    let wrong = json!({"v": "zzz", "type": "pulse", "ts": 1, "payload": {"tick": 1}});
    assert!(parse_envelope(&wrong).is_none());
    let missing = json!({"type": "pulse", "ts": 1, "payload": {"tick": 1}});
    assert!(parse_envelope(&missing).is_none());
}

#[test]
fn accepts_raw_string() {
    let raw = r#"{"v":"g1","type":"pulse","ts":1,"payload":{"tick":1}}"#;
    let env = parse_envelope(&json!(raw)).expect("raw string form must parse");
    assert_eq!(env.signal.kind(), SignalKind::Pulse);
    assert_eq!(env.ts, 1);

    assert!(parse_envelope(&json!(r#"{"v":"zzz","type":"pulse","ts":1,"payload":{"tick":1}}"#)).is_none());
}

#[test]
fn unwraps_one_level_of_data() {
    let inner = json!({"v": "g1", "type": "moment", "ts": 7, "payload": {"id": "m1"}});
    // Structured wrapper, as a message event would surface it.
    let wrapped = json!({"data": inner});
    assert!(parse_envelope(&wrapped).is_some());
    // String wrapper.
    let wrapped_str = json!({"data": inner.to_string()});
    let env = parse_envelope(&wrapped_str).unwrap();
    assert_eq!(env.ts, 7);
}

#[test]
fn malformed_shapes_drop_silently() {
    for bad in [
        json!(null),
        json!(42),
        json!({"v": "g1", "type": "gossip", "ts": 1, "payload": null}),
        json!({"v": "g1", "type": "pulse", "ts": "soon", "payload": null}),
        // payload key missing entirely
        json!({"v": "g1", "type": "pulse", "ts": 1}),
        // payload present but fails the pulse schema
        json!({"v": "g1", "type": "pulse", "ts": 1, "payload": {"tick": "not a number"}}),
        json!({"v": "g1", "type": "consent", "ts": 1, "payload": {"scope": "share"}}),
    ] {
        assert!(parse_envelope(&bad).is_none(), "should reject {bad}");
    }
}

#[test]
fn fractional_ts_is_numeric() {
    // Senders stamp with sub-millisecond clocks in some runtimes; any
    // JSON number satisfies the "ts is numeric" rule.
    let env =
        parse_envelope(&json!({"v": "g1", "type": "pulse", "ts": 1.5, "payload": null})).unwrap();
    assert_eq!(env.signal.kind(), SignalKind::Pulse);
    assert_eq!(env.ts, 1);

    let whole = parse_envelope(&json!({"v": "g1", "type": "pulse", "ts": 7.0, "payload": null}));
    assert_eq!(whole.unwrap().ts, 7);
}

#[test]
fn null_payload_is_well_formed() {
    let env = parse_envelope(&json!({"v": "g1", "type": "breath", "ts": 5, "payload": null})).unwrap();
    assert_eq!(env.signal, Signal::Breath(None));
}

#[test]
fn meta_carries_actor_and_scene() {
    let env = create_envelope(
        pulse(1.0),
        EnvelopeMeta { actor: Some("ada".into()), scene: Some("grove".into()), ts: Some(10) },
    );
    let text = encode_envelope(&env);
    assert!(text.contains(r#""actor":"ada""#));
    assert!(text.contains(r#""scene":"grove""#));
    let back = decode_envelope(&text).unwrap();
    assert_eq!(back.actor.as_deref(), Some("ada"));
    assert_eq!(back.scene.as_deref(), Some("grove"));
}

#[test]
fn redacted_keeps_kind() {
    let s = pulse(2.0);
    assert_eq!(s.redacted(), Signal::Pulse(None));
    assert_eq!(s.redacted().kind(), SignalKind::Pulse);
}
