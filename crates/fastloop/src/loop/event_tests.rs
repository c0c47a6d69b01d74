use super::*;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Ping {
    value: u32,
}

impl LoopEventPayload for Ping {
    const TYPE: &'static str = "ping";
}

#[test]
fn round_trips_through_json() -> anyhow::Result<()> {
    let event = LoopEvent::new("ping", serde_json::json!({"value": 3}));
    let json = event.to_json()?;
    let back = LoopEvent::from_json(&json)?;
    assert_eq!(back.event_type, "ping");
    assert_eq!(back.decode_payload::<Ping>()?, Ping { value: 3 });
    Ok(())
}

#[test]
fn new_defaults_to_client_sender_and_no_nonce() {
    let event = LoopEvent::new("ping", serde_json::json!({"value": 1}));
    assert_eq!(event.sender, LoopEventSender::Client);
    assert!(event.nonce.is_none());
    assert!(event.loop_id.is_none());
}

#[test]
fn registry_validates_known_type() {
    let mut registry = EventRegistry::new();
    registry.register::<Ping>();
    assert!(registry.contains("ping"));
    assert!(registry.validate("ping", &serde_json::json!({"value": 7})).is_ok());
}

#[test]
fn registry_rejects_unknown_type() {
    let registry = EventRegistry::new();
    match registry.validate("ping", &serde_json::json!({"value": 7})) {
        Err(errors) => assert!(errors[0].contains("unknown event type")),
        Ok(()) => panic!("unregistered type should fail validation"),
    }
}

#[test]
fn registry_reports_field_errors_on_schema_mismatch() {
    let mut registry = EventRegistry::new();
    registry.register::<Ping>();
    match registry.validate("ping", &serde_json::json!({"value": "not a number"})) {
        Err(errors) => assert!(!errors.is_empty()),
        Ok(()) => panic!("mismatched payload should fail validation"),
    }
}

#[test]
fn now_unix_secs_is_nonzero_and_monotonic_ish() {
    let a = now_unix_secs();
    let b = now_unix_secs();
    assert!(a > 0);
    assert!(b >= a);
}
