//! Client integration tests against the in-memory mock bus.
//!
//! Exercises the full flow: connect, inbound event decoding, conversation
//! caching, send operations, liveness-driven disconnect, reconnect.

use std::sync::Arc;
use std::time::Duration;

use signal_dbus::bus::{BusEvent, MessageReceived, MessageReceivedV2, MockBus, ProxyCall};
use signal_dbus::monitor::BENIGN_PROBE_ERROR;
use signal_dbus::{Client, ClientEvent, Config, SignalDbusError};
use tokio::time::{sleep, timeout};

fn config() -> Config {
    let _ = env_logger::builder().is_test(true).try_init();
    Config {
        phone_number: "15551234567".to_string(),
        ..Config::default()
    }
}

fn client_with(bus: &MockBus, config: Config) -> Client {
    Client::new(config, Arc::new(bus.clone())).expect("valid config")
}

async fn next_event(client: &Client) -> ClientEvent {
    timeout(Duration::from_secs(2), client.recv_event())
        .await
        .expect("timed out waiting for client event")
        .expect("event stream ended")
}

/// Two events with the same group bytes resolve to the same conversation
/// instance, across legacy and v2 payloads.
#[tokio::test]
async fn test_conversation_referential_stability() {
    let bus = MockBus::new();
    let client = client_with(&bus, config());
    client.connect().await.unwrap();

    assert!(bus.emit(BusEvent::MessageReceived(MessageReceived::group(
        1,
        "+15551111111",
        b"team".to_vec(),
        "first",
    ))));
    assert!(bus.emit(BusEvent::MessageReceivedV2(MessageReceivedV2::group(
        2,
        "+15552222222",
        b"team".to_vec(),
        "second",
    ))));

    let first = match next_event(&client).await {
        ClientEvent::Message(m) => m,
        other => panic!("expected legacy message, got {:?}", other),
    };
    let second = match next_event(&client).await {
        ClientEvent::MessageV2(m) => m,
        other => panic!("expected v2 message, got {:?}", other),
    };

    assert!(Arc::ptr_eq(&first.conversation, &second.conversation));
    assert!(first.conversation.is_group());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_direct_conversation_identifier() {
    let bus = MockBus::new();
    let client = client_with(&bus, config());
    client.connect().await.unwrap();

    bus.emit(BusEvent::MessageReceived(MessageReceived::direct(
        1_700_000_000_000,
        "+15551234567",
        "hello there",
    )));

    match next_event(&client).await {
        ClientEvent::Message(m) => {
            assert_eq!(m.conversation.id(), "+15551234567");
            assert!(!m.conversation.is_group());
            assert_eq!(m.content, "hello there");
            assert_eq!(m.timestamp, 1_700_000_000_000);
        }
        other => panic!("expected message, got {:?}", other),
    }

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_group_identifier_is_base64() {
    let bus = MockBus::new();
    let client = client_with(&bus, config());
    client.connect().await.unwrap();

    bus.emit(BusEvent::MessageReceived(MessageReceived::group(
        1,
        "+15551234567",
        b"foo".to_vec(),
        "hi all",
    )));

    match next_event(&client).await {
        ClientEvent::Message(m) => assert_eq!(m.conversation.id(), "Zm9v"),
        other => panic!("expected message, got {:?}", other),
    }

    client.disconnect().await.unwrap();
}

/// Sending through a conversation wraps the identifier in a one-element
/// recipient list and returns a plain i64 timestamp.
#[tokio::test]
async fn test_send_message_addressing() {
    let bus = MockBus::new();
    bus.set_send_timestamp(1_700_000_000_500);
    let client = client_with(&bus, config());
    client.connect().await.unwrap();

    bus.emit(BusEvent::MessageReceived(MessageReceived::direct(
        1,
        "+15551234567",
        "ping",
    )));
    let message = match next_event(&client).await {
        ClientEvent::Message(m) => m,
        other => panic!("expected message, got {:?}", other),
    };

    let ts: i64 = message.conversation.send_message("hello", &[]).await.unwrap();
    assert_eq!(ts, 1_700_000_000_500);

    let sends: Vec<_> = bus
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ProxyCall::SendMessage { .. }))
        .collect();
    assert_eq!(
        sends,
        vec![ProxyCall::SendMessage {
            content: "hello".to_string(),
            attachments: vec![],
            recipients: vec!["+15551234567".to_string()],
        }]
    );

    client.disconnect().await.unwrap();
}

/// A fatal probe failure tears the session down exactly once and stops
/// further probes.
#[tokio::test]
async fn test_probe_failure_disconnects_once() {
    let bus = MockBus::new();
    let mut cfg = config();
    cfg.dbus.connection_check_interval = 10;
    let client = client_with(&bus, cfg);
    client.connect().await.unwrap();

    bus.fail_next_probe("org.freedesktop.DBus.Error.ServiceUnknown");

    match next_event(&client).await {
        ClientEvent::Disconnect { reason } => assert!(reason.contains("ServiceUnknown")),
        other => panic!("expected disconnect, got {:?}", other),
    }
    assert!(!client.is_connected());
    assert!(bus.subscription_released());
    assert!(bus.is_closed());

    // Probes stop after teardown, and no second disconnect shows up.
    let probes = bus.probe_count();
    sleep(Duration::from_millis(60)).await;
    assert_eq!(bus.probe_count(), probes);
    assert!(client.try_recv_event().await.is_none());
}

/// The allowlisted daemon error is swallowed: no disconnect, probes keep
/// running.
#[tokio::test]
async fn test_benign_probe_failure_is_swallowed() {
    let bus = MockBus::new();
    let mut cfg = config();
    cfg.dbus.connection_check_interval = 10;
    let client = client_with(&bus, cfg);
    client.connect().await.unwrap();

    bus.fail_next_probe(format!(
        "org.asamk.Signal.Error.Failure: {}: unable to refresh",
        BENIGN_PROBE_ERROR
    ));

    sleep(Duration::from_millis(80)).await;
    assert!(client.is_connected());
    assert!(client.try_recv_event().await.is_none());
    assert!(bus.probe_count() >= 2, "timer should keep running");

    client.disconnect().await.unwrap();
}

/// Settings with a string where a number belongs fail before any transport
/// call.
#[tokio::test]
async fn test_string_interval_rejected_before_transport() {
    let bus = MockBus::new();
    let result = Config::from_value(serde_json::json!({
        "dbus": { "connectionCheckInterval": "5000" },
        "phoneNumber": "15551234567"
    }));
    assert!(matches!(result, Err(SignalDbusError::Configuration(_))));
    assert!(bus.opened_scopes().is_empty());
}

/// Events reach the application in transport delivery order.
#[tokio::test]
async fn test_event_order_is_fifo() {
    let bus = MockBus::new();
    let client = client_with(&bus, config());
    client.connect().await.unwrap();

    bus.emit(BusEvent::MessageReceived(MessageReceived::direct(1, "+15551111111", "one")));
    bus.emit(BusEvent::Error("name owner changed".to_string()));
    bus.emit(BusEvent::MessageReceivedV2(MessageReceivedV2::direct(2, "+15551111111", "two")));

    assert!(matches!(next_event(&client).await, ClientEvent::Message(m) if m.content == "one"));
    assert!(matches!(next_event(&client).await, ClientEvent::Error(e) if e == "name owner changed"));
    assert!(matches!(next_event(&client).await, ClientEvent::MessageV2(m) if m.content == "two"));

    client.disconnect().await.unwrap();
}

/// Transport error events are non-fatal: the session stays up around them.
#[tokio::test]
async fn test_transport_error_keeps_session() {
    let bus = MockBus::new();
    let client = client_with(&bus, config());
    client.connect().await.unwrap();

    bus.emit(BusEvent::Error("dropped signal".to_string()));
    assert!(matches!(next_event(&client).await, ClientEvent::Error(_)));
    assert!(client.is_connected());

    bus.emit(BusEvent::MessageReceived(MessageReceived::direct(3, "+15551111111", "still here")));
    assert!(matches!(next_event(&client).await, ClientEvent::Message(_)));

    client.disconnect().await.unwrap();
}

/// After a detected disconnect the application may connect again on the same
/// client.
#[tokio::test]
async fn test_reconnect_after_detected_disconnect() {
    let bus = MockBus::new();
    let mut cfg = config();
    cfg.dbus.connection_check_interval = 10;
    let client = client_with(&bus, cfg);
    client.connect().await.unwrap();

    bus.fail_next_probe("org.freedesktop.DBus.Error.NoReply");
    assert!(matches!(next_event(&client).await, ClientEvent::Disconnect { .. }));
    assert!(!client.is_connected());

    client.connect().await.unwrap();
    assert!(client.is_connected());

    bus.emit(BusEvent::MessageReceived(MessageReceived::direct(9, "+15551111111", "back")));
    assert!(matches!(next_event(&client).await, ClientEvent::Message(m) if m.content == "back"));

    client.disconnect().await.unwrap();
}

/// Conversations created by inbound events are visible to explicit lookup,
/// and vice versa.
#[tokio::test]
async fn test_cache_shared_between_events_and_lookup() {
    let bus = MockBus::new();
    let client = client_with(&bus, config());
    client.connect().await.unwrap();

    let explicit = client.direct_conversation("+15559998888").await.unwrap();
    bus.emit(BusEvent::MessageReceived(MessageReceived::direct(1, "+15559998888", "hey")));

    match next_event(&client).await {
        ClientEvent::Message(m) => assert!(Arc::ptr_eq(&m.conversation, &explicit)),
        other => panic!("expected message, got {:?}", other),
    }

    client.disconnect().await.unwrap();
}
