//! Listener → service → gateway forwarding over the in-process broker

use listener_service::{
    ForwardingHandler, ListenerConfig, LoggedChannel, QueueListener, RelayService,
};
use op_log::OperationLog;
use queue_gateway::{
    CorrelationGateway, GatewayConfig, MemoryBroker, OutboundMessage, Selector, Transport,
};
use std::sync::Arc;
use std::time::Duration;

fn relay(broker: &MemoryBroker) -> RelayService {
    let gateway = CorrelationGateway::new(
        Arc::new(broker.clone()),
        GatewayConfig {
            write_destination: Some("outbound".to_string()),
            read_destination: Some("replies".to_string()),
            timeout_ms: 200,
            poll_wait_ms: 20,
            ..GatewayConfig::default()
        },
    );
    let channel = LoggedChannel::new(gateway, OperationLog::new("CorrelationGateway"));
    RelayService::new(Arc::new(channel))
}

fn listener_config() -> ListenerConfig {
    ListenerConfig {
        min_consumers: 1,
        max_consumers: 2,
        poll_wait: Duration::from_millis(20),
        ..ListenerConfig::new("inbound")
    }
}

async fn next_forwarded(broker: &MemoryBroker) -> Option<String> {
    broker
        .receive_selected("outbound", &Selector::all(), Duration::from_secs(2))
        .await
        .unwrap()
        .and_then(|m| m.text().map(str::to_string))
}

#[tokio::test]
async fn test_inbound_text_is_forwarded_to_write_destination() {
    let broker = MemoryBroker::new();
    let handler = Arc::new(ForwardingHandler::new(relay(&broker)));
    let handle = QueueListener::new(Arc::new(broker.clone()), handler, listener_config()).start();

    broker
        .send("inbound", OutboundMessage::text("Hello World"))
        .await
        .unwrap();

    assert_eq!(next_forwarded(&broker).await.as_deref(), Some("Hello World"));
    assert_eq!(broker.depth("inbound"), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_binary_inbound_is_skipped() {
    let broker = MemoryBroker::new();
    let handler = Arc::new(ForwardingHandler::new(relay(&broker)));
    let handle = QueueListener::new(Arc::new(broker.clone()), handler, listener_config()).start();

    broker
        .send("inbound", OutboundMessage::binary(vec![1, 2, 3]))
        .await
        .unwrap();
    broker
        .send("inbound", OutboundMessage::text("after"))
        .await
        .unwrap();

    assert_eq!(next_forwarded(&broker).await.as_deref(), Some("after"));
    assert_eq!(broker.depth("outbound"), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_service_round_trip_through_responder() {
    let broker = MemoryBroker::new();
    let service = relay(&broker);

    let responder = broker.clone();
    tokio::spawn(async move {
        let request = responder
            .receive_selected("outbound", &Selector::all(), Duration::from_secs(2))
            .await
            .unwrap()
            .expect("request reaches the write destination");
        let reply = request.reply(queue_gateway::Payload::Text("Hello back".to_string()));
        responder.send("replies", reply).await.unwrap();
    });

    let reply = service.send_and_receive("Hello").await.unwrap();
    assert_eq!(reply.as_deref(), Some("Hello back"));
}
