//! End-to-end scenarios over the full stack: in-process transport,
//! connection manager, router with default handlers, and the rendering
//! pipeline down to the output tree.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use tokio::time::{sleep, Duration};

use easel::transport::in_process::{InProcessConnector, InProcessPeer};
use easel::{
    ClientConfig, ClientContext, ConnectionManager, Container, Envelope, EventRouter,
    TreeContainer,
};

struct Harness {
    connection: Arc<ConnectionManager>,
    ctx: Arc<ClientContext>,
    peer: InProcessPeer,
}

impl Harness {
    /// Connect a full client over an in-process transport and start routing
    /// inbound envelopes through the default handlers.
    async fn start() -> Self {
        let (connector, mut peers_rx) = InProcessConnector::new();
        let config = ClientConfig {
            request_timeout_ms: 500,
            reconnect_delay_ms: 10,
            ..ClientConfig::default()
        };
        let (connection, mut inbound) = ConnectionManager::new(Box::new(connector), config);

        let ctx = Arc::new(ClientContext::new());
        ctx.attach_connection(Arc::clone(&connection));
        let mut router = EventRouter::new();
        ClientContext::install_default_handlers(&mut router);

        let routing_ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                router.route(&routing_ctx, &envelope);
            }
        });

        connection.connect().await.unwrap();
        let peer = peers_rx.recv().await.unwrap();
        Self {
            connection,
            ctx,
            peer,
        }
    }

    async fn serve(&self, value: Value) {
        self.peer.send_text(value.to_string()).await.unwrap();
        // Let the routing task drain.
        sleep(Duration::from_millis(30)).await;
    }

    fn tree(&self) -> TreeContainer {
        self.ctx.root_snapshot()
    }
}

#[tokio::test]
async fn test_display_document_renders_shorthand_heading() {
    let harness = Harness::start().await;

    harness
        .serve(json!({
            "event": "display",
            "data": {"title": {"zH2": {"label": "Quarterly Report"}}}
        }))
        .await;

    let tree = harness.tree();
    assert_eq!(tree.child_count(), 1);
    let heading = &tree.nodes[0].children[0];
    assert_eq!(heading.tag, "h2");
    assert_eq!(heading.text.as_deref(), Some("Quarterly Report"));
}

#[tokio::test]
async fn test_chunked_delivery_matches_whole_document() {
    let whole = Harness::start().await;
    whole
        .serve(json!({
            "event": "display",
            "data": {
                "head": {"zH1": "Log"},
                "body": {"zText": "line one"},
                "tail": {"zText": "line two"}
            }
        }))
        .await;

    let streamed = Harness::start().await;
    streamed
        .serve(json!({
            "event": "display_chunk",
            "chunk_num": 1,
            "data": {"head": {"zH1": "Log"}}
        }))
        .await;
    streamed
        .serve(json!({
            "event": "display_chunk",
            "chunk_num": 2,
            "data": {"body": {"zText": "line one"}}
        }))
        .await;
    streamed
        .serve(json!({
            "event": "display_chunk",
            "chunk_num": 3,
            "data": {"tail": {"zText": "line two"}}
        }))
        .await;

    assert_eq!(whole.tree().nodes, streamed.tree().nodes);
}

#[tokio::test]
async fn test_gate_chunk_waits_for_explicit_continuation() {
    let harness = Harness::start().await;

    harness
        .serve(json!({
            "event": "display_chunk",
            "chunk_num": 1,
            "data": {"q": {"zText": "Continue?"}},
            "is_gate": true
        }))
        .await;

    let before = harness.tree();
    assert_eq!(before.child_count(), 1);

    // Nothing moves until the server sends the next chunk.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.tree(), before);

    harness
        .serve(json!({
            "event": "display_chunk",
            "chunk_num": 2,
            "data": {"a": {"zText": "More output"}}
        }))
        .await;
    assert_eq!(harness.tree().child_count(), 2);
}

#[tokio::test]
async fn test_out_of_sequence_chunk_leaves_tree_and_connection_intact() {
    let harness = Harness::start().await;

    harness
        .serve(json!({
            "event": "display_chunk",
            "chunk_num": 1,
            "data": {"a": {"zText": "one"}}
        }))
        .await;
    harness
        .serve(json!({
            "event": "display_chunk",
            "chunk_num": 5,
            "data": {"b": {"zText": "skipped ahead"}}
        }))
        .await;

    // Rejected chunk changed nothing, and later traffic still works.
    assert_eq!(harness.tree().child_count(), 1);
    harness
        .serve(json!({
            "event": "display",
            "data": {"fresh": {"zText": "recovered"}}
        }))
        .await;
    assert!(harness.tree().nodes[0].flat_text().contains("recovered"));
}

#[tokio::test]
async fn test_legacy_command_payload_queues_dispatch() {
    let harness = Harness::start().await;

    // Legacy shape: no event field at all.
    harness.serve(json!({"command": "open_settings"})).await;

    assert_eq!(
        harness.ctx.take_commands(),
        vec!["open_settings".to_string()]
    );
}

#[tokio::test]
async fn test_unhandled_event_lands_in_fallback_sink() {
    let harness = Harness::start().await;

    harness.serve(json!({"event": "telemetry", "cpu": 0.3})).await;

    let unrouted = harness.ctx.take_unrouted();
    assert_eq!(unrouted.len(), 1);
    assert_eq!(unrouted[0].event.as_deref(), Some("telemetry"));
}

#[tokio::test]
async fn test_request_roundtrip_shares_connection_with_display_traffic() {
    let mut harness = Harness::start().await;

    let connection = Arc::clone(&harness.connection);
    let request = tokio::spawn(async move {
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!("inventory"));
        connection.request("get_schema", payload).await
    });

    let frame = harness.peer.outbound_rx.recv().await.unwrap();
    let sent: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(sent["event"], json!("get_schema"));
    let id = sent["requestId"].as_u64().unwrap();

    // Interleave a display push before answering the request.
    harness
        .serve(json!({
            "event": "display",
            "data": {"note": {"zText": "pushed mid-request"}}
        }))
        .await;
    harness
        .peer
        .send_text(json!({"requestId": id, "result": {"fields": ["sku"]}}).to_string())
        .await
        .unwrap();

    let result = request.await.unwrap().unwrap();
    assert_eq!(result, json!({"fields": ["sku"]}));
    assert!(harness.tree().nodes[0].flat_text().contains("pushed mid-request"));
}

#[tokio::test]
async fn test_reconnect_resumes_display_traffic() {
    let (connector, mut peers_rx) = InProcessConnector::new();
    let config = ClientConfig {
        reconnect_delay_ms: 10,
        ..ClientConfig::default()
    };
    let (connection, mut inbound) = ConnectionManager::new(Box::new(connector), config);

    let ctx = Arc::new(ClientContext::new());
    let mut router = EventRouter::new();
    ClientContext::install_default_handlers(&mut router);
    let routing_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        while let Some(envelope) = inbound.recv().await {
            router.route(&routing_ctx, &envelope);
        }
    });

    connection.connect().await.unwrap();
    let first_peer = peers_rx.recv().await.unwrap();
    first_peer.close(false).await.unwrap();

    let second_peer = peers_rx.recv().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(connection.reconnect_attempts(), 0);

    second_peer
        .send_text(
            json!({"event": "display", "data": {"back": {"zText": "reconnected"}}}).to_string(),
        )
        .await
        .unwrap();
    sleep(Duration::from_millis(30)).await;
    assert!(ctx.root_snapshot().nodes[0].flat_text().contains("reconnected"));
}

#[tokio::test]
async fn test_grouped_dashboard_document() {
    let harness = Harness::start().await;

    harness
        .serve(json!({
            "event": "display",
            "data": {
                "zNavbar": ["Home", "Reports"],
                "toolbar": {
                    "_group": "actions",
                    "save": {"zDisplay": {"event": "button", "label": "Save"}},
                    "load": {"zDisplay": {"event": "button", "label": "Load"}}
                },
                "summary": {
                    "_class": "card",
                    "zH3": "Totals",
                    "zTable": {
                        "columns": ["item", "count"],
                        "rows": [["widgets", 3]]
                    }
                }
            }
        }))
        .await;

    let tree = harness.tree();
    let tags: Vec<&str> = tree.nodes.iter().map(|n| n.tag.as_str()).collect();
    assert!(tags.contains(&"nav"));

    let toolbar = tree
        .nodes
        .iter()
        .find(|n| n.attrs.get("data-key").map(String::as_str) == Some("toolbar"))
        .unwrap();
    assert!(toolbar.children[0].has_class("button-group"));

    let summary = tree
        .nodes
        .iter()
        .find(|n| n.has_class("card"))
        .unwrap();
    assert!(summary.children[0].has_class("card-header"));
    assert!(summary.flat_text().contains("widgets"));
}

#[tokio::test]
async fn test_envelope_channel_backpressure_does_not_drop_order() {
    let harness = Harness::start().await;

    for i in 1..=5u64 {
        let mut data = Map::new();
        data.insert(format!("k{i}"), json!({"zText": format!("v{i}")}));
        harness
            .peer
            .send_text(
                json!({
                    "event": "display_chunk",
                    "chunk_num": i,
                    "data": data
                })
                .to_string(),
            )
            .await
            .unwrap();
    }
    sleep(Duration::from_millis(50)).await;

    let tree = harness.tree();
    assert_eq!(tree.child_count(), 5);
    assert!(tree.nodes[4].flat_text().contains("v5"));
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_public_types_are_shareable() {
    assert_send_sync::<ClientContext>();
    assert_send_sync::<ConnectionManager>();
    assert_send_sync::<Envelope>();
}
