//! Connection Manager
//!
//! Owns the transport lifecycle: connect, reconnect with backoff after an
//! unclean close, and teardown. All traffic shares one connection; outbound
//! requests get a monotonic `requestId` and a oneshot settlement channel, and
//! inbound frames are correlated against the pending table before anything
//! reaches the router. Uncorrelated envelopes flow out through the inbound
//! channel handed back from [`ConnectionManager::new`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::hooks::{ConnectionEvent, HookSet, LifecycleHook};
use crate::transport::{Connector, Transport, TransportEvent};

/// Lifecycle state of the managed connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    /// A connection attempt is in flight
    Connecting,
    /// The transport is open
    Open,
    /// A local disconnect is in progress
    Closing,
    /// The transport is gone
    Closed,
}

type Settlement = oneshot::Sender<Result<Value, ClientError>>;

/// Manages one server connection and its request/response traffic
pub struct ConnectionManager {
    config: ClientConfig,
    connector: Box<dyn Connector>,
    state: Mutex<ConnectionState>,
    next_request_id: AtomicU64,
    pending: Mutex<HashMap<u64, Settlement>>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    inbound_tx: mpsc::Sender<Envelope>,
    hooks: HookSet,
    reconnect_attempt: AtomicU32,
    auto_reconnect: AtomicBool,
    ever_connected: AtomicBool,
}

impl ConnectionManager {
    /// Create a manager over a connector
    ///
    /// The returned receiver yields every inbound envelope that is not a
    /// correlated response; wire it to the event router.
    #[must_use]
    pub fn new(
        connector: Box<dyn Connector>,
        config: ClientConfig,
    ) -> (Arc<Self>, mpsc::Receiver<Envelope>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.outbound_capacity);
        let manager = Arc::new(Self {
            config,
            connector,
            state: Mutex::new(ConnectionState::Idle),
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            outbound: Mutex::new(None),
            inbound_tx,
            hooks: HookSet::new(),
            reconnect_attempt: AtomicU32::new(0),
            auto_reconnect: AtomicBool::new(true),
            ever_connected: AtomicBool::new(false),
        });
        (manager, inbound_rx)
    }

    /// Register a lifecycle observer
    pub fn on_lifecycle(&self, hook: LifecycleHook) {
        self.hooks.register(hook);
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Current reconnect attempt counter (0 after a successful open)
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempt.load(Ordering::SeqCst)
    }

    /// Number of requests awaiting settlement
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Open the connection
    ///
    /// Retry-with-delay applies only after the connection has been open at
    /// least once (reconnect after an unclean close); a host dialing a down
    /// server gets an immediate answer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] on the first failure when never
    /// connected, or once the reconnect policy gives up.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        loop {
            let attempt = self.reconnect_attempt.load(Ordering::SeqCst);
            *self.state.lock() = ConnectionState::Connecting;
            self.hooks.emit(&ConnectionEvent::Connecting { attempt });

            match self.connector.connect().await {
                Ok(transport) => {
                    self.ever_connected.store(true, Ordering::SeqCst);
                    self.reconnect_attempt.store(0, Ordering::SeqCst);
                    let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
                    *self.outbound.lock() = Some(tx);
                    *self.state.lock() = ConnectionState::Open;
                    self.hooks.emit(&ConnectionEvent::Connected);
                    info!(attempt, "connection open");

                    let manager = Arc::clone(self);
                    tokio::spawn(async move {
                        manager.run_loop(transport, rx).await;
                    });
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, attempt, "connection attempt failed");
                    self.hooks.emit(&ConnectionEvent::Error {
                        message: e.to_string(),
                    });
                    let never_connected = !self.ever_connected.load(Ordering::SeqCst);
                    let next = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst) + 1;
                    let capped = self.config.max_reconnect_attempts > 0
                        && next >= self.config.max_reconnect_attempts;
                    if never_connected || !self.auto_reconnect.load(Ordering::SeqCst) || capped {
                        *self.state.lock() = ConnectionState::Closed;
                        return Err(ClientError::Transport(e));
                    }
                    tokio::time::sleep(self.config.reconnect_delay()).await;
                }
            }
        }
    }

    /// Close the connection and suppress auto-reconnect
    ///
    /// All pending requests settle with [`ClientError::ConnectionClosed`].
    pub fn disconnect(&self) {
        self.auto_reconnect.store(false, Ordering::SeqCst);
        let sender = self.outbound.lock().take();
        if sender.is_some() {
            *self.state.lock() = ConnectionState::Closing;
            // Dropping the sender lets the run loop close the transport.
        } else {
            *self.state.lock() = ConnectionState::Closed;
        }
        self.reject_pending();
    }

    /// Send a fire-and-forget event
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] when no transport is open.
    pub async fn send(&self, event: &str, payload: Map<String, Value>) -> Result<(), ClientError> {
        let envelope = Envelope {
            event: Some(event.to_string()),
            request_id: None,
            payload,
        };
        self.send_envelope(&envelope).await
    }

    /// Send a pre-built envelope verbatim
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] when no transport is open.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let Some(outbound) = self.outbound.lock().clone() else {
            return Err(ClientError::ConnectionClosed);
        };
        outbound
            .send(envelope.to_value().to_string())
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Issue a request and await its correlated response, using the
    /// configured default deadline.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::request_with_timeout`].
    pub async fn request(
        &self,
        event: &str,
        payload: Map<String, Value>,
    ) -> Result<Value, ClientError> {
        self.request_with_timeout(event, payload, self.config.request_timeout())
            .await
    }

    /// Issue a request with an explicit deadline
    ///
    /// The request id is monotonic and never reused within this manager's
    /// lifetime; the pending entry is removed on every settlement path.
    ///
    /// # Errors
    ///
    /// [`ClientError::Timeout`] past the deadline,
    /// [`ClientError::Server`] when the response carries an error field,
    /// [`ClientError::ConnectionClosed`] when the transport tears down first.
    pub async fn request_with_timeout(
        &self,
        event: &str,
        payload: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        let Some(outbound) = self.outbound.lock().clone() else {
            return Err(ClientError::ConnectionClosed);
        };

        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (settle_tx, settle_rx) = oneshot::channel();
        self.pending.lock().insert(id, settle_tx);

        let envelope = Envelope {
            event: Some(event.to_string()),
            request_id: Some(id),
            payload,
        };
        if outbound.send(envelope.to_value().to_string()).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(ClientError::ConnectionClosed);
        }
        debug!(request_id = id, event, "request sent");

        match tokio::time::timeout(timeout, settle_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(ClientError::Timeout {
                    id,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    async fn run_loop(
        self: Arc<Self>,
        mut transport: Box<dyn Transport>,
        mut outbound_rx: mpsc::Receiver<String>,
    ) {
        enum Step {
            Outbound(Option<String>),
            Inbound(Option<TransportEvent>),
        }

        let clean = loop {
            let step = tokio::select! {
                maybe = outbound_rx.recv() => Step::Outbound(maybe),
                event = transport.next_event() => Step::Inbound(event),
            };
            match step {
                Step::Outbound(Some(text)) => {
                    if let Err(e) = transport.send_text(text).await {
                        warn!(error = %e, "send failed, tearing down");
                        self.hooks.emit(&ConnectionEvent::Error {
                            message: e.to_string(),
                        });
                        break false;
                    }
                }
                Step::Outbound(None) => {
                    // Local disconnect dropped the sender.
                    if let Err(e) = transport.close().await {
                        debug!(error = %e, "close failed");
                    }
                    break true;
                }
                Step::Inbound(Some(TransportEvent::Text(text))) => {
                    self.handle_inbound(&text).await;
                }
                Step::Inbound(Some(TransportEvent::Closed { clean, reason })) => {
                    debug!(clean, ?reason, "peer closed connection");
                    break clean;
                }
                Step::Inbound(Some(TransportEvent::Error(message))) => {
                    warn!(message, "transport error");
                    self.hooks.emit(&ConnectionEvent::Error { message });
                }
                Step::Inbound(None) => break false,
            }
        };

        self.finish_connection(clean);
    }

    fn finish_connection(self: &Arc<Self>, clean: bool) {
        *self.outbound.lock() = None;
        *self.state.lock() = ConnectionState::Closed;
        self.reject_pending();
        self.hooks.emit(&ConnectionEvent::Disconnected { clean });

        if clean || !self.auto_reconnect.load(Ordering::SeqCst) {
            return;
        }
        let next = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.max_reconnect_attempts > 0 && next > self.config.max_reconnect_attempts {
            warn!(attempts = next - 1, "reconnect attempts exhausted");
            return;
        }
        info!(attempt = next, "scheduling reconnect");
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(manager.config.reconnect_delay()).await;
            if let Err(e) = manager.connect().await {
                warn!(error = %e, "reconnect failed");
            }
        });
    }

    fn reject_pending(&self) {
        let drained: Vec<Settlement> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, sender)| sender).collect()
        };
        for sender in drained {
            let _ = sender.send(Err(ClientError::ConnectionClosed));
        }
    }

    /// Correlate one inbound frame, forwarding uncorrelated envelopes
    ///
    /// A correlated response settles exactly one pending request and is never
    /// also routed. Malformed frames are logged and dropped; the connection
    /// stays alive.
    async fn handle_inbound(&self, text: &str) {
        let value = match serde_json::from_str::<Value>(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "dropping unparseable frame");
                return;
            }
        };
        let envelope = match Envelope::from_value(value) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed envelope");
                return;
            }
        };

        if let Some(id) = envelope.request_id {
            if let Some(waiter) = self.pending.lock().remove(&id) {
                let outcome = match envelope.error() {
                    Some(message) => Err(ClientError::Server(message.to_string())),
                    None => Ok(envelope.result().cloned().unwrap_or(Value::Null)),
                };
                let _ = waiter.send(outcome);
                return;
            }
            if envelope.event.is_none() {
                warn!(request_id = id, "response for unknown request id");
                return;
            }
        }

        if self.inbound_tx.send(envelope).await.is_err() {
            warn!("inbound receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::in_process::{InProcessConnector, InProcessPeer};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::time::{sleep, Duration};

    fn test_config() -> ClientConfig {
        ClientConfig {
            request_timeout_ms: 200,
            reconnect_delay_ms: 10,
            max_reconnect_attempts: 0,
            outbound_capacity: 16,
        }
    }

    async fn connected_manager() -> (
        Arc<ConnectionManager>,
        mpsc::Receiver<Envelope>,
        InProcessPeer,
    ) {
        let (connector, mut peers_rx) = InProcessConnector::new();
        let (manager, inbound_rx) = ConnectionManager::new(Box::new(connector), test_config());
        manager.connect().await.unwrap();
        let peer = peers_rx.recv().await.unwrap();
        (manager, inbound_rx, peer)
    }

    /// Echo server settling each request with `{"echoed": <event>}`
    fn respond_to_requests(mut peer: InProcessPeer) {
        tokio::spawn(async move {
            while let Some(frame) = peer.outbound_rx.recv().await {
                let value: Value = serde_json::from_str(&frame).unwrap();
                let id = value["requestId"].as_u64().unwrap();
                let event = value["event"].as_str().unwrap().to_string();
                peer.send_text(
                    json!({"requestId": id, "result": {"echoed": event}}).to_string(),
                )
                .await
                .unwrap();
            }
        });
    }

    #[tokio::test]
    async fn test_request_settles_with_correlated_response() {
        let (manager, _inbound, peer) = connected_manager().await;
        respond_to_requests(peer);

        let result = manager.request("get_schema", Map::new()).await.unwrap();
        assert_eq!(result, json!({"echoed": "get_schema"}));
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_use_unique_ids() {
        let (manager, _inbound, mut peer) = connected_manager().await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let mgr = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                mgr.request("ping", Map::new()).await
            }));
        }

        let mut seen_ids = std::collections::HashSet::new();
        for _ in 0..10 {
            let frame = peer.outbound_rx.recv().await.unwrap();
            let value: Value = serde_json::from_str(&frame).unwrap();
            let id = value["requestId"].as_u64().unwrap();
            assert!(seen_ids.insert(id), "request id {id} reused");
            peer.send_text(json!({"requestId": id, "result": id}).to_string())
                .await
                .unwrap();
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (manager, _inbound, _peer) = connected_manager().await;

        let err = manager
            .request_with_timeout("slow", Map::new(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_server_error_field_settles_as_error() {
        let (manager, _inbound, mut peer) = connected_manager().await;

        let mgr = Arc::clone(&manager);
        let handle = tokio::spawn(async move { mgr.request("fetch", Map::new()).await });

        let frame = peer.outbound_rx.recv().await.unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        let id = value["requestId"].as_u64().unwrap();
        peer.send_text(json!({"requestId": id, "error": "not found"}).to_string())
            .await
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Server(msg) if msg == "not found"));
    }

    #[tokio::test]
    async fn test_disconnect_rejects_pending_and_suppresses_reconnect() {
        let (manager, _inbound, _peer) = connected_manager().await;

        let mgr = Arc::clone(&manager);
        let handle = tokio::spawn(async move { mgr.request("hang", Map::new()).await });
        sleep(Duration::from_millis(20)).await;

        manager.disconnect();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_unclean_close_reconnects_and_resets_counter() {
        let (connector, mut peers_rx) = InProcessConnector::new();
        let (manager, _inbound) = ConnectionManager::new(Box::new(connector), test_config());

        let attempts_seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&attempts_seen);
        manager.on_lifecycle(Box::new(move |event| {
            if let ConnectionEvent::Connecting { attempt } = event {
                log.lock().push(*attempt);
            }
        }));

        manager.connect().await.unwrap();
        let first_peer = peers_rx.recv().await.unwrap();
        first_peer.close(false).await.unwrap();

        // The manager reconnects after the configured delay.
        let second_peer = peers_rx.recv().await;
        assert!(second_peer.is_some());
        sleep(Duration::from_millis(20)).await;

        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(manager.reconnect_attempts(), 0);
        assert_eq!(*attempts_seen.lock(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_clean_close_does_not_reconnect() {
        let (connector, mut peers_rx) = InProcessConnector::new();
        let (manager, _inbound) = ConnectionManager::new(Box::new(connector), test_config());
        manager.connect().await.unwrap();
        let peer = peers_rx.recv().await.unwrap();

        peer.close(true).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(peers_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_immediately_when_server_down() {
        let (connector, _peers_rx) = InProcessConnector::new();
        connector.refusal_handle().store(true, Ordering::SeqCst);
        // Uncapped reconnect policy must not turn a dead server into a hang.
        let (manager, _inbound) = ConnectionManager::new(Box::new(connector), test_config());

        let result = tokio::time::timeout(Duration::from_millis(200), manager.connect())
            .await
            .expect("connect must settle, not retry forever");
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_reconnect_stops_at_attempt_cap() {
        let (connector, mut peers_rx) = InProcessConnector::new();
        let refuse = connector.refusal_handle();
        let config = ClientConfig {
            max_reconnect_attempts: 2,
            reconnect_delay_ms: 5,
            ..test_config()
        };
        let (manager, _inbound) = ConnectionManager::new(Box::new(connector), config);

        let attempts_seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&attempts_seen);
        manager.on_lifecycle(Box::new(move |event| {
            if let ConnectionEvent::Connecting { attempt } = event {
                log.lock().push(*attempt);
            }
        }));

        manager.connect().await.unwrap();
        let peer = peers_rx.recv().await.unwrap();
        refuse.store(true, Ordering::SeqCst);
        peer.close(false).await.unwrap();

        sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(*attempts_seen.lock(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_uncorrelated_envelopes_flow_to_inbound() {
        let (manager, mut inbound, peer) = connected_manager().await;

        peer.send_text(json!({"event": "display", "data": {"zText": "hi"}}).to_string())
            .await
            .unwrap();

        let envelope = inbound.recv().await.unwrap();
        assert_eq!(envelope.event.as_deref(), Some("display"));
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection_alive() {
        let (_manager, mut inbound, peer) = connected_manager().await;

        peer.send_text("{not json").await.unwrap();
        peer.send_text(json!({"event": "still_works"}).to_string())
            .await
            .unwrap();

        let envelope = inbound.recv().await.unwrap();
        assert_eq!(envelope.event.as_deref(), Some("still_works"));
    }

    #[tokio::test]
    async fn test_correlated_response_never_reaches_router() {
        let (manager, mut inbound, peer) = connected_manager().await;

        let mgr = Arc::clone(&manager);
        let handle = tokio::spawn(async move { mgr.request("fetch", Map::new()).await });
        sleep(Duration::from_millis(20)).await;

        peer.send_text(json!({"requestId": 1, "result": 42}).to_string())
            .await
            .unwrap();
        peer.send_text(json!({"event": "display"}).to_string())
            .await
            .unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), json!(42));
        // The only envelope the router ever sees is the named event.
        let envelope = inbound.recv().await.unwrap();
        assert_eq!(envelope.event.as_deref(), Some("display"));
        assert!(inbound.try_recv().is_err());
    }
}
