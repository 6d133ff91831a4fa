//! Shared utilities for integration tests.
//!
//! Provides a scripted in-memory [`Connector`]/[`Transport`] pair so tests
//! can drive the connection manager through connect/refuse cycles, feed it
//! inbound frames, and capture everything it writes, plus helpers for
//! asserting on the consumer event stream.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chatwire::{
    ChatClient,
    ClientConfig,
    ClientEvent,
    ConnectionState,
    Connector,
    Transport,
    TransportError,
};
use tokio::{sync::mpsc, time::timeout};

/// Ceiling for any single await inside a test. Generous because paused
/// clocks fast-forward through long virtual waits (ping intervals are two
/// minutes); a genuine hang still fails fast since the paused clock jumps
/// straight to this deadline.
pub const TEST_DEADLINE: Duration = Duration::from_secs(3600);

/// One scripted inbound item for a fake transport.
pub enum InboundScript {
    /// Deliver a text payload.
    Frame(String),
    /// Report a clean close from the peer.
    Close,
    /// Report a socket-level failure.
    Fail,
}

/// Outcome of one scripted dial attempt.
enum DialScript {
    Accept(FakeTransport),
    Refuse,
}

/// Scripted connector handing out fake transports.
///
/// Dial outcomes are queued ahead of time through [`ConnectorHandle`];
/// an empty queue refuses the attempt.
pub struct FakeConnector {
    dials: Arc<Mutex<VecDeque<DialScript>>>,
}

/// Test-side control for a [`FakeConnector`].
#[derive(Clone)]
pub struct ConnectorHandle {
    dials: Arc<Mutex<VecDeque<DialScript>>>,
}

impl FakeConnector {
    /// Create a connector and its controlling handle.
    pub fn pair() -> (Self, ConnectorHandle) {
        let dials = Arc::new(Mutex::new(VecDeque::new()));
        (
            Self {
                dials: Arc::clone(&dials),
            },
            ConnectorHandle { dials },
        )
    }
}

impl ConnectorHandle {
    /// Queue a successful dial, returning the transport's control handle.
    pub fn accept(&self) -> TransportHandle {
        let (transport, handle) = FakeTransport::pair();
        self.lock().push_back(DialScript::Accept(transport));
        handle
    }

    /// Queue a refused dial.
    pub fn refuse(&self) { self.lock().push_back(DialScript::Refuse); }

    /// Number of dial outcomes not yet consumed.
    pub fn queued(&self) -> usize { self.lock().len() }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<DialScript>> {
        self.dials.lock().expect("dial script lock poisoned")
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Stream = FakeTransport;

    async fn connect(&self, _uri: &str) -> Result<Self::Stream, TransportError> {
        let script = self
            .dials
            .lock()
            .expect("dial script lock poisoned")
            .pop_front();
        match script {
            Some(DialScript::Accept(transport)) => Ok(transport),
            Some(DialScript::Refuse) | None => Err(TransportError::Closed),
        }
    }
}

/// In-memory transport fed by an [`InboundScript`] queue.
pub struct FakeTransport {
    inbound: mpsc::UnboundedReceiver<InboundScript>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl FakeTransport {
    fn pair() -> (Self, TransportHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                inbound: inbound_rx,
                outbound: outbound_tx,
                closed: Arc::clone(&closed),
            },
            TransportHandle {
                inbound: inbound_tx,
                outbound: outbound_rx,
                closed,
            },
        )
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
        match self.inbound.recv().await {
            Some(InboundScript::Frame(text)) => Ok(Some(text)),
            Some(InboundScript::Close) => Ok(None),
            Some(InboundScript::Fail) => Err(TransportError::Closed),
            // Script handle dropped without closing: keep the connection
            // open and quiet.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) { self.closed.store(true, Ordering::SeqCst); }
}

/// Test-side control for one fake transport.
pub struct TransportHandle {
    inbound: mpsc::UnboundedSender<InboundScript>,
    outbound: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl TransportHandle {
    /// Deliver a chunk frame for `id`.
    pub fn chunk(&self, id: &str, content: &str) {
        self.frame(&format!(
            r#"{{"type":"chunk","content":{},"id":{}}}"#,
            json_str(content),
            json_str(id),
        ));
    }

    /// Deliver a completion frame for `id`.
    pub fn complete(&self, id: &str) {
        self.frame(&format!(r#"{{"type":"complete","id":{}}}"#, json_str(id)));
    }

    /// Deliver an error frame for `id`.
    pub fn error(&self, id: &str, reason: Option<&str>) {
        match reason {
            Some(reason) => self.frame(&format!(
                r#"{{"type":"error","id":{},"reason":{}}}"#,
                json_str(id),
                json_str(reason),
            )),
            None => self.frame(&format!(r#"{{"type":"error","id":{}}}"#, json_str(id))),
        }
    }

    /// Deliver a pong frame.
    pub fn pong(&self) { self.frame(r#"{"type":"pong"}"#); }

    /// Deliver an arbitrary raw payload.
    pub fn frame(&self, raw: &str) {
        self.inbound
            .send(InboundScript::Frame(raw.to_owned()))
            .expect("fake transport script receiver dropped");
    }

    /// Report a clean close from the peer.
    pub fn close(&self) {
        let _ = self.inbound.send(InboundScript::Close);
    }

    /// Report a socket-level failure.
    pub fn fail(&self) {
        let _ = self.inbound.send(InboundScript::Fail);
    }

    /// Whether the client closed this transport.
    pub fn client_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

    /// Next frame the client wrote, parsed as JSON.
    pub async fn written(&mut self) -> serde_json::Value {
        let text = timeout(TEST_DEADLINE, self.outbound.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("outbound channel closed");
        serde_json::from_str(&text).expect("client wrote invalid JSON")
    }

    /// Expect the next written frame to be a text message; returns (id, content).
    pub async fn written_text_message(&mut self) -> (String, String) {
        let frame = self.written().await;
        assert_eq!(frame["type"], "text_message");
        (
            frame["id"].as_str().expect("text message without id").to_owned(),
            frame["content"]
                .as_str()
                .expect("text message without content")
                .to_owned(),
        )
    }

    /// Expect the next written frame to be a ping.
    pub async fn written_ping(&mut self) {
        let frame = self.written().await;
        assert_eq!(frame["type"], "ping");
    }

    /// Assert the client wrote nothing (checked without waiting).
    pub fn assert_nothing_written(&mut self) {
        match self.outbound.try_recv() {
            Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {}
            Ok(frame) => panic!("unexpected outbound frame: {frame}"),
        }
    }
}

fn json_str(text: &str) -> String {
    serde_json::to_string(text).expect("string serialisation cannot fail")
}

/// Spawn a client over a fresh scripted connector.
pub fn spawn_client(
    config: ClientConfig,
) -> (
    ChatClient,
    mpsc::UnboundedReceiver<ClientEvent>,
    ConnectorHandle,
) {
    let (connector, handle) = FakeConnector::pair();
    let (client, events) = ChatClient::spawn_with_connector(config, connector);
    (client, events, handle)
}

/// Configuration tuned for fast deterministic tests: no jitter, no rate
/// limit, short timers.
pub fn test_config() -> ClientConfig {
    ClientConfig::new("ws://test.invalid/ws")
        .retry_delays(
            Duration::from_millis(100),
            Duration::from_secs(5),
            Duration::ZERO,
        )
        .batch_interval(Duration::from_millis(50))
        .ping_interval(Duration::from_secs(120))
        .pong_timeout(Duration::from_secs(10))
        .stall_timeout(Duration::from_secs(120))
        .send_rate_limit(None)
}

/// Receive the next consumer event within the test deadline.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(TEST_DEADLINE, events.recv())
        .await
        .expect("timed out waiting for a client event")
        .expect("event channel closed")
}

/// Expect the next event to be the given state change.
pub async fn expect_state(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    expected: ConnectionState,
) {
    match next_event(events).await {
        ClientEvent::StateChanged(state) => assert_eq!(state, expected),
        other => panic!("expected state change to {expected}, got {other:?}"),
    }
}

/// Connect the client through one accepted dial, consuming the
/// `Connecting` and `Connected` state events.
pub async fn connect_client(
    client: &ChatClient,
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    connector: &ConnectorHandle,
) -> TransportHandle {
    let transport = connector.accept();
    client.connect().await.expect("connect should succeed");
    expect_state(events, ConnectionState::Connecting).await;
    expect_state(events, ConnectionState::Connected).await;
    transport
}
