//! Connection manager: the client's single serialized owner.
//!
//! One actor task owns the transport, the state machine, the reassembly
//! buffer, the batcher, the health monitor, and the retry schedule. Every
//! source of work — caller commands, inbound frames, the batch tick, health
//! and retry deadlines — is an arm of one `tokio::select!` loop, so all
//! state transitions execute with mutual exclusion. The `biased` keyword
//! ensures shutdown is observed before any other work.

mod command;
mod event;
mod inbound;
mod state;

use leaky_bucket::RateLimiter;
use log::{info, warn};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{self, Instant as TokioInstant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use command::Command;
pub use command::{CapabilityError, ConnectError, SendError};
pub use event::ClientEvent;
pub use state::ConnectionState;

use crate::{
    assembly::ReassemblyBuffer,
    backoff::RetrySchedule,
    batch::Batcher,
    config::ClientConfig,
    frame::{self, MessageId, OutboundFrame, OutboundRequest},
    health::HealthMonitor,
    transport::{Connector, Transport, TransportError, WsConnector},
};

/// Capacity of the command channel between handles and the actor.
const COMMAND_QUEUE_DEPTH: usize = 16;

/// Handle to a running client actor.
///
/// Cloneable; all clones address the same connection. Dropping every clone
/// without calling [`shutdown`](Self::shutdown) also stops the actor once
/// the command channel closes.
///
/// # Examples
///
/// ```no_run
/// use chatwire::{ChatClient, ClientConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (client, mut events) = ChatClient::spawn(ClientConfig::new("ws://localhost:8000/ws/chat"));
/// client.connect().await?;
/// let id = client.send("hello").await?;
/// let _event = events.recv().await;
/// # drop(id);
/// client.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ChatClient {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    finished: CancellationToken,
}

impl ChatClient {
    /// Spawn a client over the production WebSocket connector.
    ///
    /// Returns the handle and the consumer event receiver. The client
    /// starts disconnected; call [`connect`](Self::connect) to dial.
    #[must_use]
    pub fn spawn(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        Self::spawn_with_connector(config, WsConnector::new())
    }

    /// Spawn a client over a custom [`Connector`].
    #[must_use]
    pub fn spawn_with_connector<C: Connector>(
        config: ClientConfig,
        connector: C,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();
        let finished = CancellationToken::new();

        let manager = ConnectionManager::new(
            config,
            connector,
            command_rx,
            event_tx,
            state_tx,
            shutdown.clone(),
            finished.clone(),
        );
        tokio::spawn(manager.run());

        (
            Self {
                commands: command_tx,
                state_rx,
                shutdown,
                finished,
            },
            event_rx,
        )
    }

    /// Establish a connection from `Disconnected` or `Failed`.
    ///
    /// Resolves once the first attempt finishes. A failed attempt still
    /// schedules automatic retries; the error reports the initial failure.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::InProgress`] when an attempt is already
    /// running or the client is connected, [`ConnectError::Transport`] when
    /// the dial fails, and [`ConnectError::ClientClosed`] when the actor
    /// has stopped.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connect { reply })
            .await
            .map_err(|_| ConnectError::ClientClosed)?;
        response.await.map_err(|_| ConnectError::ClientClosed)?
    }

    /// Send a text request, returning its assigned identifier.
    ///
    /// Valid only while connected; nothing is queued otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Capability`] while not connected or rate
    /// limited, [`SendError::Assembly`] when the in-flight cap is reached,
    /// [`SendError::Encode`] for empty or overlong content,
    /// [`SendError::Transport`] when the write fails, and
    /// [`SendError::ClientClosed`] when the actor has stopped.
    pub async fn send(&self, content: impl Into<String>) -> Result<MessageId, SendError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                content: content.into(),
                reply,
            })
            .await
            .map_err(|_| SendError::ClientClosed)?;
        response.await.map_err(|_| SendError::ClientClosed)?
    }

    /// Snapshot of the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { *self.state_rx.borrow() }

    /// Watch channel following state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> { self.state_rx.clone() }

    /// Stop the actor: cancel pending retries and deadlines, close the
    /// transport, and move to `Disconnected`.
    ///
    /// Idempotent; resolves once the actor has exited, after which no
    /// further event or timer can fire.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.finished.cancelled().await;
    }
}

/// The actor owning one connection's entire mutable state.
struct ConnectionManager<C: Connector> {
    config: ClientConfig,
    connector: C,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    finished: CancellationToken,
    transport: Option<C::Stream>,
    assembly: ReassemblyBuffer,
    batcher: Batcher,
    health: HealthMonitor,
    retry: RetrySchedule,
    retry_at: Option<TokioInstant>,
    rate_limiter: Option<RateLimiter>,
}

impl<C: Connector> ConnectionManager<C> {
    fn new(
        config: ClientConfig,
        connector: C,
        commands: mpsc::Receiver<Command>,
        events: mpsc::UnboundedSender<ClientEvent>,
        state_tx: watch::Sender<ConnectionState>,
        shutdown: CancellationToken,
        finished: CancellationToken,
    ) -> Self {
        let assembly = ReassemblyBuffer::new(
            config.max_in_flight_value(),
            config.stall_timeout_value(),
        );
        let health = HealthMonitor::new(
            config.ping_interval_value(),
            config.pong_timeout_value(),
        );
        let retry = RetrySchedule::new(
            config.retry_base_delay(),
            config.retry_max_delay(),
            config.retry_jitter(),
        );
        let rate_limiter = config.send_rate_limit_value().map(|limit| {
            RateLimiter::builder()
                .initial(limit.max_messages)
                .refill(limit.max_messages)
                .interval(limit.window)
                .max(limit.max_messages)
                .build()
        });
        Self {
            config,
            connector,
            commands,
            events,
            state: ConnectionState::Disconnected,
            state_tx,
            shutdown,
            finished,
            transport: None,
            assembly,
            batcher: Batcher::new(),
            health,
            retry,
            retry_at: None,
            rate_limiter,
        }
    }

    /// Drive the actor until shutdown or until every handle is dropped.
    async fn run(mut self) {
        let mut batch_tick = time::interval(self.config.batch_interval_value());
        batch_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Availability is computed before the select so the guards do
            // not borrow fields the branch futures hold mutably.
            let has_transport = self.transport.is_some();
            let health_deadline = self.health.next_deadline().map(TokioInstant::from_std);
            let retry_deadline = self.retry_at;

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    self.handle_shutdown().await;
                    return;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.handle_shutdown().await;
                        return;
                    }
                },

                inbound = Self::next_inbound(self.transport.as_mut()), if has_transport => {
                    self.handle_inbound(inbound).await;
                }

                _ = batch_tick.tick() => self.on_batch_tick(),

                () = Self::sleep_until_opt(health_deadline), if health_deadline.is_some() =>
                    self.on_health_deadline().await,

                () = Self::sleep_until_opt(retry_deadline), if retry_deadline.is_some() =>
                    self.on_retry_deadline().await,
            }
        }
    }

    async fn next_inbound(
        transport: Option<&mut C::Stream>,
    ) -> Result<Option<String>, TransportError> {
        match transport {
            Some(stream) => stream.next_text().await,
            None => std::future::pending().await,
        }
    }

    async fn sleep_until_opt(deadline: Option<TokioInstant>) {
        match deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Clock reading shared with the sans-IO components.
    ///
    /// Read through the tokio clock so paused-time tests stay coherent.
    fn now() -> std::time::Instant { TokioInstant::now().into_std() }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send { content, reply } => {
                let result = self.handle_send(content).await;
                let write_failed = matches!(result, Err(SendError::Transport(_)));
                let _ = reply.send(result);
                if write_failed {
                    self.handle_disconnect().await;
                }
            }
            Command::Connect { reply } => {
                let result = self.handle_connect().await;
                let _ = reply.send(result);
            }
        }
    }

    async fn handle_send(&mut self, content: String) -> Result<MessageId, SendError> {
        if !self.state.is_connected() {
            return Err(CapabilityError::NotConnected { state: self.state }.into());
        }

        let request = OutboundRequest::new(
            MessageId::fresh(),
            content,
            self.config.max_message_len_value(),
        )?;
        // Invalid requests are rejected above without drawing a rate token.
        if let Some(limiter) = &self.rate_limiter
            && !limiter.try_acquire(1)
        {
            return Err(CapabilityError::RateLimited.into());
        }
        let id = request.id().clone();
        let json = frame::encode(&OutboundFrame::from(request))?;

        self.assembly.register_at(id.clone(), Self::now())?;
        self.publish_in_flight();

        let Some(transport) = self.transport.as_mut() else {
            // Connected state always carries a transport; recover anyway.
            self.assembly.evict(&id);
            return Err(CapabilityError::NotConnected { state: self.state }.into());
        };
        if let Err(error) = transport.send_text(json).await {
            self.assembly.evict(&id);
            self.publish_in_flight();
            return Err(error.into());
        }

        #[cfg(feature = "metrics")]
        crate::metrics::inc_frames(crate::metrics::Direction::Outbound);
        Ok(id)
    }

    async fn handle_connect(&mut self) -> Result<(), ConnectError> {
        if self.state.is_connected() {
            return Err(ConnectError::InProgress { state: self.state });
        }
        if !self.state.accepts_connect() {
            return Err(ConnectError::InProgress { state: self.state });
        }

        self.retry.reset();
        self.retry_at = None;
        match self.try_connect().await {
            Ok(()) => Ok(()),
            Err(error) => {
                self.schedule_retry();
                Err(error.into())
            }
        }
    }

    /// One handshake attempt: `Connecting`, dial, then `Connected` or error.
    async fn try_connect(&mut self) -> Result<(), TransportError> {
        self.set_state(ConnectionState::Connecting);
        info!("connecting: uri={}", self.config.uri());

        let dialed = tokio::select! {
            biased;
            // Shutdown interrupts the handshake; the loop observes the
            // token on its next iteration.
            () = self.shutdown.cancelled() => Err(TransportError::Closed),
            dialed = Self::dial(&self.connector, &self.config) => dialed,
        };

        match dialed {
            Ok(stream) => {
                self.transport = Some(stream);
                self.retry.reset();
                self.set_state(ConnectionState::Connected);
                if self.config.health_check_enabled() {
                    self.health.start(Self::now());
                }
                info!("connected: uri={}", self.config.uri());
                Ok(())
            }
            Err(error) => {
                warn!("connection attempt failed: uri={}, error={error}", self.config.uri());
                Err(error)
            }
        }
    }

    async fn dial(connector: &C, config: &ClientConfig) -> Result<C::Stream, TransportError> {
        let timeout = config.connect_timeout_value();
        match time::timeout(timeout, connector.connect(config.uri())).await {
            Ok(dialed) => dialed,
            Err(_elapsed) => Err(TransportError::ConnectTimeout { timeout }),
        }
    }

    /// React to an unexpected transport loss while connected.
    ///
    /// In-flight messages are failed and flushed before the state change so
    /// the consumer learns of them first.
    async fn handle_disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.health.stop();
        self.fail_in_flight("connection lost");
        self.schedule_retry();
    }

    /// Move to `Reconnecting` with a backoff delay, or `Failed` once the
    /// attempt cap is exhausted.
    fn schedule_retry(&mut self) {
        if self.retry.is_exhausted(self.config.max_retries_value()) {
            warn!(
                "reconnect attempts exhausted: attempts={}",
                self.retry.attempt()
            );
            self.retry_at = None;
            self.set_state(ConnectionState::Failed);
            return;
        }
        self.set_state(ConnectionState::Reconnecting);
        let delay = self.retry.next_delay();
        self.retry_at = Some(TokioInstant::now() + delay);
        info!(
            "reconnect scheduled: attempt={}, delay={delay:?}",
            self.retry.attempt()
        );
    }

    async fn on_retry_deadline(&mut self) {
        self.retry_at = None;
        #[cfg(feature = "metrics")]
        crate::metrics::inc_reconnects();
        if self.try_connect().await.is_err() {
            self.schedule_retry();
        }
    }

    /// Fail every streaming message, flushing trailing deltas first.
    fn fail_in_flight(&mut self, reason: &str) {
        for id in self.assembly.fail_all(reason) {
            if let Some(delta) = self.batcher.flush_now(&id) {
                self.emit(ClientEvent::TextDelta {
                    id: id.clone(),
                    delta,
                });
            }
            self.emit(ClientEvent::MessageFailed {
                id: id.clone(),
                reason: reason.to_owned(),
            });
            self.assembly.evict(&id);
        }
        self.publish_in_flight();
    }

    async fn handle_shutdown(&mut self) {
        info!("shutting down client");
        self.retry_at = None;
        self.health.stop();
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.fail_in_flight("connection lost");
        self.batcher.clear();
        self.set_state(ConnectionState::Disconnected);
        self.finished.cancel();
        info!("client shutdown complete");
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!("connection state changed: from={}, to={next}", self.state);
        self.state = next;
        self.state_tx.send_replace(next);
        self.emit(ClientEvent::StateChanged(next));
    }

    fn emit(&self, event: ClientEvent) {
        // A dropped consumer must not stall the connection.
        let _ = self.events.send(event);
    }

    fn publish_in_flight(&self) {
        #[cfg(feature = "metrics")]
        crate::metrics::set_messages_in_flight(self.assembly.len());
    }
}
