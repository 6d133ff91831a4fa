//! Inbound frame routing and periodic work for the connection actor.

use log::{info, warn};

use super::{ClientEvent, ConnectionManager};
use crate::{
    assembly::ChunkOutcome,
    frame::{self, InboundFrame, MessageId, OutboundFrame},
    health::HealthAction,
    transport::{Connector, Transport, TransportError},
};

impl<C: Connector> ConnectionManager<C> {
    /// Process the outcome of one transport read.
    pub(super) async fn handle_inbound(&mut self, inbound: Result<Option<String>, TransportError>) {
        match inbound {
            Ok(Some(raw)) => self.route_frame(&raw),
            Ok(None) => {
                info!("connection closed by backend");
                self.handle_disconnect().await;
            }
            Err(error) => {
                warn!("transport read failed: {error}");
                self.handle_disconnect().await;
            }
        }
    }

    /// Decode one payload and route it to the owning component.
    ///
    /// Decode failures are protocol errors: logged with the raw payload and
    /// dropped without touching the connection.
    fn route_frame(&mut self, raw: &str) {
        let frame = match frame::decode(raw) {
            Ok(frame) => frame,
            Err(error) => {
                warn!("frame dropped: {error}, raw={}", error.raw());
                #[cfg(feature = "metrics")]
                crate::metrics::inc_errors();
                return;
            }
        };
        #[cfg(feature = "metrics")]
        crate::metrics::inc_frames(crate::metrics::Direction::Inbound);

        match frame {
            InboundFrame::Chunk { id, content } => self.on_chunk(&id, &content),
            InboundFrame::Complete { id } => self.on_complete(&id),
            InboundFrame::Error { id, reason } => {
                let reason = reason.unwrap_or_else(|| "backend error".to_owned());
                self.on_failure(&id, reason);
            }
            InboundFrame::Pong => self.health.on_pong(),
        }
    }

    fn on_chunk(&mut self, id: &MessageId, content: &str) {
        match self.assembly.on_chunk_at(id, content, Self::now()) {
            ChunkOutcome::Opened => {
                self.publish_in_flight();
                self.batcher.append(id, content);
            }
            ChunkOutcome::Appended => self.batcher.append(id, content),
            // Violations are logged by the buffer; nothing reaches the
            // consumer for them.
            ChunkOutcome::IgnoredResolved | ChunkOutcome::RejectedAtCapacity => {}
        }
    }

    /// Two-phase completion: mark, flush trailing delta, notify, evict.
    fn on_complete(&mut self, id: &MessageId) {
        let Some(text) = self.assembly.on_complete(id) else {
            return;
        };
        if let Some(delta) = self.batcher.flush_now(id) {
            self.emit(ClientEvent::TextDelta {
                id: id.clone(),
                delta,
            });
        }
        self.emit(ClientEvent::MessageComplete {
            id: id.clone(),
            text,
        });
        self.assembly.evict(id);
        self.publish_in_flight();
    }

    fn on_failure(&mut self, id: &MessageId, reason: String) {
        if !self.assembly.on_error(id, reason.as_str()) {
            return;
        }
        #[cfg(feature = "metrics")]
        crate::metrics::inc_errors();
        if let Some(delta) = self.batcher.flush_now(id) {
            self.emit(ClientEvent::TextDelta {
                id: id.clone(),
                delta,
            });
        }
        self.emit(ClientEvent::MessageFailed {
            id: id.clone(),
            reason,
        });
        self.assembly.evict(id);
        self.publish_in_flight();
    }

    /// Fixed-interval flush of batched deltas plus the stall sweep.
    ///
    /// Each window flushes at most once per tick; stalled messages resolve
    /// as failures here so a silent backend cannot leave the consumer
    /// waiting forever.
    pub(super) fn on_batch_tick(&mut self) {
        for (id, delta) in self.batcher.drain_ready() {
            self.emit(ClientEvent::TextDelta { id, delta });
        }
        for id in self.assembly.sweep_stalled_at(Self::now()) {
            warn!("message stalled: id={id}");
            if let Some(delta) = self.batcher.flush_now(&id) {
                self.emit(ClientEvent::TextDelta {
                    id: id.clone(),
                    delta,
                });
            }
            self.emit(ClientEvent::MessageFailed {
                id: id.clone(),
                reason: "stalled".to_owned(),
            });
            self.assembly.evict(&id);
        }
    }

    /// Act on a health deadline: send the next ping or treat a missed pong
    /// window as a transport-level disconnect.
    pub(super) async fn on_health_deadline(&mut self) {
        match self.health.on_deadline(Self::now()) {
            HealthAction::SendPing => self.send_ping().await,
            HealthAction::Unhealthy => {
                warn!("connection unhealthy: pong deadline missed");
                self.handle_disconnect().await;
            }
            HealthAction::Idle => {}
        }
    }

    async fn send_ping(&mut self) {
        let json = match frame::encode(&OutboundFrame::Ping) {
            Ok(json) => json,
            Err(error) => {
                warn!("ping frame could not be encoded: {error}");
                return;
            }
        };
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(error) = transport.send_text(json).await {
            warn!("ping write failed: {error}");
            self.handle_disconnect().await;
        }
    }
}
