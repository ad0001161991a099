//! Per-connection outboxes and outbound routing
//!
//! Engines never touch sockets. They return [`Outbound`] messages and the
//! loops hand them to [`Connections::dispatch`], which encodes each message
//! once and queues the frame on every recipient's outbox. One writer task per
//! stream drains its outbox, so frames reach a client in dispatch order. A slow
//! or dead stream only backs up its own outbox; the caller never waits on it.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::metrics::Metrics;
use crate::net::protocol::{encode, ConnectionId, EncodeError, Outbound, Recipient, ServerMessage};

/// Frames a client may fall behind by before further frames are dropped
pub const OUTBOX_CAPACITY: usize = 512;

/// Length-prefixed frame shared by every recipient of one message
pub type Frame = Arc<[u8]>;

/// Sending side of a connection's frame queue
pub type Outbox = mpsc::Sender<Frame>;

/// Length-prefix a payload the way clients read it: u32 little-endian, then bytes
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Encode and frame one message
pub fn encode_frame(msg: &ServerMessage) -> Result<Frame, EncodeError> {
    Ok(frame(&encode(msg)?).into())
}

/// New outbox and the receiver its writer task drains
pub fn outbox() -> (Outbox, mpsc::Receiver<Frame>) {
    mpsc::channel(OUTBOX_CAPACITY)
}

/// Write queued frames to one stream, in order, until the outbox closes or a
/// write fails
pub async fn run_writer(
    connection: ConnectionId,
    mut stream: wtransport::SendStream,
    mut frames: mpsc::Receiver<Frame>,
    metrics: Arc<Metrics>,
) {
    while let Some(framed) = frames.recv().await {
        if let Err(e) = stream.write_all(&framed).await {
            tracing::debug!("Failed to send to {}: {}", connection, e);
            break;
        }
        metrics.record_sent(framed.len());
    }
}

/// Registry of open connections
#[derive(Clone)]
pub struct Connections {
    outboxes: Arc<RwLock<HashMap<ConnectionId, Outbox>>>,
}

impl Connections {
    pub fn new() -> Self {
        Self {
            outboxes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind (or rebind, for a newer stream) a connection's outbox.
    ///
    /// Rebinding drops the previous outbox, which ends its writer task.
    pub fn register(&self, connection: ConnectionId, outbox: Outbox) {
        self.outboxes.write().insert(connection, outbox);
    }

    pub fn unregister(&self, connection: ConnectionId) -> bool {
        self.outboxes.write().remove(&connection).is_some()
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.outboxes.read().contains_key(&connection)
    }

    pub fn len(&self) -> usize {
        self.outboxes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.read().is_empty()
    }

    /// Queue every message on its recipients' outboxes.
    ///
    /// Returns the number of frames queued. Messages to unknown connections
    /// are dropped, as are frames for a connection whose outbox is full or
    /// whose writer has stopped.
    pub fn dispatch(&self, outbound: Vec<Outbound>) -> usize {
        let mut queued = 0;
        let outboxes = self.outboxes.read();

        for Outbound { to, message } in outbound {
            let addressed = match to {
                Recipient::Connection(id) => outboxes.contains_key(&id),
                Recipient::AllExcept(excluded) => outboxes.keys().any(|&id| id != excluded),
                Recipient::All => !outboxes.is_empty(),
            };
            if !addressed {
                continue;
            }

            let framed = match encode_frame(&message) {
                Ok(framed) => framed,
                Err(e) => {
                    tracing::warn!("Failed to encode outbound message: {}", e);
                    continue;
                }
            };

            let mut push = |connection: ConnectionId, outbox: &Outbox| match outbox.try_send(framed.clone()) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Outbox of {} is full, dropping frame", connection)
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Writer of {} has stopped", connection)
                }
            };

            match to {
                Recipient::Connection(id) => {
                    if let Some(outbox) = outboxes.get(&id) {
                        push(id, outbox);
                    }
                }
                Recipient::AllExcept(excluded) => {
                    for (&id, outbox) in outboxes.iter().filter(|(&id, _)| id != excluded) {
                        push(id, outbox);
                    }
                }
                Recipient::All => {
                    for (&id, outbox) in outboxes.iter() {
                        push(id, outbox);
                    }
                }
            }
        }
        queued
    }
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}
