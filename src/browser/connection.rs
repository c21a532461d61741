//! DevTools WebSocket connection.
//!
//! DESIGN
//! ======
//! The socket is split once. A writer task drains an mpsc queue into the
//! sink; a reader task decodes every text message and either completes the
//! pending oneshot registered under the response `id`, or fans the event out
//! on a broadcast channel. Callers never touch the socket directly.
//!
//! LIFECYCLE
//! =========
//! When the socket ends, the reader drops every pending oneshot (in-flight
//! calls fail with `WsClosed`) and the only broadcast sender (open event
//! streams observe the end). Dropping the connection aborts both tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cdp::{Command, Incoming, Method, ProtocolError};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::BrowserError;

const OUTGOING_QUEUE_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type Reply = Result<Value, ProtocolError>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

pub struct Connection {
    outgoing: mpsc::Sender<Message>,
    pending: Pending,
    /// Template receiver; new subscriptions are `resubscribe`d from it so the
    /// reader task holds the only sender.
    events: broadcast::Receiver<cdp::Event>,
    next_id: AtomicU64,
    command_timeout: Duration,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Open the DevTools socket at `ws_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::WsConnect`] if the handshake fails.
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self, BrowserError> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::WsConnect(Box::new(e)))?;
        debug!(%ws_url, "devtools socket connected");

        let (mut sink, source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::channel::<Message>(OUTGOING_QUEUE_CAPACITY);
        let (events_tx, events) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "devtools socket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });
        let reader = tokio::spawn(read_loop(source, Arc::clone(&pending), events_tx));

        Ok(Self {
            outgoing,
            pending,
            events,
            next_id: AtomicU64::new(1),
            command_timeout,
            writer,
            reader,
        })
    }

    /// Subscribe to every event received from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<cdp::Event> {
        self.events.resubscribe()
    }

    /// Issue `params` and wait for its reply.
    ///
    /// `session_id` addresses a flattened target session; `None` talks to
    /// the browser.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Timeout`] after the command timeout,
    /// [`BrowserError::WsClosed`] if the socket ends first,
    /// [`BrowserError::Protocol`] for an error reply, and
    /// [`BrowserError::Codec`] if the result does not match `M::Returns`.
    pub async fn call<M>(&self, params: &M, session_id: Option<&str>) -> Result<M::Returns, BrowserError>
    where
        M: Method + Sync,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let command = Command::new(id, params, session_id)?;

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let text = cdp::encode_command(&command);
        if self.outgoing.send(Message::Text(text.into())).await.is_err() {
            lock(&self.pending).remove(&id);
            return Err(BrowserError::WsClosed);
        }

        let reply = match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(BrowserError::WsClosed),
            Err(_) => {
                lock(&self.pending).remove(&id);
                return Err(BrowserError::Timeout { method: M::NAME });
            }
        };

        let value = reply.map_err(|e| BrowserError::Protocol { method: M::NAME, code: e.code, message: e.message })?;
        Ok(cdp::parse_result::<M>(value)?)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn read_loop(mut source: SplitStream<WsStream>, pending: Pending, events: broadcast::Sender<cdp::Event>) {
    while let Some(message) = source.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "devtools socket read failed");
                break;
            }
        };

        match cdp::decode_message(&text) {
            Ok(Incoming::Response(response)) => {
                let waiter = lock(&pending).remove(&response.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response.result);
                    }
                    None => debug!(id = response.id, "reply for unknown or expired command"),
                }
            }
            Ok(Incoming::Event(event)) => {
                // No subscribers is the common case between captures.
                let _ = events.send(event);
            }
            Err(e) => debug!(error = %e, "undecodable devtools message"),
        }
    }

    debug!("devtools socket ended");
    lock(&pending).clear();
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
