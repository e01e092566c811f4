//! Viewer hub — TCP listener, per-client queues, broadcast.
//!
//! Every accepted connection gets a reader task and a writer task
//! joined by a small bounded queue (the client's "outbound send
//! queue"). Broadcasting is fire-and-forget: the tick context pushes
//! into each queue and never awaits a socket. Queue depth is tracked
//! with an atomic per client so the engine can ask "is any send still
//! in flight?" without touching the sockets.
//!
//! Connect, disconnect and inbound text are funneled into one
//! [`HubEvent`] channel that the host drains at the top of each tick —
//! the engine's buffers are never touched from a network task.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::codec::{Envelope, ViewerCodec};
use crate::error::CastError;
use crate::stream::streamer::FrameSink;

/// Capacity of each client's outbound queue. Backpressure keeps the
/// depth at 0 or 1 in steady state; the headroom only absorbs the
/// occasional pong racing a frame.
const OUTBOUND_QUEUE_DEPTH: usize = 8;

// ── ClientId ─────────────────────────────────────────────────────

/// Identifies one viewer connection for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── HubEvent ─────────────────────────────────────────────────────

/// Connection-lifecycle notifications, consumed from the tick context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A viewer connected.
    Connected(ClientId),
    /// A viewer disconnected (socket closed or errored).
    Disconnected(ClientId),
    /// A viewer sent a text control message.
    Text(ClientId, String),
}

// ── ViewerHub ────────────────────────────────────────────────────

struct ClientHandle {
    tx: mpsc::Sender<Envelope>,
    pending: Arc<AtomicUsize>,
}

struct HubShared {
    clients: Mutex<HashMap<u64, ClientHandle>>,
    event_tx: mpsc::UnboundedSender<HubEvent>,
    next_id: AtomicU64,
}

/// TCP broadcast hub for viewer connections.
pub struct ViewerHub {
    shared: Arc<HubShared>,
    events: mpsc::UnboundedReceiver<HubEvent>,
    local_addr: SocketAddr,
    accept_task: tokio::task::JoinHandle<()>,
}

impl ViewerHub {
    /// Bind the listener and start accepting viewers.
    pub async fn bind(addr: SocketAddr) -> Result<Self, CastError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("viewer hub listening on {local_addr}");

        let (event_tx, events) = mpsc::unbounded_channel();
        let shared = Arc::new(HubShared {
            clients: Mutex::new(HashMap::new()),
            event_tx,
            next_id: AtomicU64::new(1),
        });

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        Self::admit(&accept_shared, stream, peer);
                    }
                    Err(e) => {
                        warn!("accept error: {e}");
                    }
                }
            }
        });

        Ok(Self {
            shared,
            events,
            local_addr,
            accept_task,
        })
    }

    /// The address the hub is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected viewers.
    pub fn client_count(&self) -> usize {
        self.shared.clients.lock().expect("clients lock").len()
    }

    /// Pop the next pending hub event, if any. Non-blocking; called at
    /// the top of each tick until drained.
    pub fn poll_event(&mut self) -> Option<HubEvent> {
        self.events.try_recv().ok()
    }

    /// Queue a text message to a single viewer (pong replies).
    pub fn send_text(&self, id: ClientId, text: &str) {
        let clients = self.shared.clients.lock().expect("clients lock");
        if let Some(client) = clients.get(&id.0) {
            Self::enqueue(id, client, Envelope::Text(text.to_string()));
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Register a freshly accepted connection and spawn its tasks.
    fn admit(shared: &Arc<HubShared>, stream: TcpStream, peer: SocketAddr) {
        let id = ClientId(shared.next_id.fetch_add(1, Ordering::Relaxed));
        info!("viewer {id} connected from {peer}");

        let (tx, mut rx) = mpsc::channel::<Envelope>(OUTBOUND_QUEUE_DEPTH);
        let pending = Arc::new(AtomicUsize::new(0));

        let (mut net_writer, mut net_reader) = Framed::new(stream, ViewerCodec).split();

        // Writer task: queue → socket. The pending counter drops only
        // after the write completes, so a non-zero count means a frame
        // is still in flight to this viewer.
        let writer_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let result = net_writer.send(envelope).await;
                writer_pending.fetch_sub(1, Ordering::Release);
                if let Err(e) = result {
                    debug!("viewer {id} write error: {e}");
                    break;
                }
            }
        });

        // Reader task: socket → events. Owns disconnect detection —
        // when the socket closes or errors the client is unregistered.
        let reader_shared = Arc::clone(shared);
        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(Envelope::Text(text)) => {
                        if reader_shared
                            .event_tx
                            .send(HubEvent::Text(id, text))
                            .is_err()
                        {
                            return; // hub dropped
                        }
                    }
                    Ok(Envelope::Binary(_)) => {
                        debug!("viewer {id} sent unexpected binary data; ignored");
                    }
                    Err(e) => {
                        debug!("viewer {id} read error: {e}");
                        break;
                    }
                }
            }

            info!("viewer {id} disconnected");
            reader_shared
                .clients
                .lock()
                .expect("clients lock")
                .remove(&id.0);
            let _ = reader_shared.event_tx.send(HubEvent::Disconnected(id));
        });

        shared
            .clients
            .lock()
            .expect("clients lock")
            .insert(id.0, ClientHandle { tx, pending });
        let _ = shared.event_tx.send(HubEvent::Connected(id));
    }

    fn enqueue(id: ClientId, client: &ClientHandle, envelope: Envelope) {
        client.pending.fetch_add(1, Ordering::Acquire);
        if let Err(e) = client.tx.try_send(envelope) {
            client.pending.fetch_sub(1, Ordering::Release);
            warn!("viewer {id} outbound queue rejected message: {e}");
        }
    }
}

impl FrameSink for ViewerHub {
    fn is_idle(&self) -> bool {
        self.shared
            .clients
            .lock()
            .expect("clients lock")
            .values()
            .all(|c| c.pending.load(Ordering::Acquire) == 0)
    }

    fn broadcast(&self, payload: Bytes) {
        let clients = self.shared.clients.lock().expect("clients lock");
        for (raw_id, client) in clients.iter() {
            Self::enqueue(
                ClientId(*raw_id),
                client,
                Envelope::Binary(payload.clone()),
            );
        }
    }
}

impl Drop for ViewerHub {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn bind_hub() -> ViewerHub {
        ViewerHub::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
    }

    async fn next_event(hub: &mut ViewerHub) -> HubEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                if let Some(ev) = hub.poll_event() {
                    return ev;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for hub event")
    }

    #[tokio::test]
    async fn connect_and_disconnect_events() {
        let mut hub = bind_hub().await;
        let stream = TcpStream::connect(hub.local_addr()).await.unwrap();

        let ev = next_event(&mut hub).await;
        let id = match ev {
            HubEvent::Connected(id) => id,
            other => panic!("expected connect, got {other:?}"),
        };
        assert_eq!(hub.client_count(), 1);

        drop(stream);
        assert_eq!(next_event(&mut hub).await, HubEvent::Disconnected(id));
        assert_eq!(hub.client_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_clients() {
        let mut hub = bind_hub().await;

        let a = TcpStream::connect(hub.local_addr()).await.unwrap();
        let b = TcpStream::connect(hub.local_addr()).await.unwrap();
        next_event(&mut hub).await;
        next_event(&mut hub).await;

        let payload = Bytes::from_static(&[b'U', 1, 2, 3]);
        hub.broadcast(payload.clone());

        for stream in [a, b] {
            let mut framed = Framed::new(stream, ViewerCodec);
            let env = timeout(Duration::from_secs(5), framed.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(env, Envelope::Binary(payload.clone()));
        }
    }

    #[tokio::test]
    async fn text_from_client_becomes_event() {
        let mut hub = bind_hub().await;
        let stream = TcpStream::connect(hub.local_addr()).await.unwrap();
        let id = match next_event(&mut hub).await {
            HubEvent::Connected(id) => id,
            other => panic!("expected connect, got {other:?}"),
        };

        let mut framed = Framed::new(stream, ViewerCodec);
        framed.send(Envelope::Text("ping".into())).await.unwrap();

        assert_eq!(
            next_event(&mut hub).await,
            HubEvent::Text(id, "ping".into())
        );
    }

    #[tokio::test]
    async fn send_text_targets_one_client() {
        let mut hub = bind_hub().await;
        let a = TcpStream::connect(hub.local_addr()).await.unwrap();
        let _b = TcpStream::connect(hub.local_addr()).await.unwrap();
        let id_a = match next_event(&mut hub).await {
            HubEvent::Connected(id) => id,
            other => panic!("expected connect, got {other:?}"),
        };
        next_event(&mut hub).await;

        hub.send_text(id_a, "pong");

        let mut framed = Framed::new(a, ViewerCodec);
        let env = timeout(Duration::from_secs(5), framed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(env, Envelope::Text("pong".into()));
    }

    #[tokio::test]
    async fn idle_until_a_send_is_queued() {
        let mut hub = bind_hub().await;
        assert!(hub.is_idle(), "no clients: trivially idle");

        let stream = TcpStream::connect(hub.local_addr()).await.unwrap();
        next_event(&mut hub).await;
        assert!(hub.is_idle());

        hub.broadcast(Bytes::from_static(b"UA"));
        // The queued frame eventually drains once written to the socket.
        timeout(Duration::from_secs(5), async {
            while !hub.is_idle() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue never drained");
        drop(stream);
    }
}
