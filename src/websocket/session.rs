//! Per-connection chat session

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broadcast::{Broadcaster, ChatMessage};
use crate::connection_manager::{ConnectionHandle, ConnectionRegistry};
use crate::metrics::{ConnectionMetrics, WsMessageMetrics};

use super::message::OutboundMessage;

const BINARY_NOT_SUPPORTED: &str = "Binary messages are not supported";

/// How long a closing session waits for its writer to flush and close the socket
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Active,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Registry refused the connection; it was never active
    Rejected,
    /// Close frame from the client
    ClientClosed,
    /// Inbound stream ended without a close frame
    StreamEnded,
    /// Reading from the socket failed
    ReadError,
    /// Writer task stopped, usually because the socket write failed
    WriteError,
    /// Handle closed elsewhere (failed delivery, idle eviction, shutdown)
    Removed,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::ClientClosed => "client_closed",
            Self::StreamEnded => "stream_ended",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one WebSocket connection from registration to its leave notice.
///
/// Generic over the socket halves so the state machine can run against
/// in-memory channels as well as a real `WebSocket`.
pub struct ChatSession {
    client_id: String,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    announce_joins: bool,
    state: SessionState,
}

impl ChatSession {
    pub fn new(
        client_id: impl Into<String>,
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            registry,
            broadcaster,
            announce_joins: false,
            state: SessionState::Pending,
        }
    }

    pub fn announce_joins(mut self, enabled: bool) -> Self {
        self.announce_joins = enabled;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session until the connection closes.
    #[tracing::instrument(
        name = "ws.session",
        skip_all,
        fields(client_id = %self.client_id, otel.kind = "server")
    )]
    pub async fn run<R, W, E>(mut self, mut inbound: R, mut outbound: W) -> CloseReason
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        W: Sink<Message> + Unpin + Send + 'static,
        E: fmt::Display,
    {
        let started = Instant::now();

        let (handle, rx) = match self.registry.accept(self.client_id.clone()) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(client_id = %self.client_id, error = %e, "Connection rejected");
                ConnectionMetrics::record_rejected("limit");
                let _ = outbound.send(Message::Text(e.to_string().into())).await;
                let _ = outbound.close().await;
                return CloseReason::Rejected;
            }
        };
        let connection_id = handle.id;

        let mut writer = tokio::spawn(write_loop(handle.clone(), rx, outbound));
        self.state = SessionState::Active;

        tracing::info!(
            connection_id = %connection_id,
            client_id = %self.client_id,
            "WebSocket connection established"
        );

        if self.announce_joins {
            self.broadcaster
                .broadcast(&ChatMessage::joined(self.client_id.as_str()))
                .await;
        }

        let reason = loop {
            tokio::select! {
                frame = inbound.next() => match frame {
                    Some(Ok(msg)) => {
                        if let Some(reason) = self.process_message(msg, &handle).await {
                            break reason;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                        break CloseReason::ReadError;
                    }
                    None => break CloseReason::StreamEnded,
                },
                _ = &mut writer => break CloseReason::WriteError,
                _ = handle.closed() => break CloseReason::Removed,
            }
        };

        self.finish(&handle, writer, reason, started).await;
        reason
    }

    /// Handle one inbound frame; `Some` ends the session
    async fn process_message(
        &self,
        msg: Message,
        handle: &Arc<ConnectionHandle>,
    ) -> Option<CloseReason> {
        match msg {
            Message::Text(text) => {
                handle.update_activity();
                WsMessageMetrics::record_text();
                self.broadcaster
                    .broadcast(&ChatMessage::said(self.client_id.as_str(), text.as_str()))
                    .await;
                None
            }
            Message::Binary(_) => {
                WsMessageMetrics::record_binary();
                let _ = self
                    .broadcaster
                    .send_direct(handle, &ChatMessage::notice(BINARY_NOT_SUPPORTED))
                    .await;
                None
            }
            Message::Ping(_) => {
                // Pong replies are sent by the protocol layer
                handle.update_activity();
                WsMessageMetrics::record_ping();
                None
            }
            Message::Pong(_) => {
                handle.update_activity();
                WsMessageMetrics::record_pong();
                None
            }
            Message::Close(_) => {
                WsMessageMetrics::record_close();
                tracing::debug!(connection_id = %handle.id, "Received close frame");
                Some(CloseReason::ClientClosed)
            }
        }
    }

    async fn finish(
        &mut self,
        handle: &Arc<ConnectionHandle>,
        mut writer: JoinHandle<()>,
        reason: CloseReason,
        started: Instant,
    ) {
        // Closes the handle, which tells the writer to flush and close the socket
        self.registry.remove(handle.id);
        if !writer.is_finished()
            && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
                .await
                .is_err()
        {
            tracing::warn!(connection_id = %handle.id, "Writer did not finish in time, aborting");
            writer.abort();
        }
        self.state = SessionState::Closed;

        self.broadcaster
            .broadcast(&ChatMessage::left(self.client_id.as_str()))
            .await;

        let duration = started.elapsed().as_secs_f64();
        ConnectionMetrics::record_duration(duration);

        tracing::info!(
            connection_id = %handle.id,
            client_id = %self.client_id,
            reason = %reason,
            duration_secs = duration,
            "WebSocket connection closed"
        );
    }
}

/// Drain the outbound queue into the socket; the only writer of the socket.
///
/// Once the handle is closed no new messages can be queued. Messages
/// accepted before that are flushed, then a close frame is sent.
async fn write_loop<W>(
    handle: Arc<ConnectionHandle>,
    mut rx: mpsc::Receiver<OutboundMessage>,
    mut sink: W,
) where
    W: Sink<Message> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = handle.closed() => break,
            msg = rx.recv() => match msg {
                Some(msg) => {
                    if sink.send(msg.into_ws_message()).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
        }
    }

    rx.close();
    while let Ok(msg) = rx.try_recv() {
        if sink.send(msg.into_ws_message()).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::channel::mpsc as fmpsc;

    use crate::connection_manager::ConnectionLimits;

    type Inbound = fmpsc::UnboundedSender<Result<Message, String>>;
    type Outbound = fmpsc::UnboundedReceiver<Message>;

    struct Peer {
        inbound: Inbound,
        outbound: Outbound,
        task: JoinHandle<CloseReason>,
    }

    fn setup(max_connections: usize) -> (Arc<ConnectionRegistry>, Arc<Broadcaster>) {
        let registry = Arc::new(ConnectionRegistry::with_limits(ConnectionLimits {
            max_connections,
            channel_buffer_size: 16,
            send_timeout: Duration::from_millis(200),
        }));
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        (registry, broadcaster)
    }

    fn connect(
        client_id: &str,
        registry: &Arc<ConnectionRegistry>,
        broadcaster: &Arc<Broadcaster>,
        announce: bool,
    ) -> Peer {
        let (in_tx, in_rx) = fmpsc::unbounded();
        let (out_tx, out_rx) = fmpsc::unbounded();
        let session = ChatSession::new(client_id, registry.clone(), broadcaster.clone())
            .announce_joins(announce);
        assert_eq!(session.state(), SessionState::Pending);
        let task = tokio::spawn(session.run(in_rx, out_tx));
        Peer {
            inbound: in_tx,
            outbound: out_rx,
            task,
        }
    }

    async fn next_text(outbound: &mut Outbound) -> String {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(1), outbound.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("outbound closed");
            if let Message::Text(text) = msg {
                return text.as_str().to_string();
            }
        }
    }

    async fn wait_for_len(registry: &ConnectionRegistry, len: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while registry.len() != len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry did not reach expected size");
    }

    #[tokio::test]
    async fn test_text_is_broadcast_to_everyone() {
        let (registry, broadcaster) = setup(10);
        let mut alice = connect("alice", &registry, &broadcaster, false);
        let mut bob = connect("bob", &registry, &broadcaster, false);
        wait_for_len(&registry, 2).await;

        alice
            .inbound
            .unbounded_send(Ok(Message::Text("hi".into())))
            .unwrap();

        assert_eq!(next_text(&mut alice.outbound).await, "Client #alice says: hi");
        assert_eq!(next_text(&mut bob.outbound).await, "Client #alice says: hi");
    }

    #[tokio::test]
    async fn test_disconnect_announces_leave_to_remaining() {
        let (registry, broadcaster) = setup(10);
        let a = connect("a", &registry, &broadcaster, false);
        let mut b = connect("b", &registry, &broadcaster, false);
        wait_for_len(&registry, 2).await;

        a.inbound.unbounded_send(Ok(Message::Close(None))).unwrap();
        assert_eq!(a.task.await.unwrap(), CloseReason::ClientClosed);

        assert_eq!(next_text(&mut b.outbound).await, "Client #a left the chat");
        assert_eq!(registry.len(), 1);

        b.inbound
            .unbounded_send(Ok(Message::Text("still here".into())))
            .unwrap();
        assert_eq!(next_text(&mut b.outbound).await, "Client #b says: still here");
    }

    #[tokio::test]
    async fn test_stream_end_and_read_error_close_the_session() {
        let (registry, broadcaster) = setup(10);
        let a = connect("a", &registry, &broadcaster, false);
        let b = connect("b", &registry, &broadcaster, false);
        wait_for_len(&registry, 2).await;

        drop(a.inbound);
        assert_eq!(a.task.await.unwrap(), CloseReason::StreamEnded);

        b.inbound.unbounded_send(Err("reset".to_string())).unwrap();
        assert_eq!(b.task.await.unwrap(), CloseReason::ReadError);

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_binary_frame_gets_notice_and_session_stays_active() {
        let (registry, broadcaster) = setup(10);
        let mut a = connect("a", &registry, &broadcaster, false);
        wait_for_len(&registry, 1).await;

        a.inbound
            .unbounded_send(Ok(Message::Binary(vec![1u8, 2, 3].into())))
            .unwrap();
        assert_eq!(next_text(&mut a.outbound).await, BINARY_NOT_SUPPORTED);

        a.inbound
            .unbounded_send(Ok(Message::Text("after".into())))
            .unwrap();
        assert_eq!(next_text(&mut a.outbound).await, "Client #a says: after");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_join_announcement() {
        let (registry, broadcaster) = setup(10);
        let mut a = connect("a", &registry, &broadcaster, true);
        assert_eq!(next_text(&mut a.outbound).await, "Client #a joined the chat");

        let _b = connect("b", &registry, &broadcaster, true);
        assert_eq!(next_text(&mut a.outbound).await, "Client #b joined the chat");
    }

    #[tokio::test]
    async fn test_rejected_when_registry_full() {
        let (registry, broadcaster) = setup(1);
        let mut first = connect("first", &registry, &broadcaster, false);
        wait_for_len(&registry, 1).await;

        let mut second = connect("second", &registry, &broadcaster, false);
        assert_eq!(second.task.await.unwrap(), CloseReason::Rejected);

        let notice = next_text(&mut second.outbound).await;
        assert!(notice.contains("limit exceeded"));
        assert_eq!(registry.len(), 1);

        // No leave notice for a connection that never joined
        first
            .inbound
            .unbounded_send(Ok(Message::Text("ping".into())))
            .unwrap();
        assert_eq!(next_text(&mut first.outbound).await, "Client #first says: ping");
    }

    #[tokio::test]
    async fn test_removal_from_registry_ends_session() {
        let (registry, broadcaster) = setup(10);
        let a = connect("a", &registry, &broadcaster, false);
        let mut b = connect("b", &registry, &broadcaster, false);
        wait_for_len(&registry, 2).await;

        let a_id = registry
            .snapshot()
            .into_iter()
            .find(|h| h.client_id == "a")
            .map(|h| h.id)
            .unwrap();
        registry.remove(a_id);

        assert_eq!(a.task.await.unwrap(), CloseReason::Removed);
        assert_eq!(next_text(&mut b.outbound).await, "Client #a left the chat");
    }

    #[tokio::test]
    async fn test_removed_client_gets_close_frame() {
        let (registry, broadcaster) = setup(10);
        let mut a = connect("a", &registry, &broadcaster, false);
        wait_for_len(&registry, 1).await;

        let a_id = registry.connection_ids()[0];
        registry.remove(a_id);
        assert_eq!(a.task.await.unwrap(), CloseReason::Removed);

        let frames: Vec<Message> = a.outbound.collect().await;
        assert!(matches!(frames.last(), Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn test_writer_flushes_queued_frames_then_closes() {
        let (registry, _broadcaster) = setup(10);
        let (handle, rx) = registry.accept("a").unwrap();
        handle.send(OutboundMessage::text("first")).await.unwrap();
        handle.send(OutboundMessage::text("second")).await.unwrap();
        registry.remove(handle.id);

        let late = handle.send(OutboundMessage::text("late")).await;
        assert!(late.is_err());

        let (sink, stream) = fmpsc::unbounded();
        write_loop(handle, rx, sink).await;

        let frames: Vec<Message> = stream.collect().await;
        let texts: Vec<&str> = frames
            .iter()
            .filter_map(|frame| match frame {
                Message::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(matches!(frames.last(), Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn test_write_failure_ends_session() {
        let (registry, broadcaster) = setup(10);
        let mut a = connect("a", &registry, &broadcaster, false);
        wait_for_len(&registry, 1).await;

        // Dropping the socket's write side makes the next write fail
        a.outbound.close();
        a.inbound
            .unbounded_send(Ok(Message::Text("lost".into())))
            .unwrap();

        assert_eq!(a.task.await.unwrap(), CloseReason::WriteError);
        assert!(registry.is_empty());
    }
}
