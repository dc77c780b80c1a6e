//! WebSocket link to the Baileys sidecar.

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, info, warn};

use stb_core::{
    domain::ChatId,
    errors::Error,
    messaging::{
        port::{ConnectRequest, Connection, ReplyPort, Transport},
        types::{ConnectionPhase, ConnectionUpdate, TransportEvent},
    },
    Result,
};

use crate::protocol::{parse_frame, BotFrame, SidecarFrame};

const EVENT_BUFFER: usize = 64;

/// Connects to the sidecar once per [`Transport::connect`] call.
pub struct WhatsAppTransport {
    url: String,
    next_id: Arc<AtomicU64>,
}

impl WhatsAppTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    async fn connect(&self, req: ConnectRequest) -> Result<Connection> {
        let (ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("sidecar connect to {} failed: {e}", self.url)))?;
        let (mut sink, stream) = ws.split();

        let resumed = req.credentials.is_some();
        let start = serde_json::to_string(&BotFrame::Start {
            auth: req.credentials,
            browser: req.browser,
        })?;
        sink.send(Message::Text(start.into()))
            .await
            .map_err(|e| Error::Transport(format!("sidecar start failed: {e}")))?;
        info!(url = %self.url, resumed, "sidecar session started");

        Ok(spawn_pump(sink, stream, self.next_id.clone()))
    }
}

/// Reply handle for one sidecar connection.
pub struct WhatsAppReplies {
    write_tx: mpsc::UnboundedSender<String>,
    next_id: Arc<AtomicU64>,
}

#[async_trait]
impl ReplyPort for WhatsAppReplies {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&BotFrame::Send {
            id,
            jid: chat_id.0.clone(),
            text: text.to_string(),
        })?;
        self.write_tx
            .send(frame)
            .map_err(|_| Error::Transport("sidecar connection closed".to_string()))?;
        debug!(id, chat = %chat_id, "queued outbound message");
        Ok(())
    }
}

fn spawn_pump<S, R>(sink: S, stream: R, next_id: Arc<AtomicU64>) -> Connection
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let (write_tx, write_rx) = mpsc::unbounded_channel();
    tokio::spawn(pump(sink, stream, event_tx, write_rx));

    Connection {
        events: event_rx,
        replies: Arc::new(WhatsAppReplies { write_tx, next_id }),
    }
}

/// Forward sidecar frames as events and queued replies as frames.
///
/// Ends after forwarding a `close` update. If the socket goes away first, a
/// close with no reason is reported in its place.
async fn pump<S, R>(
    mut sink: S,
    mut stream: R,
    events: mpsc::Sender<TransportEvent>,
    mut writes: mpsc::UnboundedReceiver<String>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    let mut writes_open = true;
    let mut report_close = true;

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match parse_frame(text.as_str()) {
                    Ok(Some(SidecarFrame::SendResult(res))) => {
                        if res.ok {
                            debug!(id = res.id, "sidecar delivered message");
                        } else {
                            warn!(
                                id = res.id,
                                error = res.error.as_deref().unwrap_or("unknown"),
                                "sidecar failed to deliver message"
                            );
                        }
                    }
                    Ok(Some(frame)) => {
                        let Some(event) = frame.into_event() else {
                            continue;
                        };
                        let closing = matches!(
                            &event,
                            TransportEvent::Connection(u)
                                if u.connection == Some(ConnectionPhase::Close)
                        );
                        if events.send(event).await.is_err() || closing {
                            report_close = false;
                            break;
                        }
                    }
                    Ok(None) => debug!("ignoring unknown sidecar event"),
                    Err(e) => warn!(error = %e, "malformed sidecar frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        warn!(error = %e, "failed to answer sidecar ping");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("sidecar socket closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "sidecar socket error");
                    break;
                }
            },
            text = writes.recv(), if writes_open => match text {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        warn!(error = %e, "failed to write to sidecar");
                        break;
                    }
                }
                None => writes_open = false,
            },
            _ = events.closed() => {
                report_close = false;
                break;
            }
        }
    }

    if report_close {
        let _ = events
            .send(TransportEvent::Connection(ConnectionUpdate::closed_without_reason()))
            .await;
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{channel::mpsc as fmpsc, stream};

    use super::*;

    type Frame = std::result::Result<Message, WsError>;
    type Frames = Vec<Frame>;

    fn text(s: &str) -> Frame {
        Ok(Message::Text(s.to_string().into()))
    }

    /// Scripted inbound frames that end with a clean socket shutdown.
    fn finite(frames: Frames) -> impl Stream<Item = Frame> + Unpin + Send {
        stream::iter(frames)
    }

    /// Scripted inbound frames after which the socket stays open.
    fn open_ended(frames: Frames) -> impl Stream<Item = Frame> + Unpin + Send {
        stream::iter(frames).chain(stream::pending())
    }

    fn phase_of(ev: &TransportEvent) -> Option<ConnectionPhase> {
        match ev {
            TransportEvent::Connection(u) => u.connection,
            _ => None,
        }
    }

    #[tokio::test]
    async fn forwards_events_in_order_and_stops_after_close() {
        let (sink, _sink_rx) = fmpsc::unbounded::<Message>();
        let frames = open_ended(vec![
            text(r#"{"event":"connection.update","data":{"qr":"2@ref"}}"#),
            text(r#"{"event":"connection.update","data":{"connection":"open"}}"#),
            text(r#"{"event":"creds.update","data":{"me":{"id":"1"}}}"#),
            text(r#"{"event":"connection.update","data":{"connection":"close","lastDisconnect":{"error":{"output":{"statusCode":515}}}}}"#),
            text(r#"{"event":"connection.update","data":{"connection":"open"}}"#),
        ]);
        let mut conn = spawn_pump(sink, frames, Arc::new(AtomicU64::new(1)));

        let mut seen = Vec::new();
        while let Some(ev) = conn.events.recv().await {
            seen.push(ev);
        }
        assert_eq!(seen.len(), 4);
        assert!(matches!(
            &seen[0],
            TransportEvent::Connection(u) if u.qr.as_deref() == Some("2@ref")
        ));
        assert_eq!(phase_of(&seen[1]), Some(ConnectionPhase::Open));
        assert!(matches!(&seen[2], TransportEvent::CredsUpdate(_)));
        assert!(matches!(
            &seen[3],
            TransportEvent::Connection(u) if u.disconnect_status == Some(515)
        ));
    }

    #[tokio::test]
    async fn socket_end_without_close_reports_close_without_reason() {
        let (sink, _sink_rx) = fmpsc::unbounded::<Message>();
        let frames = finite(vec![
            text("{not json"),
            text(r#"{"event":"presence.update","data":{}}"#),
            text(r#"{"event":"connection.update","data":{"connection":"open"}}"#),
        ]);
        let mut conn = spawn_pump(sink, frames, Arc::new(AtomicU64::new(1)));

        let first = conn.events.recv().await.unwrap();
        assert_eq!(phase_of(&first), Some(ConnectionPhase::Open));
        let TransportEvent::Connection(last) = conn.events.recv().await.unwrap() else {
            panic!("expected close update");
        };
        assert_eq!(last, ConnectionUpdate::closed_without_reason());
        assert!(conn.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn replies_become_send_frames_with_increasing_ids() {
        let (sink, mut sink_rx) = fmpsc::unbounded::<Message>();
        let conn = spawn_pump(sink, open_ended(vec![]), Arc::new(AtomicU64::new(1)));

        let chat = ChatId("1@s.whatsapp.net".to_string());
        conn.replies.send_text(&chat, "first").await.unwrap();
        conn.replies.send_text(&chat, "second").await.unwrap();

        for (expected_id, expected_text) in [(1, "first"), (2, "second")] {
            let Some(Message::Text(frame)) = sink_rx.next().await else {
                panic!("expected text frame");
            };
            let v: serde_json::Value = serde_json::from_str(frame.as_str()).unwrap();
            assert_eq!(v["op"], "send");
            assert_eq!(v["id"], expected_id);
            assert_eq!(v["jid"], "1@s.whatsapp.net");
            assert_eq!(v["text"], expected_text);
        }
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (sink, mut sink_rx) = fmpsc::unbounded::<Message>();
        let frames = open_ended(vec![Ok(Message::Ping(vec![7u8].into()))]);
        let _conn = spawn_pump(sink, frames, Arc::new(AtomicU64::new(1)));

        let reply = sink_rx.next().await.unwrap();
        assert!(matches!(reply, Message::Pong(_)));
    }

    #[tokio::test]
    async fn replies_fail_once_the_connection_is_gone() {
        let (sink, _sink_rx) = fmpsc::unbounded::<Message>();
        let mut conn = spawn_pump(sink, finite(vec![]), Arc::new(AtomicU64::new(1)));
        while conn.events.recv().await.is_some() {}

        // The pump drops its write queue when it returns.
        let chat = ChatId("1@s.whatsapp.net".to_string());
        let mut result = Ok(());
        for _ in 0..50 {
            result = conn.replies.send_text(&chat, "late").await;
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn dropping_the_event_receiver_stops_the_pump() {
        let (sink, mut sink_rx) = fmpsc::unbounded::<Message>();
        let conn = spawn_pump(sink, open_ended(vec![]), Arc::new(AtomicU64::new(1)));
        drop(conn);

        // Sink is closed by the pump on the way out.
        let end = tokio::time::timeout(Duration::from_secs(2), sink_rx.next())
            .await
            .unwrap();
        assert!(end.is_none());
    }
}
