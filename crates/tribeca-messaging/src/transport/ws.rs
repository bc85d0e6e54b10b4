/*
[INPUT]:  Server WebSocket URL, reconnect policy, shutdown token
[OUTPUT]: TransportEvent stream (lifecycle + inbound frames) and an outbound Transport handle
[POS]:    Transport layer - reconnecting WebSocket worker
[UPDATE]: When changing reconnection backoff, frame handling, or shutdown semantics
*/

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{Frame, Transport, TransportEvent};
use crate::error::{MessagingError, Result};

const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Maximum number of consecutive failed attempts (0 = retry forever)
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Doubling backoff for the `attempt`-th consecutive failure (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let delay = self.initial_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    fn gave_up(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Outbound handle to a reconnecting WebSocket connection.
///
/// Frames handed over while no socket is up are discarded.
#[derive(Debug, Clone)]
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Frame>,
}

impl WsTransport {
    /// Start the connection worker on the current Tokio runtime.
    pub fn spawn(
        url: &str,
        reconnect: ReconnectConfig,
        shutdown: CancellationToken,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>, JoinHandle<()>)> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(MessagingError::Config(format!(
                "unsupported url scheme `{}`",
                url.scheme()
            )));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = TransportWorker {
            url,
            reconnect,
            outbound_rx,
            event_tx,
            shutdown,
        };
        let handle = tokio::spawn(worker.run());

        Ok((
            Self {
                outbound: outbound_tx,
            },
            event_rx,
            handle,
        ))
    }

    fn push(&self, frame: Frame) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| MessagingError::TransportClosed)
    }
}

impl Transport for WsTransport {
    fn send(&self, topic: &'static str, payload: Value) -> Result<()> {
        self.push(Frame::Message {
            topic: topic.to_string(),
            data: payload,
        })
    }

    fn request_snapshot(&self, topic: &'static str) -> Result<()> {
        self.push(Frame::SnapshotRequest {
            topic: topic.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamExit {
    Disconnected,
    Shutdown,
}

struct TransportWorker {
    url: Url,
    reconnect: ReconnectConfig,
    outbound_rx: mpsc::UnboundedReceiver<Frame>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    shutdown: CancellationToken,
}

impl TransportWorker {
    async fn run(mut self) {
        let mut retry_count: u32 = 0;

        'run: loop {
            if self.shutdown.is_cancelled() {
                break 'run;
            }

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break 'run,
                result = connect_async(self.url.as_str()) => result.map_err(MessagingError::from),
            };

            match connected {
                Ok((socket, _response)) => {
                    retry_count = 0;
                    self.discard_stale_outbound();

                    info!(url = %self.url, "transport connected");
                    if !self.emit(TransportEvent::Connected) {
                        break 'run;
                    }

                    let exit = self.stream_loop(socket).await;
                    if !self.emit(TransportEvent::Disconnected) {
                        break 'run;
                    }

                    match exit {
                        StreamExit::Shutdown => break 'run,
                        StreamExit::Disconnected => {
                            warn!(url = %self.url, "transport connection lost");
                            continue 'run;
                        }
                    }
                }
                Err(err) => {
                    retry_count = retry_count.saturating_add(1);

                    if self.reconnect.gave_up(retry_count) {
                        warn!(
                            retry_count,
                            max_attempts = self.reconnect.max_attempts,
                            error = %err,
                            "transport gave up reconnecting"
                        );
                        break 'run;
                    }

                    let backoff = self.reconnect.delay_for_attempt(retry_count);
                    warn!(retry_count, ?backoff, error = %err, "transport connect failed; retrying with backoff");

                    if !self.idle(backoff).await {
                        break 'run;
                    }
                }
            }
        }

        debug!("transport worker stopped");
    }

    async fn stream_loop(&mut self, socket: Socket) -> StreamExit {
        let (mut write, mut read) = socket.split();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return StreamExit::Shutdown;
                }
                outbound = self.outbound_rx.recv() => {
                    let Some(frame) = outbound else {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return StreamExit::Shutdown;
                    };
                    let text = match frame.encode() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(topic = frame.topic(), error = %err, "frame serialization failed");
                            continue;
                        }
                    };
                    if let Err(err) = write.send(WsMessage::Text(text.into())).await {
                        warn!(error = %err, "transport write failed");
                        return StreamExit::Disconnected;
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Close(_))) | None => return StreamExit::Disconnected,
                        Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                        Some(Ok(message)) => {
                            if let Some(event) = parse_message(message)
                                && !self.emit(event)
                            {
                                return StreamExit::Shutdown;
                            }
                        }
                        Some(Err(err)) => {
                            warn!(error = %err, "transport read failed");
                            return StreamExit::Disconnected;
                        }
                    }
                }
            }
        }
    }

    /// Wait out a backoff, discarding anything published meanwhile.
    async fn idle(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = &mut sleep => return true,
                frame = self.outbound_rx.recv() => match frame {
                    Some(frame) => debug!(topic = frame.topic(), "dropping frame while disconnected"),
                    None => return false,
                },
            }
        }
    }

    fn discard_stale_outbound(&mut self) {
        while let Ok(frame) = self.outbound_rx.try_recv() {
            debug!(topic = frame.topic(), "dropping frame queued before connect");
        }
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.event_tx.send(event).is_ok()
    }
}

fn parse_message(message: WsMessage) -> Option<TransportEvent> {
    let text: String = match message {
        WsMessage::Text(text) => text.to_string(),
        WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok()?,
        _ => return None,
    };

    match Frame::decode(&text) {
        Ok(frame) => {
            let topic = frame.topic().to_string();
            let event = frame.into_event();
            if event.is_none() {
                debug!(%topic, "ignoring client-only frame from server");
            }
            event
        }
        Err(err) => {
            log_parse_fail_once(&err, &text);
            None
        }
    }
}

fn log_parse_fail_once(err: &MessagingError, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws frame parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            message = %preview,
            "ws frame parse failed"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_clamps() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(16));
        assert_eq!(config.delay_for_attempt(6), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(500), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_max_attempts_retries_forever() {
        let config = ReconnectConfig::default();
        assert!(!config.gave_up(u32::MAX));

        let bounded = ReconnectConfig {
            max_attempts: 3,
            ..ReconnectConfig::default()
        };
        assert!(!bounded.gave_up(2));
        assert!(bounded.gave_up(3));
    }

    #[test]
    fn test_parse_message_maps_frames() {
        let event = parse_message(WsMessage::Text(
            r#"{"type":"message","topic":"Notepad","data":{"content":"x"}}"#.into(),
        ));
        assert_eq!(
            event,
            Some(TransportEvent::Message {
                topic: "Notepad".into(),
                data: serde_json::json!({ "content": "x" }),
            })
        );

        assert_eq!(parse_message(WsMessage::Text("not json".into())), None);
        assert_eq!(
            parse_message(WsMessage::Text(
                r#"{"type":"snapshot_request","topic":"Notepad"}"#.into()
            )),
            None
        );
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("ééé", 3), "é...");
    }

    #[tokio::test]
    async fn test_spawn_rejects_non_websocket_urls() {
        let result = WsTransport::spawn(
            "http://127.0.0.1:1",
            ReconnectConfig::default(),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(MessagingError::Config(_))));
    }
}
