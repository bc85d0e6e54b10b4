/*
[INPUT]:  Loopback WebSocket server on 127.0.0.1
[OUTPUT]: End-to-end checks of the reconnecting WebSocket transport
[POS]:    Integration tests - WebSocket transport
[UPDATE]: When frame handling or reconnect behavior changes
*/

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tribeca_messaging::{Frame, ReconnectConfig, Transport, TransportEvent, WsTransport};

const WAIT: Duration = Duration::from_secs(5);

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay_ms: 20,
        max_delay_ms: 100,
        max_attempts: 0,
    }
}

async fn next_event(events: &mut UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

#[tokio::test]
async fn test_round_trip_over_loopback() {
    let (listener, url) = listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();

        let push = Frame::Message {
            topic: "Notepad".into(),
            data: json!({ "content": "from server" }),
        };
        socket
            .send(Message::Text(serde_json::to_string(&push).unwrap().into()))
            .await
            .unwrap();

        loop {
            let Some(Ok(message)) = socket.next().await else {
                panic!("client went away before sending a command");
            };
            if let Message::Text(text) = message {
                let frame: Frame = serde_json::from_str(&text).unwrap();
                return frame;
            }
        }
    });

    let shutdown = CancellationToken::new();
    let (transport, mut events, worker) =
        assert_ok!(WsTransport::spawn(&url, fast_reconnect(), shutdown.clone()));

    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Message {
            topic: "Notepad".into(),
            data: json!({ "content": "from server" }),
        }
    );

    assert_ok!(transport.send("CancelAllOrders", json!({})));
    let received = timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(
        received,
        Frame::Message {
            topic: "CancelAllOrders".into(),
            data: json!({}),
        }
    );

    shutdown.cancel();
    timeout(WAIT, worker).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_close_reports_disconnect_then_reconnects() {
    let (listener, url) = listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut first = accept_async(stream).await.unwrap();
        first.close(None).await.unwrap();

        let (stream, _) = listener.accept().await.unwrap();
        let mut second = accept_async(stream).await.unwrap();
        while let Some(Ok(message)) = second.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let shutdown = CancellationToken::new();
    let (_transport, mut events, worker) =
        WsTransport::spawn(&url, fast_reconnect(), shutdown.clone()).unwrap();

    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
    assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

    shutdown.cancel();
    assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);
    timeout(WAIT, worker).await.unwrap().unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    // Bind and drop so the port is closed.
    let (listener, url) = listener().await;
    drop(listener);

    let config = ReconnectConfig {
        initial_delay_ms: 10,
        max_delay_ms: 10,
        max_attempts: 2,
    };
    let (_transport, mut events, worker) =
        WsTransport::spawn(&url, config, CancellationToken::new()).unwrap();

    timeout(WAIT, worker).await.unwrap().unwrap();
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_send_after_worker_exit_fails() {
    let (listener, url) = listener().await;
    drop(listener);

    let shutdown = CancellationToken::new();
    let (transport, _events, worker) =
        WsTransport::spawn(&url, fast_reconnect(), shutdown.clone()).unwrap();
    shutdown.cancel();
    timeout(WAIT, worker).await.unwrap().unwrap();

    assert_err!(transport.send("Notepad", json!({})));
}
