mod common;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use wd4rs::server::connection::Connection;
use wd4rs::server::transport::WebSocketTransport;
use wd4rs::server::transport::{TransportReceiver, TransportSender};

#[tokio::test]
async fn test_websocket_transport_communication() {
    common::init_tracing();

    // Echo server: receive message, send it back
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws_stream = accept_async(stream).await.unwrap();

        while let Some(Ok(msg)) = ws_stream.next().await {
            if msg.is_text() {
                ws_stream.send(msg).await.unwrap();
            }
        }
    });

    let url = format!("ws://{}", addr);
    let (transport, mut message_rx) = WebSocketTransport::connect(&url, None).await.unwrap();
    let (mut sender, mut receiver) = transport.into_parts();

    let receiver_task = tokio::spawn(async move {
        receiver.run().await.unwrap();
    });

    let command = json!({
        "id": 1,
        "method": "session.status",
        "params": {}
    });
    sender.send(command.clone()).await.unwrap();

    let received = message_rx.recv().await.unwrap();
    assert_eq!(received, command);

    sender.close().await.unwrap();
    server_task.abort();
    receiver_task.abort();
}

#[tokio::test]
async fn test_non_json_frames_are_skipped() {
    common::init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws_stream = accept_async(stream).await.unwrap();
        ws_stream.send(WsMessage::Text("not json".into())).await.unwrap();
        ws_stream.send(WsMessage::Binary(vec![1, 2, 3].into())).await.unwrap();
        ws_stream
            .send(WsMessage::Text(json!({"type": "event"}).to_string().into()))
            .await
            .unwrap();
        ws_stream.close(None).await.ok();
    });

    let (transport, mut message_rx) =
        WebSocketTransport::connect(&format!("ws://{}", addr), None).await.unwrap();
    let (_sender, mut receiver) = transport.into_parts();
    let receiver_task = tokio::spawn(async move { receiver.run().await });

    let received = message_rx.recv().await.unwrap();
    assert_eq!(received, json!({"type": "event"}));

    // The receiver ends on the close frame and the channel closes with it
    assert!(message_rx.recv().await.is_none());
    assert!(receiver_task.await.unwrap().is_ok());
    server_task.abort();
}

#[tokio::test]
async fn test_connection_correlates_commands_over_websocket() {
    common::init_tracing();

    // Answers every command out of order: the second one first
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws_stream = accept_async(stream).await.unwrap();

        let mut held = Vec::new();
        while held.len() < 2 {
            let Some(Ok(WsMessage::Text(text))) = ws_stream.next().await else {
                return;
            };
            held.push(serde_json::from_str::<serde_json::Value>(&text).unwrap());
        }
        for command in held.iter().rev() {
            let reply = json!({
                "type": "success",
                "id": command["id"],
                "result": {"echo": command["method"]}
            });
            ws_stream
                .send(WsMessage::Text(reply.to_string().into()))
                .await
                .unwrap();
        }
        while ws_stream.next().await.is_some() {}
    });

    let (transport, message_rx) =
        WebSocketTransport::connect(&format!("ws://{}", addr), None).await.unwrap();
    let (sender, receiver) = transport.into_parts();
    let connection = Arc::new(Connection::new(sender, receiver, message_rx));

    let runner = connection.clone();
    let run_task = tokio::spawn(async move { runner.run().await });

    let (first, second) = tokio::join!(
        connection.send_command("browsingContext.getTree", json!({})),
        connection.send_command("script.getRealms", json!({})),
    );
    assert_eq!(first.unwrap()["echo"], "browsingContext.getTree");
    assert_eq!(second.unwrap()["echo"], "script.getRealms");

    connection.close().await.unwrap();
    assert!(connection.is_closed());
    let err = connection
        .send_command("session.status", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, wd4rs::Error::ChannelClosed));

    server_task.abort();
    run_task.abort();
}
