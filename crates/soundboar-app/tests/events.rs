#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::Fixture;
use futures::{SinkExt, StreamExt};
use soundboar_player::SharedPlayer;
use tokio_tungstenite::tungstenite::Message;

async fn wait_for_subscribers(player: &SharedPlayer, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while player.lock().events().subscriber_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_socket_forwards_events_and_unsubscribes_on_close() {
    let fixture = Fixture::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = fixture.router();
    let server = tokio::spawn(async move { axum::serve(listener, router).await });

    let player = fixture.state.player.clone();
    let baseline = player.lock().events().subscriber_count();

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/events"))
        .await
        .unwrap();
    wait_for_subscribers(&player, baseline + 1).await;

    let sound = fixture.dir.path().join("sounds").join("bell.wav");
    player.lock().play(sound);

    let mut received = Vec::new();
    while received.len() < 2 {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(name) = frame {
            received.push(name);
        }
    }
    assert_eq!(received, ["filechange", "statechange"]);

    socket.send(Message::Close(None)).await.unwrap();
    drop(socket);
    wait_for_subscribers(&player, baseline).await;

    server.abort();
}

#[tokio::test]
async fn test_socket_receives_volume_changes() {
    let fixture = Fixture::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = fixture.router();
    let server = tokio::spawn(async move { axum::serve(listener, router).await });

    let player = fixture.state.player.clone();
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/events"))
        .await
        .unwrap();
    wait_for_subscribers(&player, 1).await;

    player.lock().volume(Some(40));

    let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame, Message::Text("volumechange".to_string()));

    server.abort();
}
