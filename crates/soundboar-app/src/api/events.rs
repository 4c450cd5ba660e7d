//! WebSocket stream of player events.
//!
//! Each event is sent as a text frame holding its name (`statechange`,
//! `filechange`, `volumechange`, `error`). Clients re-query whatever they
//! need after receiving one.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use soundboar_player::EventStream;
use tracing::{debug, trace};

use super::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let events = state.player.lock().on_event();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

async fn handle_socket(mut socket: WebSocket, mut events: EventStream) {
    debug!("Event subscriber connected");

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                trace!("Forwarding {event}");
                if socket.send(Message::Text(event.as_str().to_string())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    events.close();
    debug!("Event subscriber disconnected");
}
