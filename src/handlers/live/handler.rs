use std::future;
use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use tracing::{debug, info};

use crate::core::relay::ClientFrame;
use crate::state::AppState;

/// Maximum WebSocket frame size (10 MB)
pub const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
pub const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Screen-sharing WebSocket handler
///
/// Upgrades the connection and hands both halves of the socket to the
/// session coordinator. The session ends when either side goes away or the
/// server shuts down.
pub async fn live_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("Live WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_live_socket(socket, state))
}

async fn handle_live_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();

    let source = receiver.map(|frame| frame.map(client_frame));
    let sink = client_sink(sender);

    let report = state
        .coordinator
        .handle_until(source, sink, state.session_token())
        .await;

    debug!(
        session_id = %report.session_id,
        end = %report.end,
        inbound = ?report.inbound,
        outbound = ?report.outbound,
        "Live WebSocket connection terminated"
    );
}

/// Translate an axum frame into the relay's transport-neutral frame.
pub fn client_frame(message: Message) -> ClientFrame {
    match message {
        Message::Text(text) => ClientFrame::Text(text.as_str().to_owned()),
        Message::Binary(data) => ClientFrame::Binary(data),
        Message::Ping(_) | Message::Pong(_) => ClientFrame::Ping,
        Message::Close(_) => ClientFrame::Close,
    }
}

/// Wrap a WebSocket write half so the relay can write encoded JSON strings.
pub fn client_sink<K>(sink: K) -> impl Sink<String, Error = K::Error> + Unpin + Send
where
    K: Sink<Message> + Unpin + Send,
    K::Error: Send,
{
    sink.with(|json: String| future::ready(Ok::<_, K::Error>(Message::Text(json.into()))))
}
