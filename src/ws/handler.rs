//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::matchmaking::Lobby;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();

    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerMsg>(state.config.outbound_buffer);
    let identity_id = state.lobby.connect(outbound_tx);

    info!(identity_id = %identity_id, "New WebSocket connection");

    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    run_session(identity_id, &state.lobby, rate_limiter, ws_sink, ws_stream, outbound_rx).await;

    // Cleanup on disconnect
    state.lobby.disconnect(&identity_id);

    info!(identity_id = %identity_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    identity_id: Uuid,
    lobby: &Arc<Lobby>,
    rate_limiter: ConnectionRateLimiter,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    // Spawn writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(identity_id = %identity_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> lobby
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_frame() {
                    warn!(identity_id = %identity_id, "Rate limited inbound frame");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => dispatch(lobby, identity_id, client_msg),
                    Err(e) => {
                        warn!(identity_id = %identity_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(identity_id = %identity_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(identity_id = %identity_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(identity_id = %identity_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Route one inbound message to the lobby.
///
/// Rejected requests are logged and dropped; the client is never told.
pub fn dispatch(lobby: &Arc<Lobby>, identity_id: Uuid, msg: ClientMsg) {
    let result = match msg {
        ClientMsg::Register { name } => lobby.register(&identity_id, name),
        ClientMsg::RequestMatch => lobby.request_match(&identity_id),
        ClientMsg::SubmitInput(input) => lobby.submit_input(&identity_id, input),
        ClientMsg::RestartMatch => lobby.restart(&identity_id),
        ClientMsg::ChatMessage { text } => lobby.chat(&identity_id, text),
    };

    if let Err(e) = result {
        debug!(identity_id = %identity_id, error = %e, "Ignoring out-of-context message");
    }
}

/// Outbound WebSocket failures
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Socket write failed: {0}")]
    Socket(#[from] axum::Error),
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), SendError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
