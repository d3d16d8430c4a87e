//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ConnectionId, GameCommand};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Errors that end a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("simulation is no longer running")]
    SimulationGone,

    #[error("connection writer has stopped")]
    WriterGone,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("websocket send failed: {0}")]
    Socket(#[from] axum::Error),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Subscribe before anything else so no broadcast is missed
    let snapshot_rx = state.game.subscribe();
    let command_tx = state.game.command_tx.clone();

    let reason = run_session(conn_id, ws_sink, ws_stream, command_tx.clone(), snapshot_rx).await;

    // Teardown in the simulation, which also notifies the other clients
    if command_tx
        .send(GameCommand::Disconnect {
            conn_id,
            reason: reason.clone(),
        })
        .await
        .is_err()
    {
        debug!(conn_id = %conn_id, "Simulation gone, skipping teardown");
    }

    info!(conn_id = %conn_id, reason = %reason, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split. Returns the disconnect
/// reason.
async fn run_session(
    conn_id: ConnectionId,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    command_tx: mpsc::Sender<GameCommand>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
) -> String {
    // Replies meant for this client only
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(16);

    // Spawn writer task: direct replies and broadcasts -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(msg) = direct_rx.recv() => msg,
                result = snapshot_rx.recv() => match result {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            conn_id = %conn_id,
                            lagged_count = n,
                            "Client lagged, skipping {} snapshots",
                            n
                        );
                        // Continue - don't disconnect for lag
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(conn_id = %conn_id, "Snapshot channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut reason = "transport close".to_string();

    // Reader loop: WebSocket -> simulation
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_text(conn_id, &text, &command_tx, &direct_tx).await {
                    debug!(conn_id = %conn_id, error = %e, "Dispatch failed");
                    reason = e.to_string();
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(frame)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                if let Some(frame) = frame.filter(|f| !f.reason.is_empty()) {
                    reason = frame.reason.to_string();
                }
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                reason = e.to_string();
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();

    reason
}

/// Decode one text frame and forward it. A frame that does not decode changes
/// nothing and is answered with an error frame to this client only.
async fn handle_text(
    conn_id: ConnectionId,
    text: &str,
    command_tx: &mpsc::Sender<GameCommand>,
    direct_tx: &mpsc::Sender<ServerMsg>,
) -> Result<(), SessionError> {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(client_msg) => dispatch(conn_id, client_msg, command_tx, direct_tx).await,
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
            direct_tx
                .send(ServerMsg::Error {
                    code: "bad_message".to_string(),
                    message: e.to_string(),
                })
                .await
                .map_err(|_| SessionError::WriterGone)
        }
    }
}

/// Forward one decoded client message to the simulation. A join waits for the
/// acknowledgment and queues it for this client.
async fn dispatch(
    conn_id: ConnectionId,
    msg: ClientMsg,
    command_tx: &mpsc::Sender<GameCommand>,
    direct_tx: &mpsc::Sender<ServerMsg>,
) -> Result<(), SessionError> {
    let command = match msg {
        ClientMsg::Join { username } => {
            let (reply, reply_rx) = oneshot::channel();
            command_tx
                .send(GameCommand::Join {
                    conn_id,
                    username,
                    reply,
                })
                .await
                .map_err(|_| SessionError::SimulationGone)?;
            let ack = reply_rx.await.map_err(|_| SessionError::SimulationGone)?;
            return direct_tx
                .send(ack)
                .await
                .map_err(|_| SessionError::WriterGone);
        }
        ClientMsg::KeyPressed { dir } => GameCommand::KeyPressed { conn_id, dir },
        ClientMsg::KeyReleased { dir } => GameCommand::KeyReleased { conn_id, dir },
        ClientMsg::ThrowHook { direction } => GameCommand::ThrowHook { conn_id, direction },
    };

    command_tx
        .send(command)
        .await
        .map_err(|_| SessionError::SimulationGone)
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), SessionError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
