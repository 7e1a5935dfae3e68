//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::table::MatchTable;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All matches by id. Created lazily on first join; a match, once
    /// created, lives for the lifetime of the process.
    pub tables: DashMap<String, MatchTable>,
    /// Which match each session is subscribed to
    pub session_tables: DashMap<Uuid, String>,
    /// Mapping from session ID to its message sender
    pub session_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            session_tables: DashMap::new(),
            session_senders: DashMap::new(),
        }
    }

    /// Send a message to a specific session.
    pub fn send_to_session(&self, session_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.session_senders.get(&session_id) {
            let _ = sender.send(msg);
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Tavla server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a session ID
    let session_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.session_senders.insert(session_id, tx);

    // Send welcome message
    let welcome = ServerMessage::Welcome { session_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_message(session_id, client_msg, &state);
                } else {
                    warn!("Invalid message from {}: {}", session_id, text);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", session_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_session(session_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", session_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    handle_disconnect(session_id, &state);
    state.session_senders.remove(&session_id);
    send_task.abort();

    info!("Connection closed for {}", session_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(session_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::JoinMatch {
            match_id,
            role,
            options,
        } => {
            // Re-joining moves the session to the new match.
            if let Some((_, previous)) = state.session_tables.remove(&session_id) {
                if let Some(mut table) = state.tables.get_mut(&previous) {
                    table.unsubscribe(session_id);
                }
            }

            let sender = match state.session_senders.get(&session_id) {
                Some(sender) => sender.clone(),
                None => return,
            };

            // Options only matter when this join creates the match.
            let mut table = state.tables.entry(match_id.clone()).or_insert_with(|| {
                info!("Creating match {}", match_id);
                MatchTable::new(match_id.clone(), options.unwrap_or_default())
            });

            match table.subscribe(session_id, sender, role) {
                Ok(()) => {
                    drop(table);
                    state.session_tables.insert(session_id, match_id);
                }
                Err(e) => {
                    drop(table);
                    state.send_to_session(
                        session_id,
                        ServerMessage::Error {
                            code: 409,
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        ClientMessage::Ping => {
            state.send_to_session(session_id, ServerMessage::Pong);
        }

        other => {
            let match_id = match state.session_tables.get(&session_id) {
                Some(entry) => entry.value().clone(),
                None => {
                    state.send_to_session(
                        session_id,
                        ServerMessage::Error {
                            code: 400,
                            message: "JoinMatch first".to_string(),
                        },
                    );
                    return;
                }
            };

            if let Some(mut table) = state.tables.get_mut(&match_id) {
                table.dispatch(session_id, other);
            }
        }
    }
}

/// Handle session disconnect: unsubscribe from the joined match, if any.
/// Match state is never rolled back and the match itself is never removed.
fn handle_disconnect(session_id: Uuid, state: &Arc<ServerState>) {
    if let Some((_, match_id)) = state.session_tables.remove(&session_id) {
        if let Some(mut table) = state.tables.get_mut(&match_id) {
            table.unsubscribe(session_id);
            info!(
                "Session {} left match {} ({} subscribers remain)",
                session_id,
                match_id,
                table.subscriber_count()
            );
        }
    }
}
