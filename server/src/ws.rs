use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pong_shared::protocol::{
    PlayerAssignedMsg, RoomAssignedMsg, ServerMsg, WelcomeMsg, PROTOCOL_VERSION,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::error::GameError;
use crate::protocol::{encode, parse_client_msg, Action, Peer};
use crate::registry::{Membership, SessionRegistry};
use crate::room::{Outbound, RoomCommand};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub connection_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));
        Self {
            registry: SessionRegistry::new(config),
            connection_semaphore,
        }
    }
}

/// `/ws`, `/health` and the CORS policy from the config.
pub fn router(app_state: AppState) -> Router {
    let cors = match &app_state.registry.config().allowed_origin {
        None => CorsLayer::permissive(),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(origin) => CorsLayer::new().allow_origin(origin),
            Err(_) => {
                tracing::warn!("Ignoring unusable CORS origin {:?}", origin);
                CorsLayer::new()
            }
        },
    };
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(app_state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let permit = match app_state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Rejecting connection: connection limit reached");
            return (StatusCode::SERVICE_UNAVAILABLE, "server is full").into_response();
        }
    };
    ws.on_upgrade(move |socket| async move {
        handle_socket(socket, app_state).await;
        drop(permit);
    })
}

type Sink = SplitSink<WebSocket, Message>;

async fn send_msg(sink: &mut Sink, msg: &ServerMsg) -> bool {
    match encode(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode {:?}: {}", msg, e);
            true
        }
    }
}

/// Next frame from the room, or never while the connection is in the lobby.
async fn recv_room(membership: &mut Option<Membership>) -> Result<Outbound, RecvError> {
    match membership {
        Some(m) => m.rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let registry = app_state.registry;

    let mut peer = Peer::new(registry.next_player_id());
    let my_id = peer.player_id;
    let mut membership: Option<Membership> = None;

    tracing::info!("Player {} connected", my_id);

    let welcome = ServerMsg::Welcome(WelcomeMsg {
        protocol_version: PROTOCOL_VERSION,
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        player_id: my_id,
        config: registry.config().physics,
    });
    if !send_msg(&mut sink, &welcome).await {
        return;
    }

    loop {
        let keep_open = tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let replies = dispatch(&text, &mut peer, &mut membership, &registry).await;
                        let mut sent = true;
                        for reply in &replies {
                            if !send_msg(&mut sink, reply).await {
                                sent = false;
                                break;
                            }
                        }
                        sent
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let err = GameError::Protocol("binary frames are not supported".to_string());
                        send_msg(&mut sink, &err.to_msg()).await
                    }
                    Some(Ok(Message::Close(_))) | None => false,
                    Some(Err(e)) => {
                        tracing::debug!("Player {} socket error: {}", my_id, e);
                        false
                    }
                    _ => true, // ping/pong
                }
            }

            // Server -> Client (room broadcast)
            result = recv_room(&mut membership) => {
                match result {
                    Ok(Outbound::All(msg)) => {
                        if matches!(msg, ServerMsg::RoomClosed(_)) {
                            membership = None;
                            peer.unbind();
                        }
                        send_msg(&mut sink, &msg).await
                    }
                    Ok(Outbound::To(player_id, msg)) if player_id == my_id => {
                        send_msg(&mut sink, &msg).await
                    }
                    Ok(Outbound::To(..)) => true,
                    Err(RecvError::Lagged(n)) => {
                        // game_state is a full snapshot, the next one catches us up
                        tracing::warn!("Player {} lagged by {} messages", my_id, n);
                        true
                    }
                    Err(RecvError::Closed) => {
                        membership = None;
                        peer.unbind();
                        true
                    }
                }
            }
        };
        if !keep_open {
            break;
        }
    }

    // Cleanup on disconnect
    if let Some(m) = membership {
        let _ = m.room.send(RoomCommand::Leave { player_id: my_id }).await;
    }
    tracing::info!("Player {} disconnected", my_id);
}

/// Handle one text frame. Returns the direct replies for this connection;
/// room traffic arrives through the broadcast subscription.
async fn dispatch(
    text: &str,
    peer: &mut Peer,
    membership: &mut Option<Membership>,
    registry: &SessionRegistry,
) -> Vec<ServerMsg> {
    let action = match parse_client_msg(text).and_then(|msg| peer.route(msg)) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!("Player {}: {}", peer.player_id, e);
            return vec![e.to_msg()];
        }
    };

    match action {
        Action::CreateRoom => {
            let joined = match registry.create_room() {
                Ok(handle) => registry.join(handle, peer.player_id).await,
                Err(e) => Err(e),
            };
            match joined {
                Ok(m) => {
                    let replies = assigned(peer, &m, ServerMsg::RoomCreated);
                    *membership = Some(m);
                    replies
                }
                Err(e) => vec![e.to_msg()],
            }
        }
        Action::JoinRoom(code) => match registry.join_room(&code, peer.player_id).await {
            Ok(m) => {
                let replies = assigned(peer, &m, ServerMsg::RoomJoined);
                *membership = Some(m);
                replies
            }
            Err(e @ GameError::RoomFull) => vec![
                e.to_msg(),
                ServerMsg::PlayerAssigned(PlayerAssignedMsg { side: None }),
            ],
            Err(e) => {
                tracing::debug!("Player {} could not join {}: {}", peer.player_id, code, e);
                vec![e.to_msg()]
            }
        },
        Action::Room(cmd) => {
            let Some(m) = membership.as_ref() else {
                return vec![GameError::InvalidState("not in a room".to_string()).to_msg()];
            };
            let sent = m.room.send(cmd).await;
            match sent {
                Ok(()) => Vec::new(),
                Err(e) => {
                    *membership = None;
                    peer.unbind();
                    vec![e.to_msg()]
                }
            }
        }
    }
}

fn assigned(
    peer: &mut Peer,
    m: &Membership,
    wrap: fn(RoomAssignedMsg) -> ServerMsg,
) -> Vec<ServerMsg> {
    let code = m.room.code().to_string();
    peer.bind(code.clone(), m.side);
    tracing::info!("Player {} is {} in room {}", peer.player_id, m.side, code);
    vec![
        wrap(RoomAssignedMsg {
            room_code: code,
            player_id: peer.player_id,
            side: m.side,
        }),
        ServerMsg::PlayerAssigned(PlayerAssignedMsg { side: Some(m.side) }),
    ]
}
