use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::content::ContentCache;
use crate::error::GameError;
use crate::messages::{CoordinatorMessage, RoomMessage, ServerToClient};
use crate::registry::RoomRegistry;
use crate::room::room::Room;
use crate::room::handlers::RoomContext;
use crate::room::room_task;
use crate::session::SessionDirectory;

/// Routes clients to room tasks. Owns the room registry and the session
/// directory; rooms report back through `self_tx`.
pub async fn room_coordinator(
    mut rx: mpsc::UnboundedReceiver<CoordinatorMessage>,
    self_tx: mpsc::UnboundedSender<CoordinatorMessage>,
    config: Arc<ServerConfig>,
    content: Arc<ContentCache>,
) {
    let mut registry = RoomRegistry::new();
    let mut sessions = SessionDirectory::new();

    info!("Room coordinator started");

    while let Some(msg) = rx.recv().await {
        match msg {
            CoordinatorMessage::AssignIdentity {
                existing,
                room_code,
                connection,
            } => {
                let identity = sessions.assign(existing);
                connection.send(ServerToClient::AssignUuid {
                    user_id: identity,
                    visual_cdn: config.visual_cdn.clone(),
                });

                let explicit = room_code.is_some();
                let target = room_code.or_else(|| sessions.room_of(identity).map(str::to_string));
                let Some(code) = target else { continue };
                let reattach = RoomMessage::Reattach {
                    identity,
                    connection: connection.clone(),
                };
                if !route(&registry, &code, reattach) {
                    if explicit {
                        connection.send_error(&GameError::RoomNotFound);
                    } else {
                        debug!("Session room {} for {} is gone", code, identity);
                    }
                }
            }

            CoordinatorMessage::CreateRoom {
                identity,
                name,
                preferred_code,
                connection,
            } => {
                adopt(&mut sessions, identity);
                let name = name.trim().to_string();
                if name.is_empty() {
                    connection
                        .send_error(&GameError::MalformedMessage("username must not be empty".into()));
                    continue;
                }
                let code = match registry.allocate_code(preferred_code.as_deref()) {
                    Ok(code) => code,
                    Err(e) => {
                        connection.send_error(&e);
                        continue;
                    }
                };

                let (room_tx, room_rx) = mpsc::unbounded_channel();
                registry.insert(code.clone(), room_tx.clone());
                sessions.seat(identity, &code);
                let ctx = RoomContext::new(
                    room_tx,
                    self_tx.clone(),
                    content.clone(),
                    config.admin_key.clone(),
                    StdRng::from_os_rng(),
                );
                let room = Room::new(code.clone(), identity, name, connection);
                info!("Room {} created by {} ({} live)", code, identity, registry.len());
                tokio::spawn(room_task(room, room_rx, ctx));
            }

            CoordinatorMessage::JoinRoom {
                code,
                identity,
                name,
                connection,
            } => {
                adopt(&mut sessions, identity);
                let join = RoomMessage::Join {
                    identity,
                    name,
                    connection: connection.clone(),
                };
                if !route(&registry, &code, join) {
                    connection.send_error(&GameError::RoomNotFound);
                }
            }

            CoordinatorMessage::Forward {
                code,
                message,
                reply,
            } => {
                if !route(&registry, &code, message) {
                    reply.send_error(&GameError::RoomNotFound);
                }
            }

            CoordinatorMessage::PlayerSeated { identity, code } => {
                sessions.seat(identity, &code);
            }

            CoordinatorMessage::SeatReleased { identity, code } => {
                debug!("Identity {} lost its seat in room {}", identity, code);
                sessions.release(identity, &code);
            }

            CoordinatorMessage::RoomShutdown { code } => {
                registry.dismiss(&code);
                let forgotten = sessions.forget_room(&code);
                info!(
                    "Room {} dismissed ({} seats released, {} live)",
                    code,
                    forgotten,
                    registry.len()
                );
            }
        }
    }

    warn!("Room coordinator stopped");
}

/// False if the room is unknown or its task has already exited.
fn route(registry: &RoomRegistry, code: &str, message: RoomMessage) -> bool {
    match registry.get(code) {
        Some(room_tx) => room_tx.send(message).is_ok(),
        None => false,
    }
}

fn adopt(sessions: &mut SessionDirectory, identity: Uuid) {
    if !sessions.is_issued(identity) {
        debug!("Adopting identity {} issued elsewhere", identity);
        sessions.assign(Some(identity));
    }
}

pub fn spawn_coordinator(
    config: Arc<ServerConfig>,
    content: Arc<ContentCache>,
) -> mpsc::UnboundedSender<CoordinatorMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(room_coordinator(rx, tx.clone(), config, content));
    tx
}
