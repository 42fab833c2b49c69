use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::content::ContentCache;
use crate::error::GameError;
use crate::messages::{ClientToServer, CoordinatorMessage, RoomMessage, ServerToClient};

/// Handle to one client's outbound queue. Seats hold a clone; once the
/// client task ends the queue closes and the seat reads as disconnected.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    tx: mpsc::UnboundedSender<Arc<ServerToClient>>,
}

impl Connection {
    pub fn new(tx: mpsc::UnboundedSender<Arc<ServerToClient>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn same_as(&self, other: &Connection) -> bool {
        self.id == other.id
    }

    // Fire and forget: a closed queue only means that client is gone.
    pub fn send_shared(&self, message: Arc<ServerToClient>) {
        let _ = self.tx.send(message);
    }

    pub fn send(&self, message: ServerToClient) {
        self.send_shared(Arc::new(message));
    }

    pub fn send_error(&self, err: &GameError) {
        self.send(ServerToClient::error(err));
    }
}

/// Reads newline-delimited JSON requests from one socket until it closes.
pub async fn handle_client(
    socket_reader: OwnedReadHalf,
    socket_writer: OwnedWriteHalf,
    addr: SocketAddr,
    coordinator_tx: mpsc::UnboundedSender<CoordinatorMessage>,
    content: Arc<ContentCache>,
) {
    let (writer_tx, writer_rx) = mpsc::unbounded_channel::<Arc<ServerToClient>>();
    let connection = Connection::new(writer_tx);

    info!("Client {} connected from {}", connection.id(), addr);

    let write_task = tokio::spawn(handle_client_writer(socket_writer, writer_rx));

    let mut reader = tokio::io::BufReader::new(socket_reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("Client {} disconnected", connection.id());
                break;
            }
            Ok(_) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ClientToServer>(&line) {
                    Ok(request) => {
                        if let Err(e) =
                            handle_client_request(request, &connection, &coordinator_tx, &content)
                                .await
                        {
                            error!("Error handling request for client {}: {}", connection.id(), e);
                            connection.send_error(&GameError::Internal(e.to_string()));
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse request from {}: {}", addr, e);
                        connection.send_error(&GameError::MalformedMessage(e.to_string()));
                    }
                }
            }
            Err(e) => {
                error!("Client {} read error: {}", addr, e);
                break;
            }
        }
    }

    // Dropping the last sender closes the queue; seats see the disconnect.
    drop(connection);
    write_task.abort();

    debug!("Client {} cleanup complete", addr);
}

/// Handle writing messages to the client socket
async fn handle_client_writer(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Arc<ServerToClient>>,
) {
    while let Some(message) = rx.recv().await {
        let message_with_newline = format!("{}\n", message.to_json());
        if let Err(e) = writer.write_all(message_with_newline.as_bytes()).await {
            error!("Failed to write to client: {}", e);
            break;
        }
    }
}

/// Answers connection-level requests directly and routes the rest.
async fn handle_client_request(
    request: ClientToServer,
    connection: &Connection,
    coordinator_tx: &mpsc::UnboundedSender<CoordinatorMessage>,
    content: &ContentCache,
) -> anyhow::Result<()> {
    let message = match request {
        ClientToServer::KeepAlive {} => {
            connection.send(ServerToClient::KeepAliveAck {});
            return Ok(());
        }
        ClientToServer::Lookup { element_type, data } => {
            let hit = content.lookup(element_type, &data).await;
            connection.send(ServerToClient::Lookup {
                element_type,
                data: hit,
            });
            return Ok(());
        }
        ClientToServer::AssignUuid { user_id, room_id } => CoordinatorMessage::AssignIdentity {
            existing: user_id,
            room_code: room_id,
            connection: connection.clone(),
        },
        ClientToServer::CreateRoom {
            user_id,
            username,
            room_id,
        } => CoordinatorMessage::CreateRoom {
            identity: user_id,
            name: username,
            preferred_code: room_id,
            connection: connection.clone(),
        },
        ClientToServer::JoinRoom {
            user_id,
            room_id,
            username,
        } => CoordinatorMessage::JoinRoom {
            code: room_id,
            identity: user_id,
            name: username,
            connection: connection.clone(),
        },
        ClientToServer::AdminCommand {
            room_id,
            admin_key,
            command,
            update,
        } => CoordinatorMessage::Forward {
            code: room_id,
            message: RoomMessage::Admin {
                admin_key,
                command,
                update,
                connection: connection.clone(),
            },
            reply: connection.clone(),
        },
        other => match other.into_room_request() {
            Ok(request) => CoordinatorMessage::Forward {
                code: request.room_id,
                message: RoomMessage::Action {
                    identity: request.user_id,
                    connection: connection.clone(),
                    action: request.action,
                },
                reply: connection.clone(),
            },
            Err(unrouted) => anyhow::bail!("no route for {:?}", unrouted),
        },
    };
    coordinator_tx
        .send(message)
        .map_err(|_| anyhow::anyhow!("coordinator is gone"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{drain, sample_content, test_connection};

    #[tokio::test]
    async fn test_keep_alive_and_lookup_answer_directly() {
        let (coordinator_tx, mut coordinator_rx) = mpsc::unbounded_channel();
        let content = ContentCache::fixed(sample_content(3, 3, 2));
        let (connection, mut inbox) = test_connection();

        handle_client_request(ClientToServer::KeepAlive {}, &connection, &coordinator_tx, &content)
            .await
            .unwrap();
        let request: ClientToServer =
            serde_json::from_str(r#"{"type":"LOOKUP","elementType":"visual","data":{"id":2}}"#)
                .unwrap();
        handle_client_request(request, &connection, &coordinator_tx, &content)
            .await
            .unwrap();

        let received = drain(&mut inbox);
        assert_eq!(*received[0], ServerToClient::KeepAliveAck {});
        let json: serde_json::Value = serde_json::from_str(&received[1].to_json()).unwrap();
        assert_eq!(json["data"]["filename"], "visual-2.png");
        assert!(coordinator_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_room_requests_are_forwarded() {
        let (coordinator_tx, mut coordinator_rx) = mpsc::unbounded_channel();
        let content = ContentCache::fixed(sample_content(1, 1, 1));
        let (connection, _inbox) = test_connection();

        let raw = r#"{"type":"BEGIN","userID":"6f9619ff-8b86-d011-b42d-00cf4fc964ff","roomID":"abcde"}"#;
        let request: ClientToServer = serde_json::from_str(raw).unwrap();
        handle_client_request(request, &connection, &coordinator_tx, &content)
            .await
            .unwrap();

        let Ok(CoordinatorMessage::Forward { code, message, .. }) = coordinator_rx.try_recv() else {
            panic!("expected a forwarded request");
        };
        assert_eq!(code, "abcde");
        assert!(matches!(message, RoomMessage::Action { .. }));
    }

    #[test]
    fn test_connection_reports_closed_queue() {
        let (connection, inbox) = test_connection();
        assert!(connection.is_open());
        drop(inbox);
        assert!(!connection.is_open());
        connection.send(ServerToClient::KeepAliveAck {});
    }
}
