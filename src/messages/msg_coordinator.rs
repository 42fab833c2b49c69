use uuid::Uuid;

use super::RoomMessage;
use crate::client::Connection;

#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Issue (or confirm) a durable identity, optionally rejoining a room.
    AssignIdentity {
        existing: Option<Uuid>,
        room_code: Option<String>,
        connection: Connection,
    },
    /// A client wants to create a new room
    CreateRoom {
        identity: Uuid,
        name: String,
        preferred_code: Option<String>,
        connection: Connection,
    },
    /// A client wants to join an existing room
    JoinRoom {
        code: String,
        identity: Uuid,
        name: String,
        connection: Connection,
    },
    /// Route a message to a room's task; `reply` hears about a missing room.
    Forward {
        code: String,
        message: RoomMessage,
        reply: Connection,
    },
    /// Sent by a room task once an identity holds a seat there.
    PlayerSeated { identity: Uuid, code: String },
    /// Sent by a room task when another client took this identity's seat.
    SeatReleased { identity: Uuid, code: String },
    /// Sent by a room task as it exits.
    RoomShutdown { code: String },
}
