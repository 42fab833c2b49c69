mod msg_client_to_server;
mod msg_coordinator;
mod msg_server_to_client;

use uuid::Uuid;

use crate::client::Connection;
use crate::room::{MoveRequest, Phase, Side};
use crate::settings::GameSettings;

pub use self::msg_client_to_server::*;
pub use self::msg_coordinator::*;
pub use self::msg_server_to_client::*;

/// Everything a room task reacts to. Player requests and timer expiry share
/// this queue, so one room's state only ever changes one message at a time.
#[derive(Debug)]
pub enum RoomMessage {
    Join {
        identity: Uuid,
        name: String,
        connection: Connection,
    },
    Reattach {
        identity: Uuid,
        connection: Connection,
    },
    Action {
        identity: Uuid,
        connection: Connection,
        action: RoomAction,
    },
    Admin {
        admin_key: String,
        command: AdminCommand,
        update: Option<String>,
        connection: Connection,
    },
    TimerFired {
        epoch: u64,
    },
}

/// Requests that act on a room the sender is seated in.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    Rearrange { players: Vec<String> },
    UpdateSettings { settings: GameSettings },
    Begin,
    MakeMove { play: MoveRequest },
    Discard { side: Side, card_id: i64 },
    Vote { play_index: usize, vote_state: bool },
    DoneVoting,
    ForceSkip { phase: Phase },
    EndStandings,
}

impl RoomAction {
    pub fn name(&self) -> &'static str {
        match self {
            RoomAction::Rearrange { .. } => "rearrange",
            RoomAction::UpdateSettings { .. } => "update-settings",
            RoomAction::Begin => "begin",
            RoomAction::MakeMove { .. } => "make-move",
            RoomAction::Discard { .. } => "discard",
            RoomAction::Vote { .. } => "vote",
            RoomAction::DoneVoting => "done-voting",
            RoomAction::ForceSkip { .. } => "force-skip",
            RoomAction::EndStandings => "end-standings",
        }
    }
}
