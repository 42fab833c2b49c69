use serde::Deserialize;
use uuid::Uuid;

use super::RoomAction;
use crate::content::{LookupKind, LookupQuery};
use crate::room::{MoveRequest, Phase, Side};
use crate::settings::GameSettings;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientToServer {
    // Connection
    #[serde(rename = "KEEP_ALIVE")]
    KeepAlive {},
    #[serde(rename = "ASSIGN_UUID")]
    AssignUuid {
        #[serde(rename = "userID", default)]
        user_id: Option<Uuid>,
        #[serde(rename = "roomID", default)]
        room_id: Option<String>,
    },
    #[serde(rename = "LOOKUP")]
    Lookup {
        #[serde(rename = "elementType")]
        element_type: LookupKind,
        #[serde(default)]
        data: LookupQuery,
    },

    // Room lifecycle
    #[serde(rename = "CREATE_ROOM")]
    CreateRoom {
        #[serde(rename = "userID")]
        user_id: Uuid,
        username: String,
        #[serde(rename = "roomID", default)]
        room_id: Option<String>,
    },
    #[serde(rename = "JOIN_ROOM")]
    JoinRoom {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
        username: String,
    },
    #[serde(rename = "REARRANGE_PLAYERS")]
    RearrangePlayers {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
        players: Vec<String>,
    },
    #[serde(rename = "UPDATE_SETTINGS")]
    UpdateSettings {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
        settings: GameSettings,
    },
    #[serde(rename = "END_STANDINGS")]
    EndStandings {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
    },

    // Round
    #[serde(rename = "BEGIN")]
    Begin {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
    },
    #[serde(rename = "MAKE_MOVE")]
    MakeMove {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
        #[serde(rename = "move")]
        play: MoveRequest,
    },
    #[serde(rename = "DISCARD")]
    Discard {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
        side: Side,
        #[serde(rename = "cardId")]
        card_id: i64,
    },
    #[serde(rename = "VOTE")]
    Vote {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
        #[serde(rename = "playIndex")]
        play_index: usize,
        #[serde(rename = "voteState")]
        vote_state: bool,
    },
    #[serde(rename = "DONE_VOTING")]
    DoneVoting {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
    },
    #[serde(rename = "FORCE_SKIP")]
    ForceSkip {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "roomID")]
        room_id: String,
        phase: Phase,
    },

    // Operators only
    #[serde(rename = "ADMIN_COMMAND")]
    AdminCommand {
        #[serde(rename = "roomID")]
        room_id: String,
        #[serde(rename = "adminKey")]
        admin_key: String,
        command: AdminCommand,
        #[serde(default)]
        update: Option<String>,
    },
}

/// The closed set of operator overrides.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AdminCommand {
    /// Act as if the pending phase timer fired now.
    ExpireTimer,
    /// Expire phases until the round reaches `phase`.
    ForcePhase { phase: Phase },
    /// Broadcast the accompanying `update` text.
    Announce,
}

/// A request aimed at one room on behalf of one seated identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRequest {
    pub room_id: String,
    pub user_id: Uuid,
    pub action: RoomAction,
}

impl ClientToServer {
    /// Splits off requests that are resolved entirely inside one room.
    pub fn into_room_request(self) -> Result<RoomRequest, Self> {
        let (room_id, user_id, action) = match self {
            ClientToServer::RearrangePlayers {
                user_id,
                room_id,
                players,
            } => (room_id, user_id, RoomAction::Rearrange { players }),
            ClientToServer::UpdateSettings {
                user_id,
                room_id,
                settings,
            } => (room_id, user_id, RoomAction::UpdateSettings { settings }),
            ClientToServer::EndStandings { user_id, room_id } => {
                (room_id, user_id, RoomAction::EndStandings)
            }
            ClientToServer::Begin { user_id, room_id } => (room_id, user_id, RoomAction::Begin),
            ClientToServer::MakeMove {
                user_id,
                room_id,
                play,
            } => (room_id, user_id, RoomAction::MakeMove { play }),
            ClientToServer::Discard {
                user_id,
                room_id,
                side,
                card_id,
            } => (room_id, user_id, RoomAction::Discard { side, card_id }),
            ClientToServer::Vote {
                user_id,
                room_id,
                play_index,
                vote_state,
            } => (
                room_id,
                user_id,
                RoomAction::Vote {
                    play_index,
                    vote_state,
                },
            ),
            ClientToServer::DoneVoting { user_id, room_id } => {
                (room_id, user_id, RoomAction::DoneVoting)
            }
            ClientToServer::ForceSkip {
                user_id,
                room_id,
                phase,
            } => (room_id, user_id, RoomAction::ForceSkip { phase }),
            other => return Err(other),
        };
        Ok(RoomRequest {
            room_id,
            user_id,
            action,
        })
    }
}
