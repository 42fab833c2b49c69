use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::content::{Card, LookupHit, LookupKind};
use crate::error::GameError;
use crate::room::{Move, Phase};
use crate::settings::GameSettings;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardUpdateMode {
    /// Discard any cached hand and take this one as the truth.
    Replace,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub mode: CardUpdateMode,
    pub top: Vec<Card>,
    pub bottom: Vec<Card>,
}

/// One presentation slot as a particular viewer sees it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlayView {
    pub top: Option<Card>,
    pub bottom: Option<Card>,
    /// Author name, only for viewers entitled to it.
    pub player: Option<String>,
    /// Vote count, only once votes are tallied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<usize>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub phase: Phase,
    pub round: u32,
    pub visual: Option<String>,
    pub judge: Option<usize>,
    /// Length of the running phase timer in seconds, if any.
    pub timer: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub played: Vec<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plays: Vec<PlayView>,
    pub points: Vec<u32>,
    /// Points each seat earned this round, once votes are tallied.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gained: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_play: Option<Move>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub your_votes: Vec<usize>,
    pub finished: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub player: String,
    pub points: u32,
    pub rank: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RoomDetails {
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub players: Vec<String>,
    pub creator: String,
    pub settings: GameSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<GameStateView>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RejoinDetails {
    #[serde(flatten)]
    pub details: RoomDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_update: Option<CardUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_state: Option<Move>,
}

/// A state delta plus a human-readable summary of what changed.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdate {
    pub update: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<GameSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<GameStateView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_update: Option<CardUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_state: Option<Move>,
}

impl RoomUpdate {
    pub fn new(update: impl Into<String>) -> Self {
        Self {
            update: update.into(),
            ..Default::default()
        }
    }

    pub fn with_players(mut self, players: Vec<String>) -> Self {
        self.players = Some(players);
        self
    }

    pub fn with_creator(mut self, creator: String) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_settings(mut self, settings: GameSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_state(mut self, state: Option<GameStateView>) -> Self {
        self.state = state;
        self
    }

    pub fn with_cards(mut self, card_update: Option<CardUpdate>) -> Self {
        self.card_update = card_update;
        self
    }

    pub fn with_move(mut self, accepted: Move) -> Self {
        self.move_state = Some(accepted);
        self
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerToClient {
    #[serde(rename = "ASSIGN_UUID")]
    AssignUuid {
        #[serde(rename = "userID")]
        user_id: Uuid,
        #[serde(rename = "visualCDN")]
        visual_cdn: String,
    },
    #[serde(rename = "CREATE_ROOM")]
    CreateRoom(RoomDetails),
    #[serde(rename = "JOIN_ROOM")]
    JoinRoom(RoomDetails),
    #[serde(rename = "REJOIN_ROOM")]
    RejoinRoom(RejoinDetails),
    #[serde(rename = "UPDATE_ROOM")]
    UpdateRoom(RoomUpdate),
    #[serde(rename = "END_GAME")]
    EndGame {
        state: GameStateView,
        standings: Vec<Standing>,
    },
    #[serde(rename = "END_STANDINGS")]
    EndStandings {},
    #[serde(rename = "LOOKUP")]
    Lookup {
        #[serde(rename = "elementType")]
        element_type: LookupKind,
        data: Option<LookupHit>,
    },
    #[serde(rename = "ERROR")]
    Error {
        error: String,
        code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    #[serde(rename = "KEEP_ALIVE_ACK")]
    KeepAliveAck {},
}

impl ServerToClient {
    // Simple, safe JSON conversion - no unwrapping!
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"ERROR","error":"Serialization failed","code":"INTERNAL"}"#.to_string()
        })
    }

    pub fn error(err: &GameError) -> Self {
        Self::Error {
            error: err.to_string(),
            code: err.code().to_string(),
            data: err.data(),
        }
    }

    pub fn update(update: RoomUpdate) -> Self {
        Self::UpdateRoom(update)
    }

    pub fn notice(update: impl Into<String>) -> Self {
        Self::UpdateRoom(RoomUpdate::new(update))
    }
}
