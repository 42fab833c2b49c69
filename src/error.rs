use serde_json::{Value, json};

use crate::room::Phase;

/// Every recoverable failure a request can hit. Errors are reported only to
/// the connection that sent the offending request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room {0} already exists")]
    RoomExists(String),
    #[error("Name {0} is already taken in this room")]
    NameTaken(String),
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    RoundInProgress,
    #[error("Game not in progress")]
    NoRoundInProgress,
    #[error("Invalid player list")]
    InvalidPlayerList { expected: Vec<String> },
    #[error("Only the room creator can do that")]
    UnauthorizedAction,
    #[error("Cannot do that when it is not your turn")]
    NotYourTurn,
    #[error("You have already played this round")]
    AlreadyPlayed,
    #[error("That card is not in your hand")]
    CardNotInHand,
    #[error("A blank card needs some text")]
    BlankTextRequired,
    #[error("A {0} card is required")]
    SideRequired(&'static str),
    #[error("You cannot vote for that play")]
    SelfVoteForbidden,
    #[error("Not allowed during the {actual} phase")]
    WrongPhase { actual: Phase },
    #[error("Invalid message: {0}")]
    MalformedMessage(String),
    #[error("You are not part of this room")]
    PlayerNotInRoom,
    #[error("At least {0} players are needed to begin")]
    NotEnoughPlayers(usize),
    #[error("No discards left this round")]
    NoDiscardsLeft,
    #[error("There is no play {0}")]
    InvalidVote(usize),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Card content is unavailable")]
    ContentUnavailable,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::RoomExists(_) => "ROOM_EXISTS",
            GameError::NameTaken(_) => "NAME_TAKEN",
            GameError::RoomFull => "ROOM_FULL",
            GameError::RoundInProgress => "ROUND_IN_PROGRESS",
            GameError::NoRoundInProgress => "NO_ROUND_IN_PROGRESS",
            GameError::InvalidPlayerList { .. } => "INVALID_PLAYER_LIST",
            GameError::UnauthorizedAction => "UNAUTHORIZED_ACTION",
            GameError::NotYourTurn => "NOT_YOUR_TURN",
            GameError::AlreadyPlayed => "ALREADY_PLAYED",
            GameError::CardNotInHand => "CARD_NOT_IN_HAND",
            GameError::BlankTextRequired => "BLANK_TEXT_REQUIRED",
            GameError::SideRequired(_) => "SIDE_REQUIRED",
            GameError::SelfVoteForbidden => "SELF_VOTE_FORBIDDEN",
            GameError::WrongPhase { .. } => "WRONG_PHASE",
            GameError::MalformedMessage(_) => "MALFORMED_MESSAGE",
            GameError::PlayerNotInRoom => "PLAYER_NOT_IN_ROOM",
            GameError::NotEnoughPlayers(_) => "NOT_ENOUGH_PLAYERS",
            GameError::NoDiscardsLeft => "NO_DISCARDS_LEFT",
            GameError::InvalidVote(_) => "INVALID_VOTE",
            GameError::InvalidSettings(_) => "INVALID_SETTINGS",
            GameError::ContentUnavailable => "CONTENT_UNAVAILABLE",
            GameError::Internal(_) => "INTERNAL",
        }
    }

    /// Optional payload for clients that want to react programmatically.
    pub fn data(&self) -> Option<Value> {
        match self {
            GameError::InvalidPlayerList { expected } => Some(json!({ "players": expected })),
            GameError::WrongPhase { actual } => Some(json!({ "phase": actual })),
            GameError::SideRequired(side) => Some(json!({ "side": side })),
            GameError::NotEnoughPlayers(min) => Some(json!({ "min": min })),
            _ => None,
        }
    }

    pub fn wrong_phase(actual: Phase) -> Self {
        GameError::WrongPhase { actual }
    }
}
