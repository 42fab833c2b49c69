use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use super::Round;
use crate::client::Connection;
use crate::content::ContentSnapshot;
use crate::error::GameError;
use crate::settings::GameSettings;

#[derive(Debug, Clone)]
pub struct Player {
    pub identity: Uuid,
    pub name: String,
    pub connection: Option<Connection>,
}

impl Player {
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new seat was added at the end of the roster.
    Seated(usize),
    /// The joiner's own identity already held this seat.
    Reattached(usize),
    /// The joiner took the seat of a disconnected player with the same name.
    /// `previous` no longer holds any seat; `creator` is set when creator
    /// rights moved along with the seat.
    TookOver {
        seat: usize,
        previous: Uuid,
        creator: bool,
    },
}

/// Roster, settings and the current round of one room. Seats are never
/// removed, so every per-seat array in the round stays index-aligned.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    players: Vec<Player>,
    creator: Uuid,
    settings: GameSettings,
    pub round: Option<Round>,
}

impl Room {
    pub fn new(code: String, creator: Uuid, name: String, connection: Connection) -> Self {
        Self {
            code,
            players: vec![Player {
                identity: creator,
                name,
                connection: Some(connection),
            }],
            creator,
            settings: GameSettings::default(),
            round: None,
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn creator_name(&self) -> String {
        self.seat_of(self.creator)
            .map(|seat| self.players[seat].name.clone())
            .unwrap_or_default()
    }

    pub fn is_creator(&self, identity: Uuid) -> bool {
        self.creator == identity
    }

    pub fn ensure_creator(&self, identity: Uuid) -> Result<(), GameError> {
        if self.is_creator(identity) {
            Ok(())
        } else {
            Err(GameError::UnauthorizedAction)
        }
    }

    pub fn seat_of(&self, identity: Uuid) -> Option<usize> {
        self.players.iter().position(|p| p.identity == identity)
    }

    pub fn round_in_progress(&self) -> bool {
        self.round.as_ref().is_some_and(|r| !r.is_finished())
    }

    pub fn join(
        &mut self,
        identity: Uuid,
        name: &str,
        connection: Connection,
    ) -> Result<JoinOutcome, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::MalformedMessage("username must not be empty".into()));
        }
        if let Some(seat) = self.seat_of(identity) {
            self.bind_connection(seat, connection);
            return Ok(JoinOutcome::Reattached(seat));
        }
        if let Some(seat) = self.players.iter().position(|p| p.name == name) {
            if self.players[seat].is_connected() {
                return Err(GameError::NameTaken(name.to_string()));
            }
            let player = &mut self.players[seat];
            info!(
                "Room {}: {} takes over the disconnected seat of {}",
                self.code, identity, player.name
            );
            let previous = player.identity;
            let creator = self.creator == previous;
            if creator {
                self.creator = identity;
            }
            player.identity = identity;
            player.connection = Some(connection);
            return Ok(JoinOutcome::TookOver {
                seat,
                previous,
                creator,
            });
        }
        if self.players.len() >= self.settings.max_players {
            return Err(GameError::RoomFull);
        }
        if self.round_in_progress() {
            return Err(GameError::RoundInProgress);
        }

        self.clear_finished_round();
        self.players.push(Player {
            identity,
            name: name.to_string(),
            connection: Some(connection),
        });
        Ok(JoinOutcome::Seated(self.players.len() - 1))
    }

    pub fn reattach(&mut self, identity: Uuid, connection: Connection) -> Result<usize, GameError> {
        let seat = self.seat_of(identity).ok_or(GameError::PlayerNotInRoom)?;
        self.bind_connection(seat, connection);
        Ok(seat)
    }

    /// Points the seat at the connection its latest request came from.
    pub fn bind_connection(&mut self, seat: usize, connection: Connection) {
        if let Some(player) = self.players.get_mut(seat) {
            let stale = player
                .connection
                .as_ref()
                .is_none_or(|current| !current.same_as(&connection));
            if stale {
                debug!("Room {}: seat {} bound to a new connection", self.code, seat);
                player.connection = Some(connection);
            }
        }
    }

    pub fn rearrange(&mut self, requester: Uuid, order: &[String]) -> Result<(), GameError> {
        self.ensure_creator(requester)?;
        if self.round_in_progress() {
            return Err(GameError::RoundInProgress);
        }
        let mut current = self.player_names();
        let mut requested = order.to_vec();
        current.sort();
        requested.sort();
        if current != requested {
            return Err(GameError::InvalidPlayerList {
                expected: self.player_names(),
            });
        }

        let mut reordered = Vec::with_capacity(self.players.len());
        for name in order {
            if let Some(index) = self.players.iter().position(|p| &p.name == name) {
                reordered.push(self.players.swap_remove(index));
            }
        }
        self.players = reordered;
        self.clear_finished_round();
        Ok(())
    }

    pub fn update_settings(&mut self, requester: Uuid, settings: GameSettings) -> Result<(), GameError> {
        self.ensure_creator(requester)?;
        if self.round_in_progress() {
            return Err(GameError::RoundInProgress);
        }
        settings.validate()?;
        if settings.max_players < self.players.len() {
            return Err(GameError::InvalidSettings(format!(
                "the room already has {} players",
                self.players.len()
            )));
        }
        self.settings = settings;
        Ok(())
    }

    /// Starts a fresh game with the current roster and settings. Returns how
    /// many cards the piles could not supply.
    pub fn begin<R: Rng + ?Sized>(
        &mut self,
        requester: Uuid,
        content: &ContentSnapshot,
        rng: &mut R,
    ) -> Result<usize, GameError> {
        self.ensure_creator(requester)?;
        if self.round_in_progress() {
            return Err(GameError::RoundInProgress);
        }
        let (round, shortfall) = Round::new(self.players.len(), self.settings.clone(), content, rng)?;
        self.round = Some(round);
        Ok(shortfall)
    }

    // A finished round only serves its final standings; once the roster
    // changes its seat indexes no longer line up.
    fn clear_finished_round(&mut self) {
        if self.round.as_ref().is_some_and(Round::is_finished) {
            self.round = None;
        }
    }
}
