use std::sync::Arc;

use super::room::Player;
use crate::messages::ServerToClient;

/// Sends to the seats of one room. Disconnected seats are skipped and a
/// failed send never stops delivery to the rest.
pub struct RoomBroadcaster<'a> {
    players: &'a [Player],
}

impl<'a> RoomBroadcaster<'a> {
    pub fn new(players: &'a [Player]) -> Self {
        Self { players }
    }

    pub fn send_to(&self, seat: usize, response: ServerToClient) {
        if let Some(connection) = self.players.get(seat).and_then(|p| p.connection.as_ref()) {
            connection.send(response);
        }
    }

    // Single broadcast implementation with filter
    fn broadcast_to_filtered<F>(&self, response: ServerToClient, filter: F)
    where
        F: Fn(usize) -> bool,
    {
        let message = Arc::new(response);
        for (seat, player) in self.players.iter().enumerate() {
            if let Some(connection) = player.connection.as_ref().filter(|_| filter(seat)) {
                connection.send_shared(message.clone());
            }
        }
    }

    pub fn broadcast(&self, response: ServerToClient) {
        self.broadcast_to_filtered(response, |_| true);
    }

    pub fn broadcast_except(&self, except: usize, response: ServerToClient) {
        self.broadcast_to_filtered(response, |seat| seat != except);
    }

    /// One message per seat, for content that differs by viewer.
    pub fn broadcast_each<F>(&self, build: F)
    where
        F: Fn(usize) -> ServerToClient,
    {
        for (seat, player) in self.players.iter().enumerate() {
            if let Some(connection) = player.connection.as_ref().filter(|c| c.is_open()) {
                connection.send(build(seat));
            }
        }
    }
}
