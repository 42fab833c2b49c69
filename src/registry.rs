use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::error::GameError;
use crate::messages::RoomMessage;
use crate::utils::generate_room_code;

const MAX_CODE_LEN: usize = 12;

/// Live rooms by code. Codes are case-insensitive and stored upper-case.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, mpsc::UnboundedSender<RoomMessage>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize_code(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    /// Picks the code for a new room: the caller's choice if it is free,
    /// otherwise a random one regenerated until it does not collide.
    pub fn allocate_code(&self, preferred: Option<&str>) -> Result<String, GameError> {
        let preferred = preferred.map(Self::normalize_code).filter(|c| !c.is_empty());
        if let Some(code) = preferred {
            if code.len() > MAX_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(GameError::MalformedMessage(format!(
                    "room codes are up to {MAX_CODE_LEN} letters and digits"
                )));
            }
            if self.rooms.contains_key(&code) {
                return Err(GameError::RoomExists(code));
            }
            return Ok(code);
        }

        let mut rng = rand::rng();
        loop {
            let code = generate_room_code(&mut rng);
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
    }

    pub fn insert(&mut self, code: String, room_tx: mpsc::UnboundedSender<RoomMessage>) {
        self.rooms.insert(code, room_tx);
    }

    pub fn get(&self, code: &str) -> Option<&mpsc::UnboundedSender<RoomMessage>> {
        self.rooms.get(&Self::normalize_code(code))
    }

    pub fn dismiss(&mut self, code: &str) -> bool {
        self.rooms.remove(&Self::normalize_code(code)).is_some()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}
