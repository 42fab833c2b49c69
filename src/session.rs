use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Durable client identities and the room each one last held a seat in.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    issued: HashSet<Uuid>,
    rooms: HashMap<Uuid, String>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `existing` unchanged if given, otherwise a fresh identity.
    pub fn assign(&mut self, existing: Option<Uuid>) -> Uuid {
        let identity = existing.unwrap_or_else(|| loop {
            let candidate = Uuid::new_v4();
            if !self.issued.contains(&candidate) {
                break candidate;
            }
        });
        self.issued.insert(identity);
        identity
    }

    pub fn is_issued(&self, identity: Uuid) -> bool {
        self.issued.contains(&identity)
    }

    pub fn seat(&mut self, identity: Uuid, code: &str) {
        self.issued.insert(identity);
        self.rooms.insert(identity, code.to_string());
    }

    pub fn room_of(&self, identity: Uuid) -> Option<&str> {
        self.rooms.get(&identity).map(String::as_str)
    }

    /// Forgets the identity's seat in `code`, leaving any later room alone.
    pub fn release(&mut self, identity: Uuid, code: &str) {
        if self.room_of(identity) == Some(code) {
            self.rooms.remove(&identity);
        }
    }

    /// Drops every seat mapping into a dismissed room.
    pub fn forget_room(&mut self, code: &str) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, room| room != code);
        before - self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_is_idempotent() {
        let mut sessions = SessionDirectory::new();
        let fresh = sessions.assign(None);
        assert!(sessions.is_issued(fresh));
        assert_eq!(sessions.assign(Some(fresh)), fresh);
        assert_ne!(sessions.assign(None), fresh);

        let supplied = Uuid::new_v4();
        assert_eq!(sessions.assign(Some(supplied)), supplied);
        assert!(sessions.is_issued(supplied));
    }

    #[test]
    fn test_release_only_clears_the_named_room() {
        let mut sessions = SessionDirectory::new();
        let identity = sessions.assign(None);
        sessions.seat(identity, "ONE");
        sessions.release(identity, "TWO");
        assert_eq!(sessions.room_of(identity), Some("ONE"));
        sessions.release(identity, "ONE");
        assert_eq!(sessions.room_of(identity), None);
        assert!(sessions.is_issued(identity));
    }

    #[test]
    fn test_forget_room_clears_only_that_room() {
        let mut sessions = SessionDirectory::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        sessions.seat(a, "ONE");
        sessions.seat(b, "ONE");
        sessions.seat(c, "TWO");

        assert_eq!(sessions.forget_room("ONE"), 2);
        assert_eq!(sessions.room_of(a), None);
        assert_eq!(sessions.room_of(c), Some("TWO"));
        assert!(sessions.is_issued(a));
    }
}
