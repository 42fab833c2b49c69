use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::client::Connection;
use crate::content::{Card, ContentSnapshot, Visual};
use crate::messages::ServerToClient;

pub fn contains_response_of_type<T>(responses: &[Arc<T>], variant: &T) -> bool {
    responses
        .iter()
        .any(|msg| std::mem::discriminant(&**msg) == std::mem::discriminant(variant))
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Top cards get ids 1.., bottom cards 101.., visuals 1...
pub fn sample_content(n_top: usize, n_bottom: usize, n_visuals: usize) -> ContentSnapshot {
    ContentSnapshot {
        top: (1..=n_top)
            .map(|i| Card {
                id: i as i64,
                text: format!("top {i}"),
            })
            .collect(),
        bottom: (1..=n_bottom)
            .map(|i| Card {
                id: 100 + i as i64,
                text: format!("bottom {i}"),
            })
            .collect(),
        visuals: (1..=n_visuals)
            .map(|i| Visual {
                id: i as i64,
                filename: format!("visual-{i}.png"),
            })
            .collect(),
    }
}

pub type Inbox = mpsc::UnboundedReceiver<Arc<ServerToClient>>;

pub fn test_connection() -> (Connection, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Connection::new(tx), rx)
}

/// Everything delivered so far, without waiting.
pub fn drain(inbox: &mut Inbox) -> Vec<Arc<ServerToClient>> {
    let mut received = Vec::new();
    while let Ok(msg) = inbox.try_recv() {
        received.push(msg);
    }
    received
}

pub fn error_codes(responses: &[Arc<ServerToClient>]) -> Vec<String> {
    responses
        .iter()
        .filter_map(|msg| match &**msg {
            ServerToClient::Error { code, .. } => Some(code.clone()),
            _ => None,
        })
        .collect()
}
