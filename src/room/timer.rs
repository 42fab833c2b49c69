use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::messages::RoomMessage;

/// The single pending phase timer of a round.
///
/// Firing does not touch round state directly: the sleeping task posts
/// `RoomMessage::TimerFired` back into the room's queue, so expiry runs
/// through the same serialized path as a player action. Each arm bumps the
/// epoch, which lets the room drop a fire message that was already queued
/// when a manual transition cancelled its timer.
#[derive(Debug, Default)]
pub struct RoundTimer {
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl RoundTimer {
    pub fn arm(&mut self, after: Duration, room_tx: &mpsc::UnboundedSender<RoomMessage>) -> u64 {
        self.cancel();
        let epoch = self.epoch;
        let tx = room_tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(RoomMessage::TimerFired { epoch });
        }));
        epoch
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Accepts a fire message only if it belongs to the timer armed last.
    pub fn take_fired(&mut self, epoch: u64) -> bool {
        if self.handle.is_some() && self.epoch == epoch {
            self.handle = None;
            self.epoch = self.epoch.wrapping_add(1);
            true
        } else {
            false
        }
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
