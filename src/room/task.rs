use tokio::sync::mpsc;
use tracing::{debug, info};

use super::handlers::{Flow, RoomContext, RoomHandlers};
use super::room::Room;
use crate::messages::{CoordinatorMessage, RoomMessage};

/// Individual room task. Every change to the room, timer expiry included,
/// runs here one message at a time.
pub async fn room_task(
    mut room: Room,
    mut rx: mpsc::UnboundedReceiver<RoomMessage>,
    mut ctx: RoomContext,
) {
    info!("Room {} started", room.code);
    RoomHandlers::handle_created(&room);

    while let Some(msg) = rx.recv().await {
        let flow = match msg {
            RoomMessage::Join {
                identity,
                name,
                connection,
            } => {
                RoomHandlers::handle_join(&mut room, &ctx, identity, name, connection);
                Flow::Continue
            }
            RoomMessage::Reattach {
                identity,
                connection,
            } => {
                RoomHandlers::handle_reattach(&mut room, identity, connection);
                Flow::Continue
            }
            RoomMessage::Action {
                identity,
                connection,
                action,
            } => RoomHandlers::handle_action(&mut room, &mut ctx, identity, connection, action).await,
            RoomMessage::Admin {
                admin_key,
                command,
                update,
                connection,
            } => {
                RoomHandlers::handle_admin(
                    &mut room,
                    &mut ctx,
                    &admin_key,
                    command,
                    update,
                    &connection,
                );
                Flow::Continue
            }
            RoomMessage::TimerFired { epoch } => {
                RoomHandlers::handle_timer(&mut room, &mut ctx, epoch);
                Flow::Continue
            }
        };
        if flow == Flow::Shutdown {
            break;
        }
    }

    let _ = ctx.coordinator_tx.send(CoordinatorMessage::RoomShutdown {
        code: room.code.clone(),
    });
    debug!("Room {} task ended", room.code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentCache;
    use crate::messages::{RoomAction, ServerToClient};
    use crate::room::Phase;
    use crate::settings::GameSettings;
    use crate::test_utils::{Inbox, drain, sample_content, seeded_rng, test_connection};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn phases(inbox: &mut Inbox) -> Vec<Phase> {
        drain(inbox)
            .iter()
            .filter_map(|msg| match &**msg {
                ServerToClient::UpdateRoom(update) => update.state.as_ref().map(|s| s.phase),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_drive_the_round_and_shutdown_notifies_coordinator() {
        let (room_tx, room_rx) = mpsc::unbounded_channel();
        let (coordinator_tx, mut coordinator_rx) = mpsc::unbounded_channel();
        let ctx = RoomContext::new(
            room_tx.clone(),
            coordinator_tx,
            Arc::new(ContentCache::fixed(sample_content(40, 40, 5))),
            None,
            seeded_rng(3),
        );

        let creator = Uuid::new_v4();
        let (creator_conn, mut creator_inbox) = test_connection();
        let room = Room::new("TIMER".into(), creator, "host".into(), creator_conn.clone());
        tokio::spawn(room_task(room, room_rx, ctx));
        settle().await;
        let greeting = drain(&mut creator_inbox);
        assert!(matches!(&*greeting[0], ServerToClient::CreateRoom(_)));

        let guest = Uuid::new_v4();
        let (guest_conn, mut guest_inbox) = test_connection();
        room_tx
            .send(RoomMessage::Join {
                identity: guest,
                name: "guest".into(),
                connection: guest_conn,
            })
            .unwrap();
        let mut settings = GameSettings {
            hand_size: 3,
            ..GameSettings::default()
        };
        settings.timers.standings_secs = None;
        room_tx
            .send(RoomMessage::Action {
                identity: creator,
                connection: creator_conn.clone(),
                action: RoomAction::UpdateSettings { settings },
            })
            .unwrap();
        room_tx
            .send(RoomMessage::Action {
                identity: creator,
                connection: creator_conn.clone(),
                action: RoomAction::Begin,
            })
            .unwrap();
        settle().await;
        assert_eq!(phases(&mut guest_inbox), vec![Phase::Move]);

        // Nobody plays: the move timer reveals an empty set, which tallies at once.
        tokio::time::sleep(Duration::from_secs(91)).await;
        settle().await;
        assert_eq!(phases(&mut guest_inbox), vec![Phase::Standings]);

        // Standings has no timer, so nothing else happens on its own.
        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert!(phases(&mut guest_inbox).is_empty());

        room_tx
            .send(RoomMessage::Action {
                identity: creator,
                connection: creator_conn.clone(),
                action: RoomAction::ForceSkip {
                    phase: Phase::Standings,
                },
            })
            .unwrap();
        settle().await;
        assert_eq!(phases(&mut guest_inbox), vec![Phase::Move]);
        drain(&mut creator_inbox);

        room_tx
            .send(RoomMessage::Action {
                identity: creator,
                connection: creator_conn.clone(),
                action: RoomAction::EndStandings,
            })
            .unwrap();
        settle().await;
        assert!(matches!(
            coordinator_rx.try_recv(),
            Ok(CoordinatorMessage::PlayerSeated { .. })
        ));
        assert!(coordinator_rx.try_recv().is_err());
        let received = drain(&mut creator_inbox);
        assert!(matches!(
            &*received[0],
            ServerToClient::Error { code, .. } if code == "ROUND_IN_PROGRESS"
        ));
    }

    #[tokio::test]
    async fn test_dismissal_ends_the_task() {
        let (room_tx, room_rx) = mpsc::unbounded_channel();
        let (coordinator_tx, mut coordinator_rx) = mpsc::unbounded_channel();
        let ctx = RoomContext::new(
            room_tx.clone(),
            coordinator_tx,
            Arc::new(ContentCache::fixed(sample_content(5, 5, 1))),
            None,
            seeded_rng(4),
        );
        let creator = Uuid::new_v4();
        let (conn, _inbox) = test_connection();
        let handle = tokio::spawn(room_task(
            Room::new("BYE".into(), creator, "host".into(), conn.clone()),
            room_rx,
            ctx,
        ));
        room_tx
            .send(RoomMessage::Action {
                identity: creator,
                connection: conn,
                action: RoomAction::EndStandings,
            })
            .unwrap();
        handle.await.unwrap();

        let Some(CoordinatorMessage::RoomShutdown { code }) = coordinator_rx.recv().await else {
            panic!("expected a shutdown notice");
        };
        assert_eq!(code, "BYE");
    }
}
