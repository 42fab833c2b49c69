use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::broadcaster::RoomBroadcaster;
use super::room::{JoinOutcome, Room};
use super::view::ViewProjector;
use super::{MoveRequest, Phase, Round, Side, Transition};
use crate::client::Connection;
use crate::content::ContentCache;
use crate::error::GameError;
use crate::messages::{
    AdminCommand, CoordinatorMessage, RejoinDetails, RoomAction, RoomMessage, RoomUpdate,
    ServerToClient,
};
use crate::settings::GameSettings;

/// What a room task needs besides the room itself.
pub struct RoomContext {
    /// The room's own queue, handed to timers so expiry re-enters it.
    pub room_tx: mpsc::UnboundedSender<RoomMessage>,
    pub coordinator_tx: mpsc::UnboundedSender<CoordinatorMessage>,
    pub content: Arc<ContentCache>,
    pub admin_key: Option<String>,
    pub rng: StdRng,
}

impl RoomContext {
    pub fn new(
        room_tx: mpsc::UnboundedSender<RoomMessage>,
        coordinator_tx: mpsc::UnboundedSender<CoordinatorMessage>,
        content: Arc<ContentCache>,
        admin_key: Option<String>,
        rng: StdRng,
    ) -> Self {
        Self {
            room_tx,
            coordinator_tx,
            content,
            admin_key,
            rng,
        }
    }

    fn record_seat(&self, identity: Uuid, code: &str) {
        let _ = self.coordinator_tx.send(CoordinatorMessage::PlayerSeated {
            identity,
            code: code.to_string(),
        });
    }

    fn release_seat(&self, identity: Uuid, code: &str) {
        let _ = self.coordinator_tx.send(CoordinatorMessage::SeatReleased {
            identity,
            code: code.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

pub struct RoomHandlers;

impl RoomHandlers {
    pub fn handle_created(room: &Room) {
        RoomBroadcaster::new(room.players()).send_to(
            0,
            ServerToClient::CreateRoom(ViewProjector::room_details(room, Some(0))),
        );
    }

    pub fn handle_join(
        room: &mut Room,
        ctx: &RoomContext,
        identity: Uuid,
        name: String,
        connection: Connection,
    ) {
        match room.join(identity, &name, connection.clone()) {
            Ok(JoinOutcome::Seated(seat)) => {
                info!("Player {} joined room {} at seat {}", identity, room.code, seat);
                ctx.record_seat(identity, &room.code);
                let broadcaster = RoomBroadcaster::new(room.players());
                broadcaster.send_to(
                    seat,
                    ServerToClient::JoinRoom(ViewProjector::room_details(room, Some(seat))),
                );
                broadcaster.broadcast_except(
                    seat,
                    ServerToClient::update(
                        RoomUpdate::new(format!("{} joined", room.players()[seat].name))
                            .with_players(room.player_names()),
                    ),
                );
            }
            Ok(JoinOutcome::Reattached(seat)) => {
                ctx.record_seat(identity, &room.code);
                Self::rejoin(room, seat, false);
            }
            Ok(JoinOutcome::TookOver {
                seat,
                previous,
                creator,
            }) => {
                ctx.release_seat(previous, &room.code);
                ctx.record_seat(identity, &room.code);
                Self::rejoin(room, seat, creator);
            }
            Err(e) => {
                debug!("Room {} refused {}: {}", room.code, name, e);
                connection.send_error(&e);
            }
        }
    }

    pub fn handle_reattach(room: &mut Room, identity: Uuid, connection: Connection) {
        match room.reattach(identity, connection.clone()) {
            Ok(seat) => Self::rejoin(room, seat, false),
            Err(e) => connection.send_error(&e),
        }
    }

    /// Full reconciliation for a returning seat: the hand is sent whole and
    /// marked `replace` so any cached copy on the client is dropped.
    fn rejoin(room: &Room, seat: usize, creator_moved: bool) {
        info!("Seat {} of room {} reconnected", seat, room.code);
        let live = room.round.as_ref().filter(|round| !round.is_finished());
        let details = RejoinDetails {
            details: ViewProjector::room_details(room, Some(seat)),
            card_update: live.and_then(|round| ViewProjector::hand_update(round, seat)),
            move_state: live.and_then(|round| round.play(seat).cloned()),
        };
        let broadcaster = RoomBroadcaster::new(room.players());
        broadcaster.send_to(seat, ServerToClient::RejoinRoom(details));
        let mut update = RoomUpdate::new(format!("{} reconnected", room.players()[seat].name))
            .with_players(room.player_names());
        if creator_moved {
            update = update.with_creator(room.creator_name());
        }
        broadcaster.broadcast_except(seat, ServerToClient::update(update));
    }

    /// Runs one player request. Errors go back to the requester only.
    pub async fn handle_action(
        room: &mut Room,
        ctx: &mut RoomContext,
        identity: Uuid,
        connection: Connection,
        action: RoomAction,
    ) -> Flow {
        let Some(seat) = room.seat_of(identity) else {
            connection.send_error(&GameError::PlayerNotInRoom);
            return Flow::Continue;
        };
        room.bind_connection(seat, connection.clone());
        let name = action.name();
        debug!("Room {} seat {}: {}", room.code, seat, name);

        let result = match action {
            RoomAction::Rearrange { players } => Self::rearrange(room, identity, players),
            RoomAction::UpdateSettings { settings } => Self::update_settings(room, identity, settings),
            RoomAction::Begin => Self::begin(room, ctx, identity).await,
            RoomAction::MakeMove { play } => Self::make_move(room, ctx, seat, play),
            RoomAction::Discard { side, card_id } => Self::discard(room, ctx, seat, side, card_id),
            RoomAction::Vote {
                play_index,
                vote_state,
            } => Self::vote(room, seat, play_index, vote_state),
            RoomAction::DoneVoting => Self::done_voting(room, ctx, seat),
            RoomAction::ForceSkip { phase } => Self::force_skip(room, ctx, identity, phase),
            RoomAction::EndStandings => Self::end_standings(room, identity),
        };
        match result {
            Ok(flow) => flow,
            Err(e) => {
                debug!("Room {} rejected {} from seat {}: {}", room.code, name, seat, e);
                connection.send_error(&e);
                Flow::Continue
            }
        }
    }

    pub fn handle_timer(room: &mut Room, ctx: &mut RoomContext, epoch: u64) {
        let Some(round) = room.round.as_mut() else {
            debug!("Room {}: timer {} fired with no round", room.code, epoch);
            return;
        };
        if !round.timer.take_fired(epoch) {
            debug!("Room {}: ignoring stale timer {}", room.code, epoch);
            return;
        }
        info!("Room {}: {} timer expired", room.code, round.phase());
        Self::expire(room, ctx);
    }

    pub fn handle_admin(
        room: &mut Room,
        ctx: &mut RoomContext,
        admin_key: &str,
        command: AdminCommand,
        update: Option<String>,
        connection: &Connection,
    ) {
        if let Err(e) = Self::admin(room, ctx, admin_key, command, update) {
            connection.send_error(&e);
        }
    }

    fn admin(
        room: &mut Room,
        ctx: &mut RoomContext,
        admin_key: &str,
        command: AdminCommand,
        update: Option<String>,
    ) -> Result<(), GameError> {
        if ctx.admin_key.as_deref() != Some(admin_key) {
            warn!("Room {}: rejected admin command with a bad key", room.code);
            return Err(GameError::UnauthorizedAction);
        }
        info!("Room {}: admin command {:?}", room.code, command);
        match command {
            AdminCommand::Announce => {
                let text = update
                    .filter(|text| !text.trim().is_empty())
                    .ok_or_else(|| GameError::MalformedMessage("announce needs an update".into()))?;
                RoomBroadcaster::new(room.players()).broadcast(ServerToClient::notice(text));
            }
            AdminCommand::ExpireTimer => {
                if !room.round_in_progress() {
                    return Err(GameError::NoRoundInProgress);
                }
                Self::expire(room, ctx);
            }
            AdminCommand::ForcePhase { phase } => {
                if !room.round_in_progress() {
                    return Err(GameError::NoRoundInProgress);
                }
                for _ in 0..3 {
                    let Some(round) = room.round.as_ref() else {
                        break;
                    };
                    if round.is_finished() || round.phase() == phase {
                        break;
                    }
                    Self::expire(room, ctx);
                }
            }
        }
        Ok(())
    }

    fn rearrange(room: &mut Room, identity: Uuid, players: Vec<String>) -> Result<Flow, GameError> {
        room.rearrange(identity, &players)?;
        RoomBroadcaster::new(room.players()).broadcast(ServerToClient::update(
            RoomUpdate::new("Rearranged players").with_players(room.player_names()),
        ));
        Ok(Flow::Continue)
    }

    fn update_settings(
        room: &mut Room,
        identity: Uuid,
        settings: GameSettings,
    ) -> Result<Flow, GameError> {
        room.update_settings(identity, settings)?;
        RoomBroadcaster::new(room.players()).broadcast(ServerToClient::update(
            RoomUpdate::new("Updated settings").with_settings(room.settings().clone()),
        ));
        Ok(Flow::Continue)
    }

    async fn begin(room: &mut Room, ctx: &mut RoomContext, identity: Uuid) -> Result<Flow, GameError> {
        room.ensure_creator(identity)?;
        if room.round_in_progress() {
            return Err(GameError::RoundInProgress);
        }
        let content = ctx.content.snapshot().await?;
        let shortfall = room.begin(identity, &content, &mut ctx.rng)?;
        info!(
            "Room {} began a {} game with {} players",
            room.code,
            room.settings().scoring,
            room.players().len()
        );
        Self::enter_phase(room, ctx, with_shortfall("Game started".into(), shortfall), true);
        Ok(Flow::Continue)
    }

    fn make_move(
        room: &mut Room,
        ctx: &mut RoomContext,
        seat: usize,
        play: MoveRequest,
    ) -> Result<Flow, GameError> {
        let outcome = live_round(room)?.submit_move(seat, &play, &mut ctx.rng)?;
        let Some(round) = room.round.as_ref() else {
            return Err(GameError::NoRoundInProgress);
        };
        let names = room.player_names();
        let broadcaster = RoomBroadcaster::new(room.players());
        let confirmation = RoomUpdate::new("Move accepted")
            .with_move(outcome.accepted.clone())
            .with_cards(ViewProjector::hand_update(round, seat));

        match outcome.transition {
            Some(transition) => {
                broadcaster.send_to(seat, ServerToClient::update(confirmation));
                Self::after_transition(room, ctx, transition);
            }
            None => {
                let summary = format!("{} played", names[seat]);
                broadcaster.broadcast_each(|viewer| {
                    let state = Some(ViewProjector::project(round, &names, Some(viewer)));
                    let update = if viewer == seat {
                        RoomUpdate {
                            update: summary.clone(),
                            ..confirmation.clone()
                        }
                    } else {
                        RoomUpdate::new(summary.clone())
                    };
                    ServerToClient::update(update.with_state(state))
                });
            }
        }
        Ok(Flow::Continue)
    }

    fn discard(
        room: &mut Room,
        ctx: &mut RoomContext,
        seat: usize,
        side: Side,
        card_id: i64,
    ) -> Result<Flow, GameError> {
        live_round(room)?.discard(seat, side, card_id, &mut ctx.rng)?;
        if let Some(round) = room.round.as_ref() {
            RoomBroadcaster::new(room.players()).send_to(
                seat,
                ServerToClient::update(
                    RoomUpdate::new(format!("Discarded a {} card", side.name()))
                        .with_cards(ViewProjector::hand_update(round, seat)),
                ),
            );
        }
        Ok(Flow::Continue)
    }

    fn vote(room: &mut Room, seat: usize, slot: usize, approve: bool) -> Result<Flow, GameError> {
        live_round(room)?.cast_vote(seat, slot, approve)?;
        if let Some(round) = room.round.as_ref() {
            let names = room.player_names();
            RoomBroadcaster::new(room.players()).send_to(
                seat,
                ServerToClient::update(
                    RoomUpdate::new("Vote recorded")
                        .with_state(Some(ViewProjector::project(round, &names, Some(seat)))),
                ),
            );
        }
        Ok(Flow::Continue)
    }

    fn done_voting(room: &mut Room, ctx: &mut RoomContext, seat: usize) -> Result<Flow, GameError> {
        let progress = live_round(room)?.done_voting(seat)?;
        if let Some(transition) = progress.transition {
            Self::after_transition(room, ctx, transition);
            return Ok(Flow::Continue);
        }
        let notice = ServerToClient::notice(format!(
            "{}/{} players done voting",
            progress.done, progress.eligible
        ));
        let broadcaster = RoomBroadcaster::new(room.players());
        // Partial counts stay with the requester until a majority is done.
        if progress.done * 2 > progress.eligible {
            broadcaster.broadcast(notice);
        } else {
            broadcaster.send_to(seat, notice);
        }
        Ok(Flow::Continue)
    }

    fn force_skip(
        room: &mut Room,
        ctx: &mut RoomContext,
        identity: Uuid,
        phase: Phase,
    ) -> Result<Flow, GameError> {
        room.ensure_creator(identity)?;
        let current = live_round(room)?.phase();
        if current != phase {
            return Err(GameError::wrong_phase(current));
        }
        info!("Room {}: creator skipped the {} phase", room.code, phase);
        Self::expire(room, ctx);
        Ok(Flow::Continue)
    }

    fn end_standings(room: &Room, identity: Uuid) -> Result<Flow, GameError> {
        room.ensure_creator(identity)?;
        if room.round_in_progress() {
            return Err(GameError::RoundInProgress);
        }
        info!("Room {} dismissed by its creator", room.code);
        RoomBroadcaster::new(room.players()).broadcast(ServerToClient::EndStandings {});
        Ok(Flow::Shutdown)
    }

    /// Ends the current phase the way its timer would.
    fn expire(room: &mut Room, ctx: &mut RoomContext) {
        let Some(round) = room.round.as_mut() else {
            return;
        };
        round.timer.cancel();
        if let Some(transition) = round.expire(&mut ctx.rng) {
            Self::after_transition(room, ctx, transition);
        }
    }

    fn after_transition(room: &mut Room, ctx: &RoomContext, transition: Transition) {
        debug!("Room {}: {:?}", room.code, transition);
        match transition {
            Transition::Vote => {
                Self::enter_phase(room, ctx, "All plays are in, time to vote".into(), false)
            }
            Transition::Standings => {
                let summary = if room.round.as_ref().is_some_and(Round::has_winner) {
                    "Votes are in and we have a winner"
                } else {
                    "Votes are in"
                };
                Self::enter_phase(room, ctx, summary.into(), false)
            }
            Transition::NextRound { shortfall } => {
                let number = room.round.as_ref().map_or(0, Round::round_number);
                let summary = with_shortfall(format!("Round {number} started"), shortfall);
                Self::enter_phase(room, ctx, summary, true)
            }
            Transition::Finished => Self::finish(room),
        }
    }

    /// Arms the timer of the phase just entered, then tells every seat.
    fn enter_phase(room: &mut Room, ctx: &RoomContext, summary: String, deal: bool) {
        let Some(round) = room.round.as_mut() else {
            return;
        };
        match round.settings().timers.for_phase(round.phase()) {
            Some(after) => {
                round.timer.arm(after, &ctx.room_tx);
            }
            None => round.timer.cancel(),
        }

        let Some(round) = room.round.as_ref() else {
            return;
        };
        let names = room.player_names();
        RoomBroadcaster::new(room.players()).broadcast_each(|seat| {
            let cards = if deal {
                ViewProjector::hand_update(round, seat)
            } else {
                None
            };
            ServerToClient::update(
                RoomUpdate::new(summary.clone())
                    .with_state(Some(ViewProjector::project(round, &names, Some(seat))))
                    .with_cards(cards),
            )
        });
    }

    fn finish(room: &mut Room) {
        let Some(round) = room.round.as_mut() else {
            return;
        };
        round.timer.cancel();
        info!("Room {}: game over after {} rounds", room.code, round.round_number());

        let Some(round) = room.round.as_ref() else {
            return;
        };
        let names = room.player_names();
        let standings = ViewProjector::standings(round, &names);
        RoomBroadcaster::new(room.players()).broadcast_each(|seat| ServerToClient::EndGame {
            state: ViewProjector::project(round, &names, Some(seat)),
            standings: standings.clone(),
        });
    }
}

fn live_round(room: &mut Room) -> Result<&mut Round, GameError> {
    room.round
        .as_mut()
        .filter(|round| !round.is_finished())
        .ok_or(GameError::NoRoundInProgress)
}

fn with_shortfall(summary: String, shortfall: usize) -> String {
    if shortfall > 0 {
        format!("{summary} (the deck ran {shortfall} cards short)")
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentSnapshot;
    use crate::messages::{GameStateView, RoomUpdate};
    use crate::settings::{ScoringStyle, WinCondition};
    use crate::test_utils::{Inbox, drain, error_codes, sample_content, seeded_rng, test_connection};
    use pretty_assertions::assert_eq;

    const ADMIN_KEY: &str = "let-me-in";

    struct Table {
        room: Room,
        ctx: RoomContext,
        ids: Vec<Uuid>,
        connections: Vec<Connection>,
        inboxes: Vec<Inbox>,
        _room_rx: mpsc::UnboundedReceiver<RoomMessage>,
        coordinator_rx: mpsc::UnboundedReceiver<CoordinatorMessage>,
    }

    impl Table {
        fn new(seats: usize, settings: GameSettings) -> Self {
            Self::with_content(seats, settings, sample_content(60, 60, 10))
        }

        fn with_content(seats: usize, settings: GameSettings, content: ContentSnapshot) -> Self {
            let (room_tx, room_rx) = mpsc::unbounded_channel();
            let (coordinator_tx, coordinator_rx) = mpsc::unbounded_channel();
            let ctx = RoomContext::new(
                room_tx,
                coordinator_tx,
                Arc::new(ContentCache::fixed(content)),
                Some(ADMIN_KEY.into()),
                seeded_rng(21),
            );
            let ids: Vec<Uuid> = (0..seats).map(|_| Uuid::new_v4()).collect();
            let (connections, inboxes): (Vec<_>, Vec<_>) = (0..seats).map(|_| test_connection()).unzip();

            let mut room = Room::new("ROOMS".into(), ids[0], "p0".into(), connections[0].clone());
            for seat in 1..seats {
                room.join(ids[seat], &format!("p{seat}"), connections[seat].clone())
                    .unwrap();
            }
            room.update_settings(ids[0], settings).unwrap();

            Self {
                room,
                ctx,
                ids,
                connections,
                inboxes,
                _room_rx: room_rx,
                coordinator_rx,
            }
        }

        async fn act(&mut self, seat: usize, action: RoomAction) -> Flow {
            RoomHandlers::handle_action(
                &mut self.room,
                &mut self.ctx,
                self.ids[seat],
                self.connections[seat].clone(),
                action,
            )
            .await
        }

        fn inbox(&mut self, seat: usize) -> Vec<Arc<ServerToClient>> {
            drain(&mut self.inboxes[seat])
        }

        fn clear(&mut self) {
            for inbox in &mut self.inboxes {
                drain(inbox);
            }
        }

        fn round(&self) -> &Round {
            self.room.round.as_ref().unwrap()
        }

        async fn play_all(&mut self) {
            for seat in 0..self.ids.len() {
                if !self.round().policy().eligible_to_play(seat) || self.round().play(seat).is_some() {
                    continue;
                }
                let hand = self.round().hand(seat).unwrap();
                let play = MoveRequest::cards(Some(hand.top[0].id), Some(hand.bottom[0].id));
                self.act(seat, RoomAction::MakeMove { play }).await;
            }
        }
    }

    fn settings(style: ScoringStyle) -> GameSettings {
        GameSettings {
            hand_size: 5,
            blanks: 0.0,
            ..style.default_settings()
        }
    }

    fn last_update(received: &[Arc<ServerToClient>]) -> Option<&RoomUpdate> {
        received.iter().rev().find_map(|msg| match &**msg {
            ServerToClient::UpdateRoom(update) => Some(update),
            _ => None,
        })
    }

    fn last_state(received: &[Arc<ServerToClient>]) -> Option<&GameStateView> {
        received.iter().rev().find_map(|msg| match &**msg {
            ServerToClient::UpdateRoom(RoomUpdate {
                state: Some(state), ..
            }) => Some(state),
            _ => None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_tzar_scenario_reveals_after_both_moves() {
        let mut table = Table::new(3, settings(ScoringStyle::Tzar));
        table.act(0, RoomAction::Begin).await;

        for seat in 0..3 {
            let received = table.inbox(seat);
            let update = last_update(&received).unwrap();
            let cards = update.card_update.as_ref().unwrap();
            assert_eq!((cards.top.len(), cards.bottom.len()), (5, 5));
            assert_eq!(update.state.as_ref().unwrap().judge, Some(0));
            assert_eq!(update.state.as_ref().unwrap().timer, Some(90));
        }

        let hand = table.round().hand(0).unwrap();
        let play = MoveRequest::cards(Some(hand.top[0].id), Some(hand.bottom[0].id));
        table.act(0, RoomAction::MakeMove { play }).await;
        assert_eq!(error_codes(&table.inbox(0)), vec!["NOT_YOUR_TURN"]);
        assert!(table.inbox(1).is_empty());

        table.play_all().await;
        assert_eq!(table.round().phase(), Phase::Vote);
        for seat in 0..3 {
            let received = table.inbox(seat);
            let state = last_state(&received).unwrap();
            assert_eq!(state.phase, Phase::Vote);
            assert_eq!(state.plays.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_move_confirmation_goes_to_mover_only() {
        let mut table = Table::new(3, settings(ScoringStyle::Vote));
        table.act(0, RoomAction::Begin).await;
        table.clear();

        let hand = table.round().hand(1).unwrap().clone();
        let play = MoveRequest::cards(Some(hand.top[0].id), Some(hand.bottom[0].id));
        table.act(1, RoomAction::MakeMove { play }).await;

        let mover = table.inbox(1);
        let update = last_update(&mover).unwrap();
        assert_eq!(update.move_state.as_ref().unwrap().top, Some(hand.top[0].clone()));
        assert_eq!(update.card_update.as_ref().unwrap().top.len(), 4);

        let other = table.inbox(2);
        let update = last_update(&other).unwrap();
        assert_eq!(update.update, "p1 played");
        assert!(update.move_state.is_none() && update.card_update.is_none());
        assert_eq!(update.state.as_ref().unwrap().played, vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_errors_reach_only_the_requester() {
        let mut table = Table::new(3, settings(ScoringStyle::Vote));
        table.act(1, RoomAction::Begin).await;
        assert_eq!(error_codes(&table.inbox(1)), vec!["UNAUTHORIZED_ACTION"]);
        assert!(table.inbox(0).is_empty());
        assert!(table.inbox(2).is_empty());

        table.act(1, RoomAction::DoneVoting).await;
        assert_eq!(error_codes(&table.inbox(1)), vec!["NO_ROUND_IN_PROGRESS"]);

        let (stranger, mut stranger_inbox) = test_connection();
        RoomHandlers::handle_action(
            &mut table.room,
            &mut table.ctx,
            Uuid::new_v4(),
            stranger,
            RoomAction::Begin,
        )
        .await;
        assert_eq!(error_codes(&drain(&mut stranger_inbox)), vec!["PLAYER_NOT_IN_ROOM"]);
    }

    #[tokio::test]
    async fn test_reconnect_restores_authoritative_hand() {
        let mut table = Table::new(3, settings(ScoringStyle::Vote));
        table.act(0, RoomAction::Begin).await;
        let hand = table.round().hand(2).unwrap().clone();
        let play = MoveRequest::cards(Some(hand.top[1].id), Some(hand.bottom[1].id));
        table.act(2, RoomAction::MakeMove { play }).await;
        table.clear();

        let (connection, mut inbox) = test_connection();
        RoomHandlers::handle_reattach(&mut table.room, table.ids[2], connection);

        let received = drain(&mut inbox);
        let ServerToClient::RejoinRoom(rejoin) = &*received[0] else {
            panic!("expected REJOIN_ROOM, got {:?}", received[0]);
        };
        let authoritative = table.round().hand(2).unwrap();
        let cards = rejoin.card_update.as_ref().unwrap();
        assert_eq!(cards.top, authoritative.top);
        assert_eq!(cards.bottom, authoritative.bottom);
        assert_eq!(rejoin.move_state.as_ref(), table.round().play(2));
        assert_eq!(rejoin.details.state.as_ref().unwrap().phase, Phase::Move);

        let others = table.inbox(0);
        assert_eq!(last_update(&others).unwrap().update, "p2 reconnected");
    }

    #[tokio::test]
    async fn test_rejoin_without_round_sends_room_only() {
        let mut table = Table::new(2, settings(ScoringStyle::Vote));
        let (connection, mut inbox) = test_connection();
        RoomHandlers::handle_reattach(&mut table.room, table.ids[1], connection);
        let received = drain(&mut inbox);
        let ServerToClient::RejoinRoom(rejoin) = &*received[0] else {
            panic!("expected REJOIN_ROOM");
        };
        assert!(rejoin.card_update.is_none());
        assert!(rejoin.details.state.is_none());
        assert_eq!(rejoin.details.players, vec!["p0", "p1"]);
    }

    #[tokio::test]
    async fn test_done_voting_progress_visibility() {
        let mut table = Table::new(5, settings(ScoringStyle::Vote));
        table.act(0, RoomAction::Begin).await;
        table.play_all().await;
        table.clear();

        table.act(0, RoomAction::DoneVoting).await;
        assert_eq!(last_update(&table.inbox(0)).unwrap().update, "1/5 players done voting");
        assert!(table.inbox(1).is_empty());

        table.act(1, RoomAction::DoneVoting).await;
        table.act(2, RoomAction::DoneVoting).await;
        assert_eq!(last_update(&table.inbox(4)).unwrap().update, "3/5 players done voting");

        table.act(3, RoomAction::DoneVoting).await;
        table.act(4, RoomAction::DoneVoting).await;
        assert_eq!(table.round().phase(), Phase::Standings);
        let received = table.inbox(4);
        assert_eq!(last_state(&received).unwrap().phase, Phase::Standings);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_is_ignored() {
        let mut table = Table::new(2, settings(ScoringStyle::Vote));
        // Begin arms the move timer (epoch 1); the reveal re-arms for the
        // vote phase (epoch 2), so fires for 0 and 1 are stale.
        table.act(0, RoomAction::Begin).await;
        table.play_all().await;
        assert_eq!(table.round().phase(), Phase::Vote);
        table.clear();

        for epoch in [0, 1] {
            RoomHandlers::handle_timer(&mut table.room, &mut table.ctx, epoch);
        }
        assert_eq!(table.round().phase(), Phase::Vote);
        assert!(table.inbox(0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_skip_by_creator_only_in_current_phase() {
        let mut table = Table::new(3, settings(ScoringStyle::Vote));
        table.act(0, RoomAction::Begin).await;
        table.clear();

        table.act(1, RoomAction::ForceSkip { phase: Phase::Move }).await;
        assert_eq!(error_codes(&table.inbox(1)), vec!["UNAUTHORIZED_ACTION"]);
        table.act(0, RoomAction::ForceSkip { phase: Phase::Vote }).await;
        assert_eq!(error_codes(&table.inbox(0)), vec!["WRONG_PHASE"]);

        table.act(0, RoomAction::ForceSkip { phase: Phase::Move }).await;
        // Nobody played, so the empty reveal goes straight to standings.
        assert_eq!(table.round().phase(), Phase::Standings);
        let received = table.inbox(2);
        assert_eq!(last_state(&received).unwrap().timer, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_points_win_ends_game_and_allows_dismissal() {
        let mut s = settings(ScoringStyle::Tzar);
        s.win_condition = WinCondition::Points(1);
        let mut table = Table::new(3, s);
        table.act(0, RoomAction::Begin).await;
        table.play_all().await;

        table.act(0, RoomAction::Vote { play_index: 0, vote_state: true }).await;
        table.act(0, RoomAction::EndStandings).await;
        assert!(error_codes(&table.inbox(0)).contains(&"ROUND_IN_PROGRESS".to_string()));

        table.act(0, RoomAction::DoneVoting).await;
        assert!(table.round().has_winner());
        table.act(0, RoomAction::ForceSkip { phase: Phase::Standings }).await;
        assert!(table.round().is_finished());

        let received = table.inbox(1);
        let Some(ServerToClient::EndGame { standings, state }) = received.last().map(|m| &**m) else {
            panic!("expected END_GAME");
        };
        assert!(state.finished);
        assert_eq!(standings[0].rank, "1st");
        assert_eq!(standings[0].points, 1);
        assert_eq!(standings[1].rank, "2nd");
        assert_eq!(standings[2].rank, "2nd");

        assert_eq!(table.act(1, RoomAction::EndStandings).await, Flow::Continue);
        assert_eq!(table.act(0, RoomAction::EndStandings).await, Flow::Shutdown);
        assert_eq!(
            table.inbox(2).last().map(|msg| (**msg).clone()),
            Some(ServerToClient::EndStandings {})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_commands() {
        let mut table = Table::new(3, settings(ScoringStyle::Vote));
        let (admin, mut admin_inbox) = test_connection();

        RoomHandlers::handle_admin(
            &mut table.room,
            &mut table.ctx,
            "wrong",
            AdminCommand::Announce,
            Some("hi".into()),
            &admin,
        );
        assert_eq!(error_codes(&drain(&mut admin_inbox)), vec!["UNAUTHORIZED_ACTION"]);

        RoomHandlers::handle_admin(
            &mut table.room,
            &mut table.ctx,
            ADMIN_KEY,
            AdminCommand::ExpireTimer,
            None,
            &admin,
        );
        assert_eq!(error_codes(&drain(&mut admin_inbox)), vec!["NO_ROUND_IN_PROGRESS"]);

        table.act(0, RoomAction::Begin).await;
        RoomHandlers::handle_admin(
            &mut table.room,
            &mut table.ctx,
            ADMIN_KEY,
            AdminCommand::ForcePhase {
                phase: Phase::Standings,
            },
            None,
            &admin,
        );
        assert_eq!(table.round().phase(), Phase::Standings);

        table.clear();
        RoomHandlers::handle_admin(
            &mut table.room,
            &mut table.ctx,
            ADMIN_KEY,
            AdminCommand::Announce,
            Some("Server restarting soon".into()),
            &admin,
        );
        assert_eq!(
            last_update(&table.inbox(1)).unwrap().update,
            "Server restarting soon"
        );
        assert!(drain(&mut admin_inbox).is_empty());
    }

    #[tokio::test]
    async fn test_begin_reports_short_deck() {
        let mut table = Table::with_content(2, settings(ScoringStyle::Vote), sample_content(6, 20, 2));
        table.act(0, RoomAction::Begin).await;
        let received = table.inbox(0);
        let update = last_update(&received).unwrap();
        assert_eq!(update.update, "Game started (the deck ran 4 cards short)");
        let total: usize = (0..2).map(|seat| table.round().hand(seat).unwrap().top.len()).sum();
        assert_eq!(total, 6);
    }

    #[tokio::test]
    async fn test_join_and_hijack_announcements() {
        let mut table = Table::new(2, settings(ScoringStyle::Vote));
        table.clear();
        let (conn, mut inbox) = test_connection();
        let newcomer = Uuid::new_v4();
        RoomHandlers::handle_join(&mut table.room, &table.ctx, newcomer, "p2".into(), conn);

        let received = drain(&mut inbox);
        let ServerToClient::JoinRoom(details) = &*received[0] else {
            panic!("expected JOIN_ROOM");
        };
        assert_eq!(details.players, vec!["p0", "p1", "p2"]);
        assert_eq!(details.creator, "p0");
        assert_eq!(last_update(&table.inbox(1)).unwrap().update, "p2 joined");

        let (conn, mut inbox) = test_connection();
        RoomHandlers::handle_join(&mut table.room, &table.ctx, Uuid::new_v4(), "p1".into(), conn);
        assert_eq!(error_codes(&drain(&mut inbox)), vec!["NAME_TAKEN"]);
    }

    #[tokio::test]
    async fn test_creator_seat_takeover_releases_old_identity() {
        let mut table = Table::new(2, settings(ScoringStyle::Vote));
        while table.coordinator_rx.try_recv().is_ok() {}
        table.clear();
        let old_creator = table.ids[0];
        table.inboxes[0].close();

        let (conn, mut inbox) = test_connection();
        let newcomer = Uuid::new_v4();
        RoomHandlers::handle_join(&mut table.room, &table.ctx, newcomer, "p0".into(), conn);

        assert!(matches!(&*drain(&mut inbox)[0], ServerToClient::RejoinRoom(_)));
        let received = table.inbox(1);
        let update = last_update(&received).unwrap();
        assert_eq!(update.update, "p0 reconnected");
        assert_eq!(update.creator.as_deref(), Some("p0"));
        assert!(table.room.is_creator(newcomer));

        let Ok(CoordinatorMessage::SeatReleased { identity, code }) = table.coordinator_rx.try_recv()
        else {
            panic!("expected the old identity to be released");
        };
        assert_eq!((identity, code.as_str()), (old_creator, "ROOMS"));
        assert!(matches!(
            table.coordinator_rx.try_recv(),
            Ok(CoordinatorMessage::PlayerSeated { identity, .. }) if identity == newcomer
        ));
    }
}
