use super::room::Room;
use super::{Phase, Round};
use crate::messages::{CardUpdate, CardUpdateMode, GameStateView, PlayView, RoomDetails, Standing};

/// Decides what each viewer may see of a round.
///
/// - `move`: only who has played, never what.
/// - `vote` and `standings`: every revealed play in presentation order, with
///   the author shown only to the author themselves, or to the judge in
///   single-judge mode. Vote counts appear only once votes are tallied.
/// - A viewer's own votes and own play are echoed to that viewer alone.
/// - Per-seat gains for the round are shown only in `standings`.
pub struct ViewProjector;

impl ViewProjector {
    pub fn project(round: &Round, names: &[String], viewer: Option<usize>) -> GameStateView {
        let phase = round.phase();
        let judge = round.policy().judge();
        let sees_authors = |seat: usize| viewer == Some(seat) || (judge.is_some() && viewer == judge);

        let plays = match phase {
            Phase::Move => Vec::new(),
            Phase::Vote | Phase::Standings => round
                .slots()
                .map(|(slot, seat, play)| PlayView {
                    top: play.top.clone(),
                    bottom: play.bottom.clone(),
                    player: sees_authors(seat)
                        .then(|| names.get(seat).cloned())
                        .flatten(),
                    votes: (phase == Phase::Standings).then(|| round.slot_votes(slot)),
                })
                .collect(),
        };

        GameStateView {
            phase,
            round: round.round_number(),
            visual: round.prompt().map(|v| v.filename.clone()),
            judge,
            timer: if round.timer.is_pending() {
                round.settings().timers.for_phase(phase).map(|d| d.as_secs())
            } else {
                None
            },
            played: if phase == Phase::Move {
                round.has_played()
            } else {
                Vec::new()
            },
            plays,
            points: round.points().to_vec(),
            gained: if phase == Phase::Standings {
                round.gained().to_vec()
            } else {
                Vec::new()
            },
            your_play: viewer.and_then(|seat| round.play(seat).cloned()),
            your_votes: match (phase, viewer) {
                (Phase::Vote, Some(seat)) => round.votes_of(seat),
                _ => Vec::new(),
            },
            finished: round.is_finished(),
        }
    }

    /// The seat's whole hand, to be taken as the truth by the client.
    pub fn hand_update(round: &Round, seat: usize) -> Option<CardUpdate> {
        round.hand(seat).map(|hand| CardUpdate {
            mode: CardUpdateMode::Replace,
            top: hand.top.clone(),
            bottom: hand.bottom.clone(),
        })
    }

    pub fn standings(round: &Round, names: &[String]) -> Vec<Standing> {
        round
            .standings()
            .unwrap_or_default()
            .iter()
            .map(|ranked| Standing {
                player: names.get(ranked.seat).cloned().unwrap_or_default(),
                points: ranked.points,
                rank: ranked.rank.clone(),
            })
            .collect()
    }

    pub fn room_details(room: &Room, viewer: Option<usize>) -> RoomDetails {
        let names = room.player_names();
        RoomDetails {
            room_id: room.code.clone(),
            state: room
                .round
                .as_ref()
                .map(|round| Self::project(round, &names, viewer)),
            players: names,
            creator: room.creator_name(),
            settings: room.settings().clone(),
        }
    }
}
