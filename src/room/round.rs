use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::dealer::{Dealer, Hand, Piles};
use super::scoring::{RankedSeat, ScoringPolicy, award_points, rank_seats};
use super::timer::RoundTimer;
use super::Side;
use crate::content::{Card, ContentSnapshot, Visual};
use crate::error::GameError;
use crate::settings::{GameSettings, WinCondition};

/// Longest text accepted on a blank card.
pub const MAX_BLANK_TEXT: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Move,
    Vote,
    Standings,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Move => write!(f, "move"),
            Phase::Vote => write!(f, "vote"),
            Phase::Standings => write!(f, "standings"),
        }
    }
}

/// An accepted play. Blank cards carry the player's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub top: Option<Card>,
    pub bottom: Option<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardChoice {
    pub id: i64,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub top: Option<CardChoice>,
    #[serde(default)]
    pub bottom: Option<CardChoice>,
}

impl MoveRequest {
    /// A move of plain (non-blank) cards by id.
    #[cfg(test)]
    pub fn cards(top: Option<i64>, bottom: Option<i64>) -> Self {
        Self {
            top: top.map(|id| CardChoice { id, text: None }),
            bottom: bottom.map(|id| CardChoice { id, text: None }),
        }
    }

    fn side(&self, side: Side) -> Option<&CardChoice> {
        match side {
            Side::Top => self.top.as_ref(),
            Side::Bottom => self.bottom.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Plays were revealed for voting.
    Vote,
    /// Votes were tallied and points awarded.
    Standings,
    /// A new round was dealt. `shortfall` counts cards the piles could not supply.
    NextRound { shortfall: usize },
    /// Somebody won; final standings are available.
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub accepted: Move,
    pub transition: Option<Transition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneVoting {
    pub done: usize,
    pub eligible: usize,
    pub transition: Option<Transition>,
}

/// One room's game: hands, piles, plays, votes and running points, indexed
/// by seat. All mutating methods validate the whole request before touching
/// any state.
#[derive(Debug)]
pub struct Round {
    settings: GameSettings,
    policy: ScoringPolicy,
    phase: Phase,
    round_number: u32,
    prompt: Option<Visual>,
    hands: Vec<Hand>,
    piles: Piles,
    plays: Vec<Option<Move>>,
    /// Presentation slot -> seat, reshuffled on every reveal.
    order: Vec<usize>,
    /// Voter seats per presentation slot.
    votes: Vec<HashSet<usize>>,
    done_voting: HashSet<usize>,
    points: Vec<u32>,
    gained: Vec<u32>,
    discards: Vec<u32>,
    won: bool,
    standings: Option<Vec<RankedSeat>>,
    pub timer: RoundTimer,
}

impl Round {
    pub const MIN_PLAYERS: usize = 2;

    pub fn new<R: Rng + ?Sized>(
        seats: usize,
        settings: GameSettings,
        content: &ContentSnapshot,
        rng: &mut R,
    ) -> Result<(Self, usize), GameError> {
        if seats < Self::MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers(Self::MIN_PLAYERS));
        }
        settings.validate()?;
        let deal = Dealer::deal_initial_hands(seats, &settings, content, rng);
        let round = Self {
            policy: ScoringPolicy::for_round(settings.scoring, 1, seats),
            settings,
            phase: Phase::Move,
            round_number: 1,
            prompt: deal.prompt,
            hands: deal.hands,
            piles: deal.piles,
            plays: vec![None; seats],
            order: Vec::new(),
            votes: Vec::new(),
            done_voting: HashSet::new(),
            points: vec![0; seats],
            gained: vec![0; seats],
            discards: vec![0; seats],
            won: false,
            standings: None,
            timer: RoundTimer::default(),
        };
        Ok((round, deal.shortfall))
    }

    // Accessors

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn prompt(&self) -> Option<&Visual> {
        self.prompt.as_ref()
    }

    pub fn seats(&self) -> usize {
        self.plays.len()
    }

    pub fn hand(&self, seat: usize) -> Option<&Hand> {
        self.hands.get(seat)
    }

    pub fn play(&self, seat: usize) -> Option<&Move> {
        self.plays.get(seat).and_then(Option::as_ref)
    }

    pub fn has_played(&self) -> Vec<bool> {
        self.plays.iter().map(Option::is_some).collect()
    }

    pub fn points(&self) -> &[u32] {
        &self.points
    }

    pub fn gained(&self) -> &[u32] {
        &self.gained
    }

    pub fn has_winner(&self) -> bool {
        self.won
    }

    pub fn is_finished(&self) -> bool {
        self.standings.is_some()
    }

    pub fn standings(&self) -> Option<&[RankedSeat]> {
        self.standings.as_deref()
    }

    /// Revealed plays in presentation order as `(slot, seat, move)`.
    pub fn slots(&self) -> impl Iterator<Item = (usize, usize, &Move)> {
        self.order
            .iter()
            .enumerate()
            .filter_map(|(slot, &seat)| self.plays[seat].as_ref().map(|m| (slot, seat, m)))
    }

    pub fn slot_votes(&self, slot: usize) -> usize {
        self.votes.get(slot).map_or(0, HashSet::len)
    }

    /// Slots the seat currently approves of.
    pub fn votes_of(&self, seat: usize) -> Vec<usize> {
        self.votes
            .iter()
            .enumerate()
            .filter(|(_, voters)| voters.contains(&seat))
            .map(|(slot, _)| slot)
            .collect()
    }

    pub fn discards_left(&self, seat: usize) -> u32 {
        self.settings
            .discards_per_round
            .saturating_sub(self.discards.get(seat).copied().unwrap_or(0))
    }

    // Move phase

    pub fn submit_move<R: Rng + ?Sized>(
        &mut self,
        seat: usize,
        request: &MoveRequest,
        rng: &mut R,
    ) -> Result<MoveOutcome, GameError> {
        self.expect_phase(Phase::Move)?;
        if !self.policy.eligible_to_play(seat) {
            return Err(GameError::NotYourTurn);
        }
        if self.play(seat).is_some() {
            return Err(GameError::AlreadyPlayed);
        }
        let hand = self.hands.get(seat).ok_or(GameError::PlayerNotInRoom)?;

        let mut picked: Vec<(Side, usize, Card)> = Vec::new();
        for side in Side::BOTH {
            let Some(choice) = request.side(side) else {
                if !self.settings.omit_allowed(side) {
                    return Err(GameError::SideRequired(side.name()));
                }
                continue;
            };
            let cards = hand.side(side);
            let card = if choice.id == Card::BLANK_ID {
                let text = normalize_blank_text(choice.text.as_deref().unwrap_or_default());
                if text.is_empty() {
                    return Err(GameError::BlankTextRequired);
                }
                let index = cards
                    .iter()
                    .position(Card::is_blank)
                    .ok_or(GameError::CardNotInHand)?;
                (index, Card {
                    id: Card::BLANK_ID,
                    text,
                })
            } else {
                let index = cards
                    .iter()
                    .position(|c| c.id == choice.id)
                    .ok_or(GameError::CardNotInHand)?;
                (index, cards[index].clone())
            };
            picked.push((side, card.0, card.1));
        }
        if picked.is_empty() {
            return Err(GameError::SideRequired(Side::Top.name()));
        }

        // Everything checked, apply.
        let hand = &mut self.hands[seat];
        let mut accepted = Move {
            top: None,
            bottom: None,
        };
        for (side, index, card) in picked {
            hand.side_mut(side).remove(index);
            match side {
                Side::Top => accepted.top = Some(card),
                Side::Bottom => accepted.bottom = Some(card),
            }
        }
        self.plays[seat] = Some(accepted.clone());

        let transition = if self.all_moves_in() {
            Some(self.reveal(rng))
        } else {
            None
        };
        Ok(MoveOutcome {
            accepted,
            transition,
        })
    }

    pub fn discard<R: Rng + ?Sized>(
        &mut self,
        seat: usize,
        side: Side,
        card_id: i64,
        rng: &mut R,
    ) -> Result<(), GameError> {
        self.expect_phase(Phase::Move)?;
        if self.play(seat).is_some() {
            return Err(GameError::AlreadyPlayed);
        }
        if self.discards_left(seat) == 0 {
            return Err(GameError::NoDiscardsLeft);
        }
        let hand = self.hands.get_mut(seat).ok_or(GameError::PlayerNotInRoom)?;
        let index = hand
            .side(side)
            .iter()
            .position(|c| c.id == card_id)
            .ok_or(GameError::CardNotInHand)?;

        hand.side_mut(side).remove(index);
        self.discards[seat] += 1;
        Dealer::replenish(
            hand.side_mut(side),
            &self.settings,
            self.piles.side_mut(side),
            rng,
        );
        Ok(())
    }

    fn all_moves_in(&self) -> bool {
        let missing = self.plays.iter().filter(|p| p.is_none()).count();
        missing <= self.policy.exempt_players()
    }

    // Vote phase

    pub fn cast_vote(&mut self, seat: usize, slot: usize, approve: bool) -> Result<(), GameError> {
        self.expect_phase(Phase::Vote)?;
        if !self.policy.is_voter(seat) {
            return Err(GameError::NotYourTurn);
        }
        let owner = *self.order.get(slot).ok_or(GameError::InvalidVote(slot))?;
        if !self.policy.eligible_to_vote(seat, owner) {
            return Err(GameError::SelfVoteForbidden);
        }

        if let ScoringPolicy::Judge { .. } = self.policy {
            // A judge holds exactly one pick at a time.
            for voters in &mut self.votes {
                voters.remove(&seat);
            }
        }
        if approve {
            self.votes[slot].insert(seat);
        } else {
            self.votes[slot].remove(&seat);
        }
        Ok(())
    }

    pub fn done_voting(&mut self, seat: usize) -> Result<DoneVoting, GameError> {
        self.expect_phase(Phase::Vote)?;
        if !self.policy.is_voter(seat) {
            return Err(GameError::NotYourTurn);
        }
        self.done_voting.insert(seat);
        let eligible = self.policy.voters(self.seats()).len();
        let done = self.done_voting.len();
        let transition = (done >= eligible).then(|| self.tally());
        Ok(DoneVoting {
            done,
            eligible,
            transition,
        })
    }

    // Transitions

    /// Timer expiry (or a forced skip) for whatever phase the round is in.
    /// Returns `None` once the game has finished.
    pub fn expire<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Transition> {
        if self.is_finished() {
            return None;
        }
        Some(match self.phase {
            Phase::Move => self.reveal(rng),
            Phase::Vote => self.tally(),
            Phase::Standings => self.advance(rng),
        })
    }

    fn reveal<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Transition {
        let mut order: Vec<usize> = (0..self.seats())
            .filter(|&seat| self.plays[seat].is_some())
            .collect();
        order.shuffle(rng);
        self.votes = vec![HashSet::new(); order.len()];
        self.order = order;
        self.done_voting.clear();
        self.phase = Phase::Vote;
        debug!(
            "Round {} revealed {} plays",
            self.round_number,
            self.order.len()
        );
        if self.order.is_empty() {
            return self.tally();
        }
        Transition::Vote
    }

    /// Closes voting. Voters who cast nothing are counted as approving every
    /// play they were allowed to vote for (tacit approval), so abstaining
    /// never hurts anyone's chances.
    fn tally(&mut self) -> Transition {
        for voter in self.policy.voters(self.seats()) {
            if self.votes.iter().any(|v| v.contains(&voter)) {
                continue;
            }
            for (slot, &owner) in self.order.iter().enumerate() {
                if self.policy.eligible_to_vote(voter, owner) {
                    self.votes[slot].insert(voter);
                }
            }
        }

        let awarded = award_points(&self.votes, self.settings.point_rule);
        self.gained = vec![0; self.seats()];
        for (slot, &seat) in self.order.iter().enumerate() {
            self.gained[seat] += awarded[slot];
            self.points[seat] += awarded[slot];
        }
        self.won = match self.settings.win_condition {
            WinCondition::Points(n) => self.points.iter().any(|&p| p >= n),
            WinCondition::Rounds(n) => self.round_number >= n,
        };
        self.phase = Phase::Standings;
        Transition::Standings
    }

    fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Transition {
        if self.won {
            self.standings = Some(rank_seats(&self.points));
            return Transition::Finished;
        }

        let mut shortfall = 0;
        for hand in &mut self.hands {
            for side in Side::BOTH {
                shortfall += Dealer::replenish(
                    hand.side_mut(side),
                    &self.settings,
                    self.piles.side_mut(side),
                    rng,
                );
            }
        }
        if let Some(prompt) = Dealer::draw_prompt(&mut self.piles) {
            self.prompt = Some(prompt);
        }
        self.round_number += 1;
        self.policy = ScoringPolicy::for_round(self.settings.scoring, self.round_number, self.seats());
        self.plays = vec![None; self.seats()];
        self.order.clear();
        self.votes.clear();
        self.done_voting.clear();
        self.gained = vec![0; self.seats()];
        self.discards = vec![0; self.seats()];
        self.phase = Phase::Move;
        Transition::NextRound { shortfall }
    }

    fn expect_phase(&self, phase: Phase) -> Result<(), GameError> {
        if self.is_finished() || self.phase != phase {
            return Err(GameError::wrong_phase(self.phase));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self, seats: usize) -> bool {
        self.plays.len() == seats
            && self.hands.len() == seats
            && self.points.len() == seats
            && self.votes.len() == self.order.len()
            && self
                .order
                .iter()
                .enumerate()
                .all(|(slot, &owner)| !self.votes[slot].contains(&owner))
    }
}

/// Trims and collapses whitespace, capped at `MAX_BLANK_TEXT` characters.
pub fn normalize_blank_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_BLANK_TEXT)
        .collect()
}
