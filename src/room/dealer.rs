use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

use super::Side;
use crate::content::{Card, ContentSnapshot, Visual};
use crate::settings::{GameSettings, MAX_HAND_SIZE};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hand {
    pub top: Vec<Card>,
    pub bottom: Vec<Card>,
}

impl Hand {
    pub fn side(&self, side: Side) -> &Vec<Card> {
        match side {
            Side::Top => &self.top,
            Side::Bottom => &self.bottom,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec<Card> {
        match side {
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
        }
    }
}

/// Shuffled draw piles for one room. Consumed from the front, never refilled.
#[derive(Debug, Clone, Default)]
pub struct Piles {
    pub top: VecDeque<Card>,
    pub bottom: VecDeque<Card>,
    pub visuals: VecDeque<Visual>,
}

impl Piles {
    pub fn side_mut(&mut self, side: Side) -> &mut VecDeque<Card> {
        match side {
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
        }
    }
}

pub struct Deal {
    pub piles: Piles,
    pub hands: Vec<Hand>,
    pub prompt: Option<Visual>,
    /// Cards that could not be dealt because a pile ran dry.
    pub shortfall: usize,
}

pub struct Dealer;

impl Dealer {
    pub fn shuffle_piles<R: Rng + ?Sized>(content: &ContentSnapshot, rng: &mut R) -> Piles {
        let mut top = content.top.clone();
        let mut bottom = content.bottom.clone();
        let mut visuals = content.visuals.clone();
        top.shuffle(rng);
        bottom.shuffle(rng);
        visuals.shuffle(rng);
        Piles {
            top: top.into(),
            bottom: bottom.into(),
            visuals: visuals.into(),
        }
    }

    pub fn deal_initial_hands<R: Rng + ?Sized>(
        seats: usize,
        settings: &GameSettings,
        content: &ContentSnapshot,
        rng: &mut R,
    ) -> Deal {
        let mut piles = Self::shuffle_piles(content, rng);
        let mut shortfall = 0;
        let hands = (0..seats)
            .map(|_| {
                let mut hand = Hand::default();
                for side in Side::BOTH {
                    shortfall += Self::replenish(
                        hand.side_mut(side),
                        settings,
                        piles.side_mut(side),
                        rng,
                    );
                }
                hand
            })
            .collect();
        let prompt = Self::draw_prompt(&mut piles);
        Deal {
            piles,
            hands,
            prompt,
            shortfall,
        }
    }

    /// Tops `hand` back up to the hand size. Only newly drawn slots may turn
    /// into blanks; cards already held are left alone. Returns how many slots
    /// stayed empty because the pile ran out.
    pub fn replenish<R: Rng + ?Sized>(
        hand: &mut Vec<Card>,
        settings: &GameSettings,
        pile: &mut VecDeque<Card>,
        rng: &mut R,
    ) -> usize {
        let target = settings.hand_size.min(MAX_HAND_SIZE);
        while hand.len() < target {
            if pile.is_empty() {
                break;
            }
            if settings.blanks > 0.0 && rng.random_bool(settings.blanks) {
                hand.push(Card::blank());
            } else if let Some(card) = pile.pop_front() {
                hand.push(card);
            }
        }
        let missing = target.saturating_sub(hand.len());
        if missing > 0 {
            warn!("Pile exhausted, hand is {} card(s) short", missing);
        }
        missing
    }

    pub fn draw_prompt(piles: &mut Piles) -> Option<Visual> {
        let prompt = piles.visuals.pop_front();
        if prompt.is_none() {
            warn!("Prompt pile exhausted");
        }
        prompt
    }
}
