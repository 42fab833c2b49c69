use std::collections::HashSet;

use crate::settings::{PointRule, ScoringStyle};
use crate::utils::ordinal;

/// Who may play and who may vote in a given round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPolicy {
    Judge { judge: usize },
    OpenVote,
}

impl ScoringPolicy {
    /// The judge rotates one seat per round, starting at seat 0.
    pub fn for_round(style: ScoringStyle, round_number: u32, seats: usize) -> Self {
        match style {
            ScoringStyle::Tzar => ScoringPolicy::Judge {
                judge: (round_number.saturating_sub(1) as usize) % seats.max(1),
            },
            ScoringStyle::Vote => ScoringPolicy::OpenVote,
        }
    }

    pub fn judge(&self) -> Option<usize> {
        match self {
            ScoringPolicy::Judge { judge } => Some(*judge),
            ScoringPolicy::OpenVote => None,
        }
    }

    pub fn eligible_to_play(&self, seat: usize) -> bool {
        match self {
            ScoringPolicy::Judge { judge } => seat != *judge,
            ScoringPolicy::OpenVote => true,
        }
    }

    pub fn is_voter(&self, seat: usize) -> bool {
        match self {
            ScoringPolicy::Judge { judge } => seat == *judge,
            ScoringPolicy::OpenVote => true,
        }
    }

    pub fn eligible_to_vote(&self, seat: usize, slot_owner: usize) -> bool {
        self.is_voter(seat) && seat != slot_owner
    }

    /// Seats that never owe a play.
    pub fn exempt_players(&self) -> usize {
        match self {
            ScoringPolicy::Judge { .. } => 1,
            ScoringPolicy::OpenVote => 0,
        }
    }

    pub fn voters(&self, seats: usize) -> Vec<usize> {
        (0..seats).filter(|&seat| self.is_voter(seat)).collect()
    }
}

/// Points earned by each presentation slot given its vote set.
pub fn award_points(votes: &[HashSet<usize>], rule: PointRule) -> Vec<u32> {
    let counts: Vec<u32> = votes.iter().map(|v| v.len() as u32).collect();
    match rule {
        PointRule::Votes => counts,
        PointRule::Winners => {
            let top = counts.iter().copied().max().unwrap_or(0);
            counts
                .iter()
                .map(|&count| u32::from(top > 0 && count == top))
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSeat {
    pub seat: usize,
    pub points: u32,
    pub rank: String,
}

/// Orders seats by points, highest first. Equal points share a rank and the
/// next distinct score skips past them (1st, 1st, 3rd).
pub fn rank_seats(points: &[u32]) -> Vec<RankedSeat> {
    let mut seats: Vec<usize> = (0..points.len()).collect();
    seats.sort_by(|&a, &b| points[b].cmp(&points[a]).then(a.cmp(&b)));
    seats
        .into_iter()
        .map(|seat| {
            let ahead = points.iter().filter(|&&p| p > points[seat]).count();
            RankedSeat {
                seat,
                points: points[seat],
                rank: ordinal(ahead + 1),
            }
        })
        .collect()
}
