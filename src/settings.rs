use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::GameError;

/// Largest hand a room may deal.
pub const MAX_HAND_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoringStyle {
    /// One rotating judge picks the winning play.
    #[serde(rename = "tzar")]
    Tzar,
    /// Everybody votes on every play except their own.
    #[serde(rename = "vote")]
    Vote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "n")]
pub enum WinCondition {
    #[serde(rename = "points")]
    Points(u32),
    #[serde(rename = "rounds")]
    Rounds(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointRule {
    /// Every play tied for the most votes earns its author one point.
    #[serde(rename = "winners")]
    Winners,
    /// Every vote received is worth one point.
    #[serde(rename = "votes")]
    Votes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowOmit {
    pub top: bool,
    pub bottom: bool,
}

/// Phase timer lengths in seconds. `None` disables auto-advance for that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimers {
    #[serde(rename = "move")]
    pub move_secs: Option<u64>,
    #[serde(rename = "vote")]
    pub vote_secs: Option<u64>,
    #[serde(rename = "standings")]
    pub standings_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub hand_size: usize,
    pub discards_per_round: u32,
    pub allow_omit: AllowOmit,
    pub scoring: ScoringStyle,
    pub win_condition: WinCondition,
    pub timers: PhaseTimers,
    pub blanks: f64,
    pub point_rule: PointRule,
    pub max_players: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        ScoringStyle::Vote.default_settings()
    }
}

impl ScoringStyle {
    pub fn default_settings(&self) -> GameSettings {
        GameSettings {
            hand_size: 7,
            discards_per_round: 0,
            allow_omit: AllowOmit {
                top: false,
                bottom: false,
            },
            scoring: *self,
            win_condition: WinCondition::Points(5),
            timers: PhaseTimers {
                move_secs: Some(90),
                vote_secs: Some(45),
                standings_secs: Some(10),
            },
            blanks: 0.1,
            point_rule: PointRule::Winners,
            max_players: 8,
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.hand_size == 0 || self.hand_size > MAX_HAND_SIZE {
            return Err(GameError::InvalidSettings(format!(
                "hand size must be between 1 and {MAX_HAND_SIZE}"
            )));
        }
        if !(0.0..=1.0).contains(&self.blanks) {
            return Err(GameError::InvalidSettings(
                "blanks must be between 0 and 1".into(),
            ));
        }
        let n = match self.win_condition {
            WinCondition::Points(n) | WinCondition::Rounds(n) => n,
        };
        if n == 0 {
            return Err(GameError::InvalidSettings("win target must be positive".into()));
        }
        if self.max_players < 2 {
            return Err(GameError::InvalidSettings(
                "a room needs room for at least 2 players".into(),
            ));
        }
        Ok(())
    }

    pub fn omit_allowed(&self, side: crate::room::Side) -> bool {
        match side {
            crate::room::Side::Top => self.allow_omit.top,
            crate::room::Side::Bottom => self.allow_omit.bottom,
        }
    }
}

impl PhaseTimers {
    pub fn for_phase(&self, phase: crate::room::Phase) -> Option<Duration> {
        let secs = match phase {
            crate::room::Phase::Move => self.move_secs,
            crate::room::Phase::Vote => self.vote_secs,
            crate::room::Phase::Standings => self.standings_secs,
        };
        secs.map(Duration::from_secs)
    }
}

impl std::fmt::Display for ScoringStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringStyle::Tzar => write!(f, "Tzar"),
            ScoringStyle::Vote => write!(f, "Vote"),
        }
    }
}
