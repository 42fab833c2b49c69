pub mod broadcaster;
pub mod dealer;
pub mod handlers;
pub mod room;
pub mod round;
pub mod scoring;
pub mod task;
pub mod timer;
pub mod view;

use serde::{Deserialize, Serialize};

// Re-export the main types for easy access
pub use round::{Move, MoveRequest, Phase, Round, Transition};
pub use task::room_task;

/// Which half of the caption a card fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Top, Side::Bottom];

    pub fn name(&self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }
}
