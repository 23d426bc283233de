//! Reveal and Scoring
//!
//! Once both swap turns are done the board is read left to right, empty
//! slots skipped. The players win together when every card's sort index
//! is strictly greater than the one before it.

use serde::{Deserialize, Serialize};

use crate::core::card::Card;
use crate::game::state::{Board, Game, Phase};

/// One revealed slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealEntry {
    /// Board slot, 0..15.
    pub slot_index: usize,
    /// Card in that slot.
    pub card: Card,
}

/// Final board and verdict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealOutcome {
    /// Occupied slots in ascending slot order.
    pub entries: Vec<RevealEntry>,
    /// Whether the board was strictly ascending.
    pub win: bool,
}

/// Occupied slots in reveal order.
pub fn reveal_order(board: &Board) -> Vec<RevealEntry> {
    board
        .occupied()
        .map(|(slot_index, placed)| RevealEntry {
            slot_index,
            card: placed.card,
        })
        .collect()
}

/// Strictly ascending by sort index, ignoring empty slots.
pub fn check_win(board: &Board) -> bool {
    let indices: Vec<u8> = board.occupied().map(|(_, p)| p.card.sort_index()).collect();
    indices.windows(2).all(|w| w[0] < w[1])
}

impl Game {
    /// Score the board and end the game.
    ///
    /// Only acts in [`Phase::Reveal`]; later calls return `None`, so the
    /// outcome is produced exactly once per game.
    pub fn finalize_reveal(&mut self) -> Option<RevealOutcome> {
        if self.phase != Phase::Reveal {
            return None;
        }

        let outcome = RevealOutcome {
            entries: reveal_order(&self.board),
            win: check_win(&self.board),
        };
        self.phase = Phase::GameOver;
        self.swap.clear_pending();
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    /// Outcome of a finished game.
    pub fn outcome(&self) -> Option<&RevealOutcome> {
        self.outcome.as_ref()
    }
}
