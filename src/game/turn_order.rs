//! Turn-Order Negotiation
//!
//! Each player submits one preference. Once both are in, [`resolve`]
//! decides who places first, or reports a conflict that sends both
//! players back to pick again without leaving the phase.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::rng::coin_flip;
use crate::game::error::GameError;
use crate::game::state::{Game, Phase, PlayerNumber};

/// Turn-order preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// Wants to place first.
    First,
    /// No preference.
    Neutral,
    /// Wants the other player to place first.
    NoFirst,
}

/// Result of comparing two preferences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Both asked for the same extreme; pick again.
    Conflict,
    /// The given player goes first.
    Decided(PlayerNumber),
    /// Both neutral; a coin flip decides.
    CoinFlip,
}

/// Resolve a pair of picks (player 1's, player 2's).
pub fn resolve(pick1: Preference, pick2: Preference) -> Resolution {
    use Preference::*;

    match (pick1, pick2) {
        (First, First) | (NoFirst, NoFirst) => Resolution::Conflict,
        (First, _) => Resolution::Decided(PlayerNumber::One),
        (_, First) => Resolution::Decided(PlayerNumber::Two),
        (NoFirst, _) => Resolution::Decided(PlayerNumber::Two),
        (_, NoFirst) => Resolution::Decided(PlayerNumber::One),
        (Neutral, Neutral) => Resolution::CoinFlip,
    }
}

/// What a submitted pick led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickOutcome {
    /// Waiting for the other player.
    Waiting,
    /// Same extreme picked twice; both picks were cleared.
    Conflict {
        /// Picks as submitted, player 1 first.
        picks: [Preference; 2],
    },
    /// Placement begins with `first`.
    Decided {
        /// Picks as submitted, player 1 first.
        picks: [Preference; 2],
        /// Player who places first.
        first: PlayerNumber,
    },
}

impl Game {
    /// Record a player's preference and resolve once both are present.
    ///
    /// The coin flip for a neutral pair is drawn before anything is
    /// recorded, so a randomness failure leaves the picks untouched.
    pub fn submit_pick<R: RngCore + ?Sized>(
        &mut self,
        player: PlayerNumber,
        preference: Preference,
        rng: &mut R,
    ) -> Result<PickOutcome, GameError> {
        self.require_phase(Phase::TurnOrderPick)?;
        if self.picks[player.index()].is_some() {
            return Err(GameError::AlreadyPicked);
        }

        let Some(other) = self.picks[player.other().index()] else {
            self.picks[player.index()] = Some(preference);
            return Ok(PickOutcome::Waiting);
        };

        let mut picks = [preference; 2];
        picks[player.other().index()] = other;

        let first = match resolve(picks[0], picks[1]) {
            Resolution::Conflict => {
                self.picks = [None; 2];
                debug!(?picks, "turn order conflict");
                return Ok(PickOutcome::Conflict { picks });
            }
            Resolution::Decided(first) => first,
            Resolution::CoinFlip => {
                if coin_flip(rng)? {
                    PlayerNumber::Two
                } else {
                    PlayerNumber::One
                }
            }
        };

        self.picks = [Some(picks[0]), Some(picks[1])];
        self.first_player = Some(first);
        self.current_turn = first;
        self.phase = Phase::Placement;

        Ok(PickOutcome::Decided { picks, first })
    }
}
