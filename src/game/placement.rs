//! Placement Phase
//!
//! Placing cards, the single per-game pass, private peeks, and the turn
//! advance that hands over to the swap phase after the 14th card.

use crate::core::card::Card;
use crate::game::error::GameError;
use crate::game::reveal::RevealOutcome;
use crate::game::state::{
    Game, Phase, PlacedCard, PlayerNumber, BOARD_SIZE, HAND_SIZE, TOTAL_PLACEMENTS,
};

/// Where the game stands after a turn-consuming action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Placement continues with this player.
    Placement(PlayerNumber),
    /// Swap phase, this player's swap turn.
    Swap(PlayerNumber),
    /// Reveal finalized; the game is over.
    Finished(RevealOutcome),
}

impl Game {
    /// Place a card from the player's hand onto an empty slot.
    pub fn place_card(
        &mut self,
        player: PlayerNumber,
        card_index: usize,
        slot: usize,
    ) -> Result<TurnOutcome, GameError> {
        self.require_phase(Phase::Placement)?;
        self.require_turn(player)?;

        if card_index >= HAND_SIZE {
            return Err(GameError::InvalidCardIndex);
        }
        let hand = &self.hands[player.index()];
        if hand.is_used(card_index) {
            return Err(GameError::CardAlreadyPlaced);
        }
        if slot >= BOARD_SIZE {
            return Err(GameError::InvalidSlotIndex);
        }
        if self.board.is_occupied(slot) {
            return Err(GameError::SlotOccupied);
        }

        let card = self.hands[player.index()].take(card_index);
        self.board.place(slot, PlacedCard { card, owner: player });
        self.placed[player.index()] += 1;

        Ok(self.advance_turn())
    }

    /// Spend the player's one pass.
    pub fn use_pass(&mut self, player: PlayerNumber) -> Result<TurnOutcome, GameError> {
        self.require_phase(Phase::Placement)?;
        self.require_turn(player)?;

        if self.pass_used[player.index()] {
            return Err(GameError::PassAlreadyUsed);
        }

        self.pass_used[player.index()] = true;
        Ok(self.advance_turn())
    }

    /// Look at a card the player placed. Does not consume a turn.
    pub fn peek(&self, player: PlayerNumber, slot: usize) -> Result<Card, GameError> {
        self.require_phase(Phase::Placement)?;

        if slot >= BOARD_SIZE {
            return Err(GameError::InvalidSlotIndex);
        }
        let placed = self.board.get(slot).ok_or(GameError::SlotEmpty)?;
        if placed.owner != player {
            return Err(GameError::NotYourCard);
        }

        Ok(placed.card)
    }

    /// Whether both hands are on the board.
    pub fn all_cards_placed(&self) -> bool {
        self.placed.iter().map(|&n| n as u16).sum::<u16>() == TOTAL_PLACEMENTS as u16
    }

    /// Hand the turn over, or open the swap phase after the last card.
    ///
    /// A player with an empty hand is skipped so the other can finish.
    fn advance_turn(&mut self) -> TurnOutcome {
        if self.all_cards_placed() {
            self.phase = Phase::Swap;
            self.current_turn = self.first_player.unwrap_or(PlayerNumber::One);
            self.auto_skip_swaps();
            return self.settle();
        }

        let next = self.current_turn.other();
        if self.hands[next.index()].remaining() > 0 {
            self.current_turn = next;
        }

        self.settle()
    }

    /// Describe the state after an advance, finalizing the reveal once.
    pub(super) fn settle(&mut self) -> TurnOutcome {
        if let Some(outcome) = self.finalize_reveal() {
            return TurnOutcome::Finished(outcome);
        }

        match self.phase {
            Phase::Swap => TurnOutcome::Swap(self.current_turn),
            _ => TurnOutcome::Placement(self.current_turn),
        }
    }
}
