//! Swap Negotiation
//!
//! A player may propose exchanging two occupied slots; the other player
//! accepts or rejects. Each player gets at most one accepted swap per game.
//!
//! Proposals are open to either player during placement and do not cost a
//! turn there. In the swap phase only the current player may propose or
//! skip, and each resolved proposal or skip completes one of the two swap
//! turns. Players whose allowance is spent are skipped automatically.

use serde::{Deserialize, Serialize};

use crate::game::error::GameError;
use crate::game::placement::TurnOutcome;
use crate::game::state::{Game, Phase, PlayerNumber, BOARD_SIZE};

/// Number of swap turns before reveal.
pub const SWAP_TURNS: u8 = 2;

/// Outstanding swap proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapProposal {
    /// Lower slot index.
    pub slot_a: usize,
    /// Higher slot index.
    pub slot_b: usize,
    /// Proposing player.
    pub proposer: PlayerNumber,
    /// Phase the proposal was made in.
    pub phase: Phase,
}

/// An accepted swap, kept for client-side annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecord {
    /// Lower slot index.
    pub slot_a: usize,
    /// Higher slot index.
    pub slot_b: usize,
    /// Player whose proposal was accepted.
    pub by_player: PlayerNumber,
}

/// Swap bookkeeping for one game.
#[derive(Clone, Debug, Default)]
pub struct SwapState {
    pending: Option<SwapProposal>,
    turns_completed: u8,
    accepted: [bool; 2],
    history: Vec<SwapRecord>,
}

impl SwapState {
    /// The outstanding proposal, if any.
    pub fn pending(&self) -> Option<&SwapProposal> {
        self.pending.as_ref()
    }

    /// Swap turns completed in the swap phase.
    pub fn turns_completed(&self) -> u8 {
        self.turns_completed
    }

    /// Whether a player's one accepted swap is spent.
    pub fn allowance_used(&self, player: PlayerNumber) -> bool {
        self.accepted[player.index()]
    }

    /// Accepted swaps in order.
    pub fn history(&self) -> &[SwapRecord] {
        &self.history
    }

    pub(super) fn clear_pending(&mut self) {
        self.pending = None;
    }
}

/// Result of answering a proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapResponse {
    /// The proposal that was answered.
    pub proposal: SwapProposal,
    /// Accepted swap, if the answer was yes.
    pub accepted: Option<SwapRecord>,
    /// Turn state, if the answer completed a swap turn.
    pub advanced: Option<TurnOutcome>,
}

impl Game {
    /// Propose exchanging two occupied slots.
    pub fn propose_swap(
        &mut self,
        player: PlayerNumber,
        slot_a: usize,
        slot_b: usize,
    ) -> Result<SwapProposal, GameError> {
        self.require_swaps_open()?;
        if self.phase == Phase::Swap && self.current_turn != player {
            return Err(GameError::NotYourTurn);
        }
        if self.swap.pending.is_some() {
            return Err(GameError::SwapPending);
        }
        if self.swap.accepted[player.index()] {
            return Err(GameError::SwapAlreadyUsed);
        }
        if slot_a >= BOARD_SIZE || slot_b >= BOARD_SIZE {
            return Err(GameError::InvalidSlotIndex);
        }
        if slot_a == slot_b {
            return Err(GameError::SameSlot);
        }

        let (slot_a, slot_b) = (slot_a.min(slot_b), slot_a.max(slot_b));
        if !self.board.is_occupied(slot_a) || !self.board.is_occupied(slot_b) {
            return Err(GameError::SwapSlotEmpty);
        }

        let proposal = SwapProposal {
            slot_a,
            slot_b,
            proposer: player,
            phase: self.phase,
        };
        self.swap.pending = Some(proposal);
        Ok(proposal)
    }

    /// Answer the outstanding proposal. Only the other player may respond.
    pub fn respond_swap(
        &mut self,
        player: PlayerNumber,
        accept: bool,
    ) -> Result<SwapResponse, GameError> {
        self.require_swaps_open()?;
        let proposal = self.swap.pending.ok_or(GameError::NoSwapPending)?;
        if proposal.proposer == player {
            return Err(GameError::OwnProposal);
        }

        let accepted = accept.then(|| {
            self.board.swap(proposal.slot_a, proposal.slot_b);
            self.swap.accepted[proposal.proposer.index()] = true;
            let record = SwapRecord {
                slot_a: proposal.slot_a,
                slot_b: proposal.slot_b,
                by_player: proposal.proposer,
            };
            self.swap.history.push(record);
            record
        });
        self.swap.pending = None;

        let advanced = (self.phase == Phase::Swap && proposal.phase == Phase::Swap).then(|| {
            self.advance_swap();
            self.settle()
        });

        Ok(SwapResponse {
            proposal,
            accepted,
            advanced,
        })
    }

    /// Decline to propose, spending the current swap turn.
    pub fn skip_swap(&mut self, player: PlayerNumber) -> Result<TurnOutcome, GameError> {
        self.require_phase(Phase::Swap)?;
        self.require_turn(player)?;
        if self.swap.pending.is_some() {
            return Err(GameError::SwapPending);
        }

        self.advance_swap();
        Ok(self.settle())
    }

    fn require_swaps_open(&self) -> Result<(), GameError> {
        match self.phase {
            Phase::Placement | Phase::Swap => Ok(()),
            _ => Err(GameError::SwapsClosed),
        }
    }

    /// Complete one swap turn.
    fn advance_swap(&mut self) {
        self.swap.turns_completed += 1;
        if self.swap.turns_completed >= SWAP_TURNS {
            self.phase = Phase::Reveal;
            return;
        }

        self.current_turn = self.current_turn.other();
        self.auto_skip_swaps();
    }

    /// Skip swap turns of players whose allowance is already spent.
    pub(super) fn auto_skip_swaps(&mut self) {
        while self.phase == Phase::Swap && self.swap.turns_completed < SWAP_TURNS {
            if !self.swap.accepted[self.current_turn.index()] {
                return;
            }

            self.swap.turns_completed += 1;
            if self.swap.turns_completed >= SWAP_TURNS {
                self.phase = Phase::Reveal;
                return;
            }
            self.current_turn = self.current_turn.other();
        }
    }
}
