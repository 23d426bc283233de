//! Game Errors
//!
//! Every rejection the state machine can produce. Rejections are raised
//! before any mutation, so a failed command leaves the game untouched.
//! The `Display` text is what the offending peer sees.

use thiserror::Error;

use crate::core::rng::RngError;
use crate::game::state::Phase;

/// Rejected game command.
#[derive(Debug, Error)]
pub enum GameError {
    /// Command is not valid in the current phase.
    #[error("not in {expected} phase")]
    WrongPhase {
        /// Phase the command needs.
        expected: Phase,
    },

    /// Swap commands outside placement and swap.
    #[error("swaps not allowed in this phase")]
    SwapsClosed,

    /// Another player holds the turn.
    #[error("not your turn")]
    NotYourTurn,

    /// Turn-order preference already submitted this round.
    #[error("already picked")]
    AlreadyPicked,

    /// Hand index outside 0..7.
    #[error("invalid card index")]
    InvalidCardIndex,

    /// Hand card already on the board.
    #[error("card already placed")]
    CardAlreadyPlaced,

    /// Board index outside 0..15.
    #[error("invalid slot index")]
    InvalidSlotIndex,

    /// Target slot already holds a card.
    #[error("slot already occupied")]
    SlotOccupied,

    /// Target slot holds no card.
    #[error("slot is empty")]
    SlotEmpty,

    /// Per-game pass already spent.
    #[error("pass already used")]
    PassAlreadyUsed,

    /// Peek at a card placed by the other player.
    #[error("not your card")]
    NotYourCard,

    /// A proposal is already outstanding.
    #[error("a swap is already pending")]
    SwapPending,

    /// Response or skip with nothing to respond to.
    #[error("no swap pending")]
    NoSwapPending,

    /// Proposer already had a swap accepted this game.
    #[error("you have already used your swap")]
    SwapAlreadyUsed,

    /// Both proposal slots are the same.
    #[error("slots must be different")]
    SameSlot,

    /// Proposal slots must both hold cards.
    #[error("both slots must be occupied")]
    SwapSlotEmpty,

    /// Proposer tried to answer their own proposal.
    #[error("cannot respond to your own swap")]
    OwnProposal,

    /// Randomness failed while dealing or breaking a tie.
    #[error("failed to start game: {0}")]
    Rng(#[from] RngError),
}
