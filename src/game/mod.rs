//! Game Logic Module
//!
//! The state machine for one session: deal, turn-order negotiation,
//! placement, swap negotiation and reveal. Nothing here touches the
//! network or a lock; the room layer serializes access.
//!
//! ## Module Structure
//!
//! - `state`: Phase, player numbering, hands, board and [`Game`]
//! - `turn_order`: Preference picks and their resolution
//! - `placement`: Placing cards, the pass, peeking, turn advance
//! - `swap`: Proposals, responses, skips, swap-turn advance
//! - `reveal`: Finalization and the win check
//! - `error`: Rejections

pub mod error;
pub mod placement;
pub mod reveal;
pub mod state;
pub mod swap;
pub mod turn_order;

// Re-export key types
pub use error::GameError;
pub use placement::TurnOutcome;
pub use reveal::{check_win, reveal_order, RevealEntry, RevealOutcome};
pub use state::{deal, Board, Game, Hand, Phase, PlacedCard, PlayerNumber, BOARD_SIZE, HAND_SIZE};
pub use swap::{SwapProposal, SwapRecord, SwapResponse, SwapState};
pub use turn_order::{resolve, PickOutcome, Preference, Resolution};
