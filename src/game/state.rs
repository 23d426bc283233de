//! Game State Definitions
//!
//! Phase, player numbering, hands, board and the per-session [`Game`].
//! Operations live in sibling modules (`turn_order`, `placement`, `swap`,
//! `reveal`); this module owns the data and its invariants.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::core::card::{new_deck, Card};
use crate::core::rng::{shuffle, RngError};
use crate::game::error::GameError;
use crate::game::reveal::RevealOutcome;
use crate::game::swap::SwapState;
use crate::game::turn_order::Preference;

/// Cards dealt to each player.
pub const HAND_SIZE: usize = 7;

/// Number of slots on the board.
pub const BOARD_SIZE: usize = 15;

/// Cards on the board once both hands are exhausted.
pub const TOTAL_PLACEMENTS: u8 = (HAND_SIZE * 2) as u8;

// =============================================================================
// PLAYER NUMBER
// =============================================================================

/// Seat within a session. Serialized as `1` or `2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerNumber {
    /// Seat 1, the room creator.
    One,
    /// Seat 2, the joiner.
    Two,
}

impl PlayerNumber {
    /// Both seats in order.
    pub const BOTH: [PlayerNumber; 2] = [PlayerNumber::One, PlayerNumber::Two];

    /// Zero-based array index.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            PlayerNumber::One => 0,
            PlayerNumber::Two => 1,
        }
    }

    /// The other seat.
    #[inline]
    pub const fn other(self) -> PlayerNumber {
        match self {
            PlayerNumber::One => PlayerNumber::Two,
            PlayerNumber::Two => PlayerNumber::One,
        }
    }

    /// Seat from a zero-based index.
    pub const fn from_index(index: usize) -> Option<PlayerNumber> {
        match index {
            0 => Some(PlayerNumber::One),
            1 => Some(PlayerNumber::Two),
            _ => None,
        }
    }
}

impl From<PlayerNumber> for u8 {
    fn from(player: PlayerNumber) -> u8 {
        player.index() as u8 + 1
    }
}

impl TryFrom<u8> for PlayerNumber {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PlayerNumber::One),
            2 => Ok(PlayerNumber::Two),
            other => Err(format!("invalid player number {other}")),
        }
    }
}

impl fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

// =============================================================================
// PHASE
// =============================================================================

/// Game phase. Only moves forward, except a turn-order conflict which
/// stays in [`Phase::TurnOrderPick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Both players submit a turn-order preference.
    TurnOrderPick,
    /// Alternating card placement.
    Placement,
    /// One swap turn per player.
    Swap,
    /// Board is being revealed.
    Reveal,
    /// Outcome decided; rematch possible.
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::TurnOrderPick => "turn order pick",
            Phase::Placement => "placement",
            Phase::Swap => "swap",
            Phase::Reveal => "reveal",
            Phase::GameOver => "game over",
        };
        f.write_str(name)
    }
}

// =============================================================================
// HAND
// =============================================================================

/// Seven dealt cards, sorted by sort index.
///
/// Placed cards are marked used, never removed, so indices held by
/// clients stay valid for the whole game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hand {
    cards: [Card; HAND_SIZE],
    used: [bool; HAND_SIZE],
}

impl Hand {
    /// Build a hand, sorting the cards ascending.
    pub fn new(mut cards: [Card; HAND_SIZE]) -> Self {
        cards.sort_unstable();
        Self {
            cards,
            used: [false; HAND_SIZE],
        }
    }

    /// Cards in display order.
    pub fn cards(&self) -> &[Card; HAND_SIZE] {
        &self.cards
    }

    /// Whether the card at `index` is already on the board.
    pub fn is_used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    /// Cards still in hand.
    pub fn remaining(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    pub(super) fn take(&mut self, index: usize) -> Card {
        self.used[index] = true;
        self.cards[index]
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// A card on the board together with the player who placed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedCard {
    /// The card (hidden from the other player until reveal).
    pub card: Card,
    /// Player who placed it, or who proposed the swap that moved it.
    pub owner: PlayerNumber,
}

/// Fifteen board slots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Board {
    slots: [Option<PlacedCard>; BOARD_SIZE],
}

impl Board {
    /// Slot contents, `None` if empty or out of range.
    pub fn get(&self, slot: usize) -> Option<&PlacedCard> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Whether `slot` holds a card.
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    /// Occupied slots, left to right.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &PlacedCard)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, placed)| placed.as_ref().map(|p| (slot, p)))
    }

    /// Number of occupied slots.
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(super) fn place(&mut self, slot: usize, placed: PlacedCard) {
        debug_assert!(self.slots[slot].is_none());
        self.slots[slot] = Some(placed);
    }

    /// Exchange two slots' cards and owners.
    pub(super) fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
    }
}

/// Shuffle a fresh deck and deal two hands: the first seven cards and the
/// next seven.
pub fn deal<R: RngCore + ?Sized>(rng: &mut R) -> Result<[Hand; 2], RngError> {
    let mut deck = new_deck();
    shuffle(rng, &mut deck)?;

    let mut first = [deck[0]; HAND_SIZE];
    let mut second = [deck[0]; HAND_SIZE];
    first.copy_from_slice(&deck[..HAND_SIZE]);
    second.copy_from_slice(&deck[HAND_SIZE..HAND_SIZE * 2]);

    Ok([Hand::new(first), Hand::new(second)])
}

// =============================================================================
// GAME
// =============================================================================

/// State of one game within a session.
///
/// Commands validate first and mutate second; an `Err` means nothing changed.
#[derive(Clone, Debug)]
pub struct Game {
    pub(super) phase: Phase,
    pub(super) hands: [Hand; 2],
    pub(super) board: Board,
    pub(super) first_player: Option<PlayerNumber>,
    /// Meaningful from placement onward.
    pub(super) current_turn: PlayerNumber,
    pub(super) pass_used: [bool; 2],
    pub(super) placed: [u8; 2],
    pub(super) picks: [Option<Preference>; 2],
    pub(super) swap: SwapState,
    pub(super) outcome: Option<RevealOutcome>,
}

impl Game {
    /// Deal a new game, starting at turn-order negotiation.
    pub fn new<R: RngCore + ?Sized>(rng: &mut R) -> Result<Self, GameError> {
        let hands = deal(rng)?;
        Ok(Self::with_hands(hands))
    }

    /// Start a game from already dealt hands.
    pub fn with_hands(hands: [Hand; 2]) -> Self {
        Self {
            phase: Phase::TurnOrderPick,
            hands,
            board: Board::default(),
            first_player: None,
            current_turn: PlayerNumber::One,
            pass_used: [false; 2],
            placed: [0; 2],
            picks: [None; 2],
            swap: SwapState::default(),
            outcome: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// A player's hand.
    pub fn hand(&self, player: PlayerNumber) -> &Hand {
        &self.hands[player.index()]
    }

    /// The board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Player who opened placement, once negotiated.
    pub fn first_player(&self) -> Option<PlayerNumber> {
        self.first_player
    }

    /// Player allowed to act in placement and swap.
    pub fn current_turn(&self) -> Option<PlayerNumber> {
        match self.phase {
            Phase::Placement | Phase::Swap => Some(self.current_turn),
            _ => None,
        }
    }

    /// Cards a player has placed.
    pub fn cards_placed(&self, player: PlayerNumber) -> u8 {
        self.placed[player.index()]
    }

    /// Whether a player has spent their pass.
    pub fn pass_used(&self, player: PlayerNumber) -> bool {
        self.pass_used[player.index()]
    }

    /// A player's pending turn-order pick.
    pub fn pick(&self, player: PlayerNumber) -> Option<Preference> {
        self.picks[player.index()]
    }

    /// Swap proposal, allowance and history state.
    pub fn swaps(&self) -> &SwapState {
        &self.swap
    }

    pub(super) fn require_phase(&self, expected: Phase) -> Result<(), GameError> {
        if self.phase != expected {
            return Err(GameError::WrongPhase { expected });
        }
        Ok(())
    }

    pub(super) fn require_turn(&self, player: PlayerNumber) -> Result<(), GameError> {
        if self.current_turn != player {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }
}
