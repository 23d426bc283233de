//! Cards and Deck
//!
//! Immutable card values and the fixed total order used to score a board.
//! The deck is the 40 combinations of four suits and values 1-10.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of values per suit.
pub const VALUES_PER_SUIT: u8 = 10;

/// Number of cards in a full deck.
pub const DECK_SIZE: usize = 40;

// =============================================================================
// SUIT
// =============================================================================

/// Card suit.
///
/// Declaration order is the global suit rank: H < S < D < C.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    /// Hearts (rank 0)
    #[serde(rename = "H")]
    Hearts,
    /// Spades (rank 1)
    #[serde(rename = "S")]
    Spades,
    /// Diamonds (rank 2)
    #[serde(rename = "D")]
    Diamonds,
    /// Clubs (rank 3)
    #[serde(rename = "C")]
    Clubs,
}

impl Suit {
    /// All suits in rank order.
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Spades, Suit::Diamonds, Suit::Clubs];

    /// Rank of this suit in the global order.
    #[inline]
    pub const fn rank(self) -> u8 {
        match self {
            Suit::Hearts => 0,
            Suit::Spades => 1,
            Suit::Diamonds => 2,
            Suit::Clubs => 3,
        }
    }

    /// Single-letter code used on the wire.
    pub const fn letter(self) -> char {
        match self {
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
        }
    }
}

// =============================================================================
// CARD
// =============================================================================

/// A single playing card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// Suit
    pub suit: Suit,
    /// Face value, 1..=10
    pub value: u8,
}

impl Card {
    /// Create a card. Values outside 1..=10 are not part of the deck.
    pub const fn new(suit: Suit, value: u8) -> Self {
        Self { suit, value }
    }

    /// Global sort position of this card (0-39).
    ///
    /// `suit_rank * 10 + (value - 1)`, so H1 = 0, H10 = 9, S1 = 10, C10 = 39.
    /// Values outside 1..=10 are clamped into their suit's range.
    #[inline]
    pub const fn sort_index(&self) -> u8 {
        let offset = match self.value {
            0 => 0,
            v if v > VALUES_PER_SUIT => VALUES_PER_SUIT - 1,
            v => v - 1,
        };
        self.suit.rank() * VALUES_PER_SUIT + offset
    }
}

impl Ord for Card {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_index().cmp(&other.sort_index())
    }
}

impl PartialOrd for Card {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit.letter(), self.value)
    }
}

/// Create a fresh, ordered 40-card deck.
pub fn new_deck() -> Vec<Card> {
    Suit::ALL
        .iter()
        .flat_map(|&suit| (1..=VALUES_PER_SUIT).map(move |value| Card::new(suit, value)))
        .collect()
}
