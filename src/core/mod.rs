//! Core primitives.
//!
//! Card values, the deck order, and the secure randomness every deal,
//! tie-break and room code draws from.

pub mod card;
pub mod rng;

// Re-export core types
pub use card::{new_deck, Card, Suit, DECK_SIZE};
pub use rng::{coin_flip, shuffle, uniform_below, OsRng, RngError};
