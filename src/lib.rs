//! # Sequence Duel Server
//!
//! Authoritative server for a two-player cooperative card game: both
//! players secretly place cards on a shared board and win together if the
//! revealed board reads in strictly ascending order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SEQUENCE DUEL SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── card.rs     - Suits, ranks, the 40-card deck            │
//! │  └── rng.rs      - OS-backed unbiased draws and shuffles     │
//! │                                                              │
//! │  game/           - Game rules (no I/O, no locks)             │
//! │  ├── state.rs    - Phase, hands, board, the deal             │
//! │  ├── turn_order.rs - Preference picks and tie-breaks         │
//! │  ├── placement.rs- Placing, passing, peeking                 │
//! │  ├── swap.rs     - Swap proposals and swap turns             │
//! │  └── reveal.rs   - Reveal order and the win check            │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket accept loop and pumps           │
//! │  ├── connection.rs - Per-peer message routing                │
//! │  ├── room.rs     - Per-room serialization and fan-out        │
//! │  ├── registry.rs - Room codes                                │
//! │  ├── peer.rs     - Bounded outbound mailboxes                │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every intent against a room runs under that room's lock, so the game
//! state machine itself is single-threaded. Outbound messages are queued
//! while the lock is held and delivered after it is released; a peer whose
//! mailbox is full loses messages rather than stalling the room.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::card::{Card, Suit, DECK_SIZE};
pub use game::state::{Game, Phase, PlayerNumber, BOARD_SIZE, HAND_SIZE};
pub use network::server::{GameServer, GameServerError, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
