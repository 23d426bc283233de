//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by `type`, with camelCase fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::card::Card;
use crate::game::reveal::RevealEntry;
use crate::game::state::PlayerNumber;
use crate::game::turn_order::Preference;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
///
/// Indices are signed on the wire so that negative values reach the game
/// and are rejected there with a specific message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a new room and take seat 1.
    CreateRoom {
        /// Display name.
        name: String,
    },

    /// Take the free seat of an existing room.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        /// Display name.
        name: String,
        /// Code shown to the room creator.
        room_code: String,
    },

    /// Submit a turn-order preference.
    TurnOrderPick {
        /// The preference.
        preference: Preference,
    },

    /// Place a hand card on the board.
    #[serde(rename_all = "camelCase")]
    PlaceCard {
        /// Index into the sender's hand.
        card_index: i64,
        /// Board slot.
        slot_index: i64,
    },

    /// Spend the per-game pass.
    Pass,

    /// Privately look at one of the sender's placed cards.
    #[serde(rename_all = "camelCase")]
    Peek {
        /// Board slot.
        slot_index: i64,
    },

    /// Propose exchanging two slots.
    #[serde(rename_all = "camelCase")]
    SuggestSwap {
        /// First slot.
        slot_a: i64,
        /// Second slot.
        slot_b: i64,
    },

    /// Decline to propose during the swap phase.
    SkipSwap,

    /// Answer the partner's proposal.
    RespondSwap {
        /// Whether to perform the swap.
        accept: bool,
    },

    /// Ask for a rematch after the game is over.
    PlayAgain,

    /// Application-level heartbeat; echoed back to the sender.
    Echo {
        /// Opaque payload.
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Every `type` the server understands.
const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "create_room",
    "join_room",
    "turn_order_pick",
    "place_card",
    "pass",
    "peek",
    "suggest_swap",
    "skip_swap",
    "respond_swap",
    "play_again",
    "echo",
];

/// Inbound text that could not be turned into a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not a JSON object with a string `type`.
    #[error("invalid message format")]
    Malformed,

    /// Known `type`, bad fields.
    #[error("invalid {0} message")]
    InvalidPayload(String),

    /// Unrecognized `type`.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Convert a wire index to a game index. Negative values map out of range.
pub fn wire_index(value: i64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room opened; the creator holds seat 1.
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        /// Code to share with the partner.
        room_code: String,
        /// Always 1.
        player_number: PlayerNumber,
    },

    /// Both seats are taken. Sent to each peer from their own perspective.
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        /// Recipient's name.
        player_name: String,
        /// Recipient's seat.
        player_number: PlayerNumber,
        /// The other peer's name.
        partner_name: String,
    },

    /// The partner left the room.
    #[serde(rename_all = "camelCase")]
    PlayerDisconnected {
        /// Departed peer's name.
        player_name: String,
        /// Departed peer's seat.
        player_number: PlayerNumber,
    },

    /// New game dealt; the recipient's own hand only.
    TurnOrderPrompt {
        /// Seven cards, sorted.
        hand: Vec<Card>,
    },

    /// Both picks are in.
    #[serde(rename_all = "camelCase")]
    TurnOrderResult {
        /// Player 1's pick.
        pick1: Preference,
        /// Player 2's pick.
        pick2: Preference,
        /// Same extreme twice; pick again.
        conflict: bool,
        /// Resolved first player.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        first_player: Option<PlayerNumber>,
    },

    /// Placement begins.
    #[serde(rename_all = "camelCase")]
    GameStart {
        /// Recipient's hand.
        hand: Vec<Card>,
        /// Player who places first.
        first_player: PlayerNumber,
    },

    /// Recipient holds the placement turn.
    YourTurn,

    /// A card was placed; its identity stays hidden.
    #[serde(rename_all = "camelCase")]
    CardPlaced {
        /// Board slot.
        slot_index: usize,
        /// Placing player.
        by_player: PlayerNumber,
    },

    /// A player spent their pass.
    #[serde(rename_all = "camelCase")]
    PlayerPassed {
        /// Passing player.
        by_player: PlayerNumber,
    },

    /// Answer to a peek, for the requester only.
    #[serde(rename_all = "camelCase")]
    PeekResult {
        /// Board slot.
        slot_index: usize,
        /// The card.
        card: Card,
    },

    /// Swap turn begins for `by_player`.
    #[serde(rename_all = "camelCase")]
    SwapPrompt {
        /// Player whose swap turn it is.
        by_player: PlayerNumber,
    },

    /// A swap was proposed.
    #[serde(rename_all = "camelCase")]
    SwapSuggested {
        /// Lower slot.
        slot_a: usize,
        /// Higher slot.
        slot_b: usize,
        /// Proposer.
        by_player: PlayerNumber,
    },

    /// A proposal was answered or a swap turn skipped.
    #[serde(rename_all = "camelCase")]
    SwapResult {
        /// Whether the board changed.
        accepted: bool,
        /// Lower slot, when accepted.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        slot_a: Option<usize>,
        /// Higher slot, when accepted.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        slot_b: Option<usize>,
        /// Proposer of the accepted swap.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        by_player: Option<PlayerNumber>,
    },

    /// One card of the reveal sequence.
    #[serde(rename_all = "camelCase")]
    RevealCard {
        /// Board slot.
        slot_index: usize,
        /// The card.
        card: Card,
        /// Position in the reveal sequence.
        order: usize,
        /// Suggested display delay in milliseconds.
        delay: u64,
    },

    /// Final verdict after the reveal sequence.
    GameResult {
        /// Strictly ascending board.
        win: bool,
        /// Every occupied slot, left to right.
        board: Vec<RevealEntry>,
    },

    /// One player asked for a rematch.
    #[serde(rename_all = "camelCase")]
    PlayAgainWaiting {
        /// Requesting player's name.
        player_name: String,
    },

    /// Heartbeat reply.
    Echo {
        /// Payload as received.
        payload: serde_json::Value,
    },

    /// A request was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerMessage {
    /// Error event carrying any displayable rejection.
    pub fn error(reason: impl ToString) -> Self {
        ServerMessage::Error {
            message: reason.to_string(),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string, classifying failures.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(s).map_err(|_| ProtocolError::Malformed)?;
        if !CLIENT_MESSAGE_TYPES.contains(&envelope.kind.as_str()) {
            return Err(ProtocolError::UnknownType(envelope.kind));
        }

        serde_json::from_str(s).map_err(|_| ProtocolError::InvalidPayload(envelope.kind))
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
