//! Network Layer
//!
//! WebSocket transport, room codes, per-room serialization and the wire
//! protocol. Game rules live in `game/`; this layer only routes intents to
//! them and fans the results out to peers.

pub mod connection;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;

pub use connection::Connection;
pub use peer::{validate_name, NameError, PeerHandle, PeerId};
pub use protocol::{wire_index, ClientMessage, ProtocolError, ServerMessage};
pub use registry::{RegistryError, RoomRegistry};
pub use room::{Command, Departure, Dispatch, Recipient, Room, RoomConfig, RoomError};
pub use server::{GameServer, GameServerError, ServerConfig};
