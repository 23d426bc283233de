//! Connection Dispatch
//!
//! Turns one peer's inbound messages into registry and room calls, and
//! replies to that peer through its own mailbox. Transport concerns live
//! in `server`; this type only sees decoded text.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::core::rng::OsRng;
use crate::game::error::GameError;
use crate::game::state::PlayerNumber;
use crate::network::peer::{validate_name, PeerHandle};
use crate::network::protocol::{wire_index, ClientMessage, ServerMessage};
use crate::network::registry::{normalize_code, RoomRegistry};
use crate::network::room::{Command, Room, RoomError};

/// Seat held by this connection.
struct Membership {
    room: Arc<Room>,
    player: PlayerNumber,
    peer: PeerHandle,
}

/// One peer's view of the server.
pub struct Connection {
    registry: Arc<RoomRegistry>,
    peer: PeerHandle,
    membership: Option<Membership>,
}

impl Connection {
    /// Create a connection that replies through `tx`.
    pub fn new(registry: Arc<RoomRegistry>, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            registry,
            peer: PeerHandle::new(String::new(), tx),
            membership: None,
        }
    }

    /// Room code and seat, once seated.
    pub fn seat(&self) -> Option<(&str, PlayerNumber)> {
        self.membership.as_ref().map(|m| (m.room.code(), m.player))
    }

    /// Handle one inbound text frame.
    pub async fn handle_text(&mut self, text: &str) {
        let message = match ClientMessage::from_json(text) {
            Ok(m) => m,
            Err(e) => {
                debug!(peer = %self.peer.id(), "rejected message: {}", e);
                self.reply(ServerMessage::error(e));
                return;
            }
        };

        match message {
            ClientMessage::CreateRoom { name } => self.create_room(&name).await,
            ClientMessage::JoinRoom { name, room_code } => self.join_room(&name, &room_code).await,
            ClientMessage::Echo { payload } => self.reply(ServerMessage::Echo { payload }),
            other => {
                if let Some(command) = command_for(other) {
                    self.run(command).await;
                }
            }
        }
    }

    /// Leave the room, notify the partner and deregister a vacated room.
    ///
    /// Returns whether the room was deregistered.
    pub async fn close(self) -> bool {
        let Some(membership) = self.membership else {
            return false;
        };

        let Some(departure) = membership.room.leave(membership.peer.id()).await else {
            return false;
        };
        departure.notice.deliver();
        info!(
            room = %membership.room.code(),
            player = %departure.player,
            name = %membership.peer.name(),
            "player disconnected"
        );

        if departure.vacant {
            return self.registry.remove_room(&membership.room).await;
        }
        false
    }

    async fn create_room(&mut self, raw_name: &str) {
        let name = match validate_name(raw_name, self.registry.room_config().max_name_len) {
            Ok(name) => name,
            Err(e) => return self.reply(ServerMessage::error(e)),
        };
        if self.membership.is_some() {
            return self.reply(ServerMessage::error("already in a room"));
        }

        let room = match self.registry.create(&mut OsRng).await {
            Ok(room) => room,
            Err(e) => {
                error!("failed to create room: {}", e);
                return self.reply(ServerMessage::error("failed to create room"));
            }
        };

        let peer = self.peer.with_name(name);
        match room.admit(peer.clone(), &mut OsRng).await {
            Ok((player, dispatch)) => {
                info!(room = %room.code(), name = %peer.name(), "player created room");
                self.reply(ServerMessage::RoomCreated {
                    room_code: room.code().to_string(),
                    player_number: player,
                });
                dispatch.deliver();
                self.membership = Some(Membership { room, player, peer });
            }
            Err(e) => {
                error!(room = %room.code(), "failed to seat room creator: {}", e);
                self.registry.remove_room(&room).await;
                self.reply(ServerMessage::error("failed to join room"));
            }
        }
    }

    async fn join_room(&mut self, raw_name: &str, raw_code: &str) {
        let name = match validate_name(raw_name, self.registry.room_config().max_name_len) {
            Ok(name) => name,
            Err(e) => return self.reply(ServerMessage::error(e)),
        };
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return self.reply(ServerMessage::error("room code is required"));
        }
        if self.membership.is_some() {
            return self.reply(ServerMessage::error("already in a room"));
        }

        let Some(room) = self.registry.lookup(&code).await else {
            return self.reply(ServerMessage::error("room not found"));
        };

        let peer = self.peer.with_name(name);
        match room.admit(peer.clone(), &mut OsRng).await {
            Ok((player, dispatch)) => {
                info!(room = %room.code(), name = %peer.name(), %player, "player joined room");
                dispatch.deliver();
                self.membership = Some(Membership { room, player, peer });
            }
            Err(e) => {
                log_rejection(room.code(), &e);
                self.reply(ServerMessage::error(e));
            }
        }
    }

    async fn run(&mut self, command: Command) {
        let Some(membership) = &self.membership else {
            return self.reply(ServerMessage::error("no active game"));
        };

        let result = membership
            .room
            .apply(membership.player, membership.peer.id(), command, &mut OsRng)
            .await;
        match result {
            Ok(dispatch) => dispatch.deliver(),
            Err(e) => {
                log_rejection(membership.room.code(), &e);
                self.reply(ServerMessage::error(e));
            }
        }
    }

    fn reply(&self, message: ServerMessage) {
        self.peer.send(message);
    }
}

/// Room command for a game message; lobby and heartbeat messages map to `None`.
fn command_for(message: ClientMessage) -> Option<Command> {
    let command = match message {
        ClientMessage::TurnOrderPick { preference } => Command::Pick(preference),
        ClientMessage::PlaceCard {
            card_index,
            slot_index,
        } => Command::Place {
            card_index: wire_index(card_index),
            slot_index: wire_index(slot_index),
        },
        ClientMessage::Pass => Command::Pass,
        ClientMessage::Peek { slot_index } => Command::Peek {
            slot_index: wire_index(slot_index),
        },
        ClientMessage::SuggestSwap { slot_a, slot_b } => Command::ProposeSwap {
            slot_a: wire_index(slot_a),
            slot_b: wire_index(slot_b),
        },
        ClientMessage::SkipSwap => Command::SkipSwap,
        ClientMessage::RespondSwap { accept } => Command::RespondSwap { accept },
        ClientMessage::PlayAgain => Command::Rematch,
        ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } | ClientMessage::Echo { .. } => {
            return None
        }
    };
    Some(command)
}

fn log_rejection(room: &str, err: &RoomError) {
    match err {
        RoomError::Game(GameError::Rng(_)) => error!(room = %room, "game creation failed: {}", err),
        _ => debug!(room = %room, "command rejected: {}", err),
    }
}
