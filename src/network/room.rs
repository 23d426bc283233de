//! Room Concurrency Layer
//!
//! A room pairs two peers with one [`Game`]. Every read or write of the
//! seat table, the game and the rematch flags happens under the room's own
//! mutex. Operations collect their outbound messages into a [`Dispatch`]
//! while locked and the caller delivers it after the guard is gone, so no
//! send ever happens with the lock held.

use std::time::Duration;

use rand::RngCore;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::game::error::GameError;
use crate::game::placement::TurnOutcome;
use crate::game::reveal::RevealOutcome;
use crate::game::state::{Game, Phase, PlayerNumber};
use crate::game::turn_order::{PickOutcome, Preference};
use crate::network::peer::{PeerHandle, PeerId};
use crate::network::protocol::ServerMessage;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Per-room settings.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Suggested delay between consecutive reveal cards.
    pub reveal_stagger: Duration,
    /// Maximum display name length in characters.
    pub max_name_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reveal_stagger: Duration::from_millis(800),
            max_name_len: 20,
        }
    }
}

// =============================================================================
// COMMANDS AND DISPATCH
// =============================================================================

/// A game command from a seated peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Submit a turn-order preference.
    Pick(Preference),
    /// Place a hand card.
    Place {
        /// Hand index.
        card_index: usize,
        /// Board slot.
        slot_index: usize,
    },
    /// Spend the pass.
    Pass,
    /// Look at an own placed card.
    Peek {
        /// Board slot.
        slot_index: usize,
    },
    /// Propose a swap.
    ProposeSwap {
        /// First slot.
        slot_a: usize,
        /// Second slot.
        slot_b: usize,
    },
    /// Answer the outstanding proposal.
    RespondSwap {
        /// Whether to swap.
        accept: bool,
    },
    /// Spend the swap turn without proposing.
    SkipSwap,
    /// Ask for a rematch.
    Rematch,
}

/// Who receives a queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// One seat.
    Player(PlayerNumber),
    /// Every occupied seat.
    Both,
}

/// Messages produced under the room lock, delivered after it is released.
///
/// Holds a snapshot of the seat table taken at the time of the operation.
#[derive(Debug, Default)]
pub struct Dispatch {
    peers: [Option<PeerHandle>; 2],
    messages: Vec<(Recipient, ServerMessage)>,
}

impl Dispatch {
    fn new(peers: &[Option<PeerHandle>; 2]) -> Self {
        Self {
            peers: peers.clone(),
            messages: Vec::new(),
        }
    }

    fn to(&mut self, player: PlayerNumber, message: ServerMessage) {
        self.messages.push((Recipient::Player(player), message));
    }

    fn broadcast(&mut self, message: ServerMessage) {
        self.messages.push((Recipient::Both, message));
    }

    /// Queued messages in delivery order.
    pub fn messages(&self) -> &[(Recipient, ServerMessage)] {
        &self.messages
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Push every message into the recipients' mailboxes. Never blocks.
    pub fn deliver(self) {
        let Dispatch { peers, messages } = self;
        for (recipient, message) in messages {
            match recipient {
                Recipient::Player(player) => {
                    if let Some(peer) = &peers[player.index()] {
                        peer.send(message);
                    }
                }
                Recipient::Both => {
                    for peer in peers.iter().flatten() {
                        peer.send(message.clone());
                    }
                }
            }
        }
    }
}

/// Result of a peer leaving.
#[derive(Debug)]
pub struct Departure {
    /// Seat the peer held.
    pub player: PlayerNumber,
    /// Both seats are now empty; the room is closed.
    pub vacant: bool,
    /// Disconnect notice for the partner, if any.
    pub notice: Dispatch,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Room-level rejections.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Room emptied and was closed.
    #[error("room not found")]
    Closed,

    /// Both seats taken.
    #[error("room is full")]
    Full,

    /// A seat is free but a game is already underway.
    #[error("game already in progress")]
    GameInProgress,

    /// Sender no longer holds the seat.
    #[error("not in this room")]
    NotMember,

    /// Both peers have not joined yet.
    #[error("no active game")]
    NoGame,

    /// Rematch before the game ended.
    #[error("game is not over")]
    GameNotOver,

    /// Second rematch request from the same player.
    #[error("already requested rematch")]
    RematchRequested,

    /// Rematch while the partner's seat is empty.
    #[error("both players required")]
    PartnerRequired,

    /// Rejected by the game.
    #[error(transparent)]
    Game(#[from] GameError),
}

// =============================================================================
// ROOM
// =============================================================================

#[derive(Debug, Default)]
struct RoomInner {
    peers: [Option<PeerHandle>; 2],
    game: Option<Game>,
    rematch_ready: [bool; 2],
    closed: bool,
}

impl RoomInner {
    fn seat_of(&self, peer: PeerId) -> Option<PlayerNumber> {
        PlayerNumber::BOTH
            .into_iter()
            .find(|p| self.peers[p.index()].as_ref().map(PeerHandle::id) == Some(peer))
    }
}

/// One two-seat room.
#[derive(Debug)]
pub struct Room {
    code: String,
    config: RoomConfig,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Create an empty room.
    pub fn new(code: String, config: RoomConfig) -> Self {
        Self {
            code,
            config,
            inner: Mutex::new(RoomInner::default()),
        }
    }

    /// Room code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Seat a peer. The second arrival deals the game.
    ///
    /// The game is dealt before the peer is seated, so a randomness failure
    /// leaves the room exactly as it was.
    pub async fn admit<R: RngCore + Send + ?Sized>(
        &self,
        peer: PeerHandle,
        rng: &mut R,
    ) -> Result<(PlayerNumber, Dispatch), RoomError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(RoomError::Closed);
        }
        let seat = PlayerNumber::BOTH
            .into_iter()
            .find(|p| inner.peers[p.index()].is_none())
            .ok_or(RoomError::Full)?;
        if inner.game.is_some() {
            return Err(RoomError::GameInProgress);
        }

        let partner = inner.peers[seat.other().index()].clone();
        let game = match partner {
            Some(_) => Some(Game::new(rng)?),
            None => None,
        };

        info!(room = %self.code, player = %seat, name = %peer.name(), "peer seated");
        inner.peers[seat.index()] = Some(peer.clone());

        let mut dispatch = Dispatch::new(&inner.peers);
        if let (Some(partner), Some(game)) = (partner, game) {
            dispatch.to(
                seat,
                ServerMessage::PlayerJoined {
                    player_name: peer.name().to_string(),
                    player_number: seat,
                    partner_name: partner.name().to_string(),
                },
            );
            dispatch.to(
                seat.other(),
                ServerMessage::PlayerJoined {
                    player_name: partner.name().to_string(),
                    player_number: seat.other(),
                    partner_name: peer.name().to_string(),
                },
            );
            push_prompts(&mut dispatch, &game);

            info!(room = %self.code, "game started");
            inner.game = Some(game);
            inner.rematch_ready = [false; 2];
        }

        Ok((seat, dispatch))
    }

    /// Vacate a peer's seat.
    ///
    /// Returns `None` if the peer holds no seat. When the last seat empties
    /// the room is closed under the same lock, so no later admit can land.
    pub async fn leave(&self, peer: PeerId) -> Option<Departure> {
        let mut inner = self.inner.lock().await;
        let player = inner.seat_of(peer)?;
        let departed = inner.peers[player.index()].take()?;
        inner.rematch_ready[player.index()] = false;

        let mut notice = Dispatch::new(&inner.peers);
        if inner.peers[player.other().index()].is_some() {
            notice.to(
                player.other(),
                ServerMessage::PlayerDisconnected {
                    player_name: departed.name().to_string(),
                    player_number: player,
                },
            );
        }

        let vacant = inner.peers.iter().all(Option::is_none);
        if vacant {
            inner.closed = true;
        }

        info!(room = %self.code, %player, vacant, "peer left");
        Some(Departure {
            player,
            vacant,
            notice,
        })
    }

    /// Run one game command for the peer seated at `player`.
    pub async fn apply<R: RngCore + Send + ?Sized>(
        &self,
        player: PlayerNumber,
        peer: PeerId,
        command: Command,
        rng: &mut R,
    ) -> Result<Dispatch, RoomError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if inner.seat_of(peer) != Some(player) {
            return Err(RoomError::NotMember);
        }
        let mut dispatch = Dispatch::new(&inner.peers);

        if command == Command::Rematch {
            self.rematch(inner, player, rng, &mut dispatch)?;
            return Ok(dispatch);
        }

        let game = inner.game.as_mut().ok_or(RoomError::NoGame)?;
        debug!(room = %self.code, %player, ?command, "applying command");

        match command {
            Command::Pick(preference) => match game.submit_pick(player, preference, rng)? {
                PickOutcome::Waiting => {}
                PickOutcome::Conflict { picks } => {
                    dispatch.broadcast(ServerMessage::TurnOrderResult {
                        pick1: picks[0],
                        pick2: picks[1],
                        conflict: true,
                        first_player: None,
                    });
                }
                PickOutcome::Decided { picks, first } => {
                    info!(room = %self.code, first = %first, "turn order decided");
                    dispatch.broadcast(ServerMessage::TurnOrderResult {
                        pick1: picks[0],
                        pick2: picks[1],
                        conflict: false,
                        first_player: Some(first),
                    });
                    for p in PlayerNumber::BOTH {
                        dispatch.to(
                            p,
                            ServerMessage::GameStart {
                                hand: game.hand(p).cards().to_vec(),
                                first_player: first,
                            },
                        );
                    }
                    dispatch.to(first, ServerMessage::YourTurn);
                }
            },
            Command::Place {
                card_index,
                slot_index,
            } => {
                let outcome = game.place_card(player, card_index, slot_index)?;
                dispatch.broadcast(ServerMessage::CardPlaced {
                    slot_index,
                    by_player: player,
                });
                self.follow_up(outcome, &mut dispatch);
            }
            Command::Pass => {
                let outcome = game.use_pass(player)?;
                dispatch.broadcast(ServerMessage::PlayerPassed { by_player: player });
                self.follow_up(outcome, &mut dispatch);
            }
            Command::Peek { slot_index } => {
                let card = game.peek(player, slot_index)?;
                dispatch.to(player, ServerMessage::PeekResult { slot_index, card });
            }
            Command::ProposeSwap { slot_a, slot_b } => {
                let proposal = game.propose_swap(player, slot_a, slot_b)?;
                dispatch.broadcast(ServerMessage::SwapSuggested {
                    slot_a: proposal.slot_a,
                    slot_b: proposal.slot_b,
                    by_player: proposal.proposer,
                });
            }
            Command::RespondSwap { accept } => {
                let response = game.respond_swap(player, accept)?;
                let record = response.accepted;
                dispatch.broadcast(ServerMessage::SwapResult {
                    accepted: record.is_some(),
                    slot_a: record.map(|r| r.slot_a),
                    slot_b: record.map(|r| r.slot_b),
                    by_player: record.map(|r| r.by_player),
                });
                if let Some(outcome) = response.advanced {
                    self.follow_up(outcome, &mut dispatch);
                }
            }
            Command::SkipSwap => {
                let outcome = game.skip_swap(player)?;
                dispatch.broadcast(ServerMessage::SwapResult {
                    accepted: false,
                    slot_a: None,
                    slot_b: None,
                    by_player: None,
                });
                self.follow_up(outcome, &mut dispatch);
            }
            Command::Rematch => {}
        }

        Ok(dispatch)
    }

    /// Run `f` against the current game under the lock.
    pub async fn with_game<T>(&self, f: impl FnOnce(Option<&Game>) -> T) -> T {
        let inner = self.inner.lock().await;
        f(inner.game.as_ref())
    }

    /// Number of occupied seats.
    pub async fn occupancy(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.peers.iter().filter(|p| p.is_some()).count()
    }

    fn rematch<R: RngCore + ?Sized>(
        &self,
        inner: &mut RoomInner,
        player: PlayerNumber,
        rng: &mut R,
        dispatch: &mut Dispatch,
    ) -> Result<(), RoomError> {
        let over = inner.game.as_ref().map(Game::phase) == Some(Phase::GameOver);
        if !over {
            return Err(RoomError::GameNotOver);
        }
        if inner.rematch_ready[player.index()] {
            return Err(RoomError::RematchRequested);
        }
        if inner.peers.iter().any(Option::is_none) {
            return Err(RoomError::PartnerRequired);
        }

        if !inner.rematch_ready[player.other().index()] {
            inner.rematch_ready[player.index()] = true;
            let name = inner.peers[player.index()]
                .as_ref()
                .map(|p| p.name().to_string())
                .unwrap_or_default();
            info!(room = %self.code, %player, "rematch requested");
            dispatch.broadcast(ServerMessage::PlayAgainWaiting { player_name: name });
            return Ok(());
        }

        let game = Game::new(rng)?;
        push_prompts(dispatch, &game);
        inner.game = Some(game);
        inner.rematch_ready = [false; 2];
        info!(room = %self.code, "rematch started");
        Ok(())
    }

    /// Messages that follow a turn-consuming action.
    fn follow_up(&self, outcome: TurnOutcome, dispatch: &mut Dispatch) {
        match outcome {
            TurnOutcome::Placement(next) => dispatch.to(next, ServerMessage::YourTurn),
            TurnOutcome::Swap(next) => dispatch.broadcast(ServerMessage::SwapPrompt { by_player: next }),
            TurnOutcome::Finished(outcome) => self.push_reveal(outcome, dispatch),
        }
    }

    fn push_reveal(&self, outcome: RevealOutcome, dispatch: &mut Dispatch) {
        info!(room = %self.code, win = outcome.win, "game over");
        let stagger = self.config.reveal_stagger.as_millis() as u64;
        for (order, entry) in outcome.entries.iter().enumerate() {
            dispatch.broadcast(ServerMessage::RevealCard {
                slot_index: entry.slot_index,
                card: entry.card,
                order,
                delay: order as u64 * stagger,
            });
        }
        dispatch.broadcast(ServerMessage::GameResult {
            win: outcome.win,
            board: outcome.entries,
        });
    }
}

/// Each peer's own hand for a freshly dealt game.
fn push_prompts(dispatch: &mut Dispatch, game: &Game) {
    for p in PlayerNumber::BOTH {
        dispatch.to(
            p,
            ServerMessage::TurnOrderPrompt {
                hand: game.hand(p).cards().to_vec(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{FailingRng, OsRng};
    use crate::game::state::{BOARD_SIZE, HAND_SIZE, TOTAL_PLACEMENTS};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Barrier};

    struct TestPeer {
        handle: PeerHandle,
        rx: mpsc::Receiver<ServerMessage>,
    }

    impl TestPeer {
        fn new(name: &str) -> Self {
            let (tx, rx) = mpsc::channel(64);
            Self {
                handle: PeerHandle::new(name.to_string(), tx),
                rx,
            }
        }

        fn id(&self) -> PeerId {
            self.handle.id()
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    fn test_room() -> Room {
        Room::new("ABCD".into(), RoomConfig::default())
    }

    async fn seated_room() -> (Room, TestPeer, TestPeer) {
        let room = test_room();
        let mut p1 = TestPeer::new("Ada");
        let mut p2 = TestPeer::new("Bob");
        room.admit(p1.handle.clone(), &mut OsRng).await.unwrap().1.deliver();
        room.admit(p2.handle.clone(), &mut OsRng).await.unwrap().1.deliver();
        p1.drain();
        p2.drain();
        (room, p1, p2)
    }

    /// Seat both peers and negotiate player 1 first.
    async fn placement_room() -> (Room, TestPeer, TestPeer) {
        let (room, mut p1, mut p2) = seated_room().await;
        room.apply(PlayerNumber::One, p1.id(), Command::Pick(Preference::First), &mut OsRng)
            .await
            .unwrap()
            .deliver();
        room.apply(PlayerNumber::Two, p2.id(), Command::Pick(Preference::Neutral), &mut OsRng)
            .await
            .unwrap()
            .deliver();
        p1.drain();
        p2.drain();
        (room, p1, p2)
    }

    /// Drive a placement room to game over with two skipped swap turns.
    async fn finish_game(room: &Room, p1: &TestPeer, p2: &TestPeer) {
        let ids = [p1.id(), p2.id()];
        loop {
            let next = room
                .with_game(|g| {
                    let g = g.unwrap();
                    let player = g.current_turn()?;
                    let card = (0..HAND_SIZE).find(|&i| !g.hand(player).is_used(i));
                    let slot = (0..BOARD_SIZE).find(|&s| !g.board().is_occupied(s)).unwrap();
                    Some((player, g.phase(), card, slot))
                })
                .await;
            let command = match next {
                Some((_, Phase::Placement, Some(card_index), slot_index)) => {
                    Command::Place { card_index, slot_index }
                }
                Some((_, Phase::Swap, _, _)) => Command::SkipSwap,
                _ => break,
            };
            let (player, ..) = next.unwrap();
            room.apply(player, ids[player.index()], command, &mut OsRng)
                .await
                .unwrap()
                .deliver();
        }
    }

    #[tokio::test]
    async fn test_second_peer_starts_game() {
        let room = test_room();
        let mut p1 = TestPeer::new("Ada");
        let mut p2 = TestPeer::new("Bob");

        let (seat, dispatch) = room.admit(p1.handle.clone(), &mut OsRng).await.unwrap();
        assert_eq!(seat, PlayerNumber::One);
        assert!(dispatch.is_empty());
        assert!(room.with_game(|g| g.is_none()).await);

        let (seat, dispatch) = room.admit(p2.handle.clone(), &mut OsRng).await.unwrap();
        assert_eq!(seat, PlayerNumber::Two);
        dispatch.deliver();

        let to_p1 = p1.drain();
        let to_p2 = p2.drain();
        assert_eq!(
            to_p1[0],
            ServerMessage::PlayerJoined {
                player_name: "Ada".into(),
                player_number: PlayerNumber::One,
                partner_name: "Bob".into(),
            }
        );
        assert_eq!(
            to_p2[0],
            ServerMessage::PlayerJoined {
                player_name: "Bob".into(),
                player_number: PlayerNumber::Two,
                partner_name: "Ada".into(),
            }
        );

        // Each peer sees only its own hand.
        let hands = room
            .with_game(|g| {
                let g = g.unwrap();
                assert_eq!(g.phase(), Phase::TurnOrderPick);
                PlayerNumber::BOTH.map(|p| g.hand(p).cards().to_vec())
            })
            .await;
        assert_eq!(to_p1[1], ServerMessage::TurnOrderPrompt { hand: hands[0].clone() });
        assert_eq!(to_p2[1], ServerMessage::TurnOrderPrompt { hand: hands[1].clone() });
    }

    #[tokio::test]
    async fn test_third_peer_rejected() {
        let (room, _p1, _p2) = seated_room().await;
        let p3 = TestPeer::new("Cy");
        let err = room.admit(p3.handle.clone(), &mut OsRng).await.unwrap_err();
        assert!(matches!(err, RoomError::Full));
        assert_eq!(err.to_string(), "room is full");
    }

    #[tokio::test]
    async fn test_deal_failure_leaves_seat_free() {
        let room = test_room();
        let p1 = TestPeer::new("Ada");
        let p2 = TestPeer::new("Bob");
        room.admit(p1.handle.clone(), &mut OsRng).await.unwrap();

        let err = room.admit(p2.handle.clone(), &mut FailingRng).await.unwrap_err();
        assert!(matches!(err, RoomError::Game(GameError::Rng(_))));
        assert_eq!(room.occupancy().await, 1);

        // The room still works once randomness is back.
        let (seat, _) = room.admit(p2.handle.clone(), &mut OsRng).await.unwrap();
        assert_eq!(seat, PlayerNumber::Two);
    }

    #[tokio::test]
    async fn test_decided_pick_sends_start_and_turn() {
        let (room, mut p1, mut p2) = seated_room().await;

        let dispatch = room
            .apply(PlayerNumber::Two, p2.id(), Command::Pick(Preference::First), &mut OsRng)
            .await
            .unwrap();
        assert!(dispatch.is_empty());

        room.apply(PlayerNumber::One, p1.id(), Command::Pick(Preference::NoFirst), &mut OsRng)
            .await
            .unwrap()
            .deliver();

        let result = ServerMessage::TurnOrderResult {
            pick1: Preference::NoFirst,
            pick2: Preference::First,
            conflict: false,
            first_player: Some(PlayerNumber::Two),
        };
        let to_p1 = p1.drain();
        let to_p2 = p2.drain();
        assert_eq!(to_p1[0], result);
        assert_eq!(to_p2[0], result);
        assert!(matches!(to_p1[1], ServerMessage::GameStart { first_player: PlayerNumber::Two, .. }));
        assert_eq!(to_p1.len(), 2);
        assert_eq!(to_p2[2], ServerMessage::YourTurn);
    }

    #[tokio::test]
    async fn test_conflict_broadcasts_without_start() {
        let (room, mut p1, mut p2) = seated_room().await;
        room.apply(PlayerNumber::One, p1.id(), Command::Pick(Preference::NoFirst), &mut OsRng)
            .await
            .unwrap();
        room.apply(PlayerNumber::Two, p2.id(), Command::Pick(Preference::NoFirst), &mut OsRng)
            .await
            .unwrap()
            .deliver();

        let expected = vec![ServerMessage::TurnOrderResult {
            pick1: Preference::NoFirst,
            pick2: Preference::NoFirst,
            conflict: true,
            first_player: None,
        }];
        assert_eq!(p1.drain(), expected);
        assert_eq!(p2.drain(), expected);
    }

    #[tokio::test]
    async fn test_commands_before_partner_joins() {
        let room = test_room();
        let p1 = TestPeer::new("Ada");
        room.admit(p1.handle.clone(), &mut OsRng).await.unwrap();

        let err = room
            .apply(PlayerNumber::One, p1.id(), Command::Pass, &mut OsRng)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NoGame));
    }

    #[tokio::test]
    async fn test_command_from_wrong_seat() {
        let (room, p1, _p2) = placement_room().await;
        let err = room
            .apply(PlayerNumber::Two, p1.id(), Command::Pass, &mut OsRng)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotMember));
    }

    #[tokio::test]
    async fn test_peek_reaches_requester_only() {
        let (room, mut p1, mut p2) = placement_room().await;
        room.apply(
            PlayerNumber::One,
            p1.id(),
            Command::Place { card_index: 0, slot_index: 5 },
            &mut OsRng,
        )
        .await
        .unwrap()
        .deliver();
        p1.drain();
        p2.drain();

        room.apply(PlayerNumber::One, p1.id(), Command::Peek { slot_index: 5 }, &mut OsRng)
            .await
            .unwrap()
            .deliver();

        let to_p1 = p1.drain();
        assert!(matches!(to_p1[..], [ServerMessage::PeekResult { slot_index: 5, .. }]));
        assert!(p2.drain().is_empty());
    }

    #[tokio::test]
    async fn test_placement_messages_hide_card() {
        let (room, mut p1, mut p2) = placement_room().await;
        room.apply(
            PlayerNumber::One,
            p1.id(),
            Command::Place { card_index: 2, slot_index: 9 },
            &mut OsRng,
        )
        .await
        .unwrap()
        .deliver();

        let placed = ServerMessage::CardPlaced { slot_index: 9, by_player: PlayerNumber::One };
        assert_eq!(p1.drain(), vec![placed.clone()]);
        assert_eq!(p2.drain(), vec![placed, ServerMessage::YourTurn]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_placement_single_winner() {
        for _ in 0..50 {
            let (room, p1, p2) = placement_room().await;
            let room = Arc::new(room);
            let barrier = Arc::new(Barrier::new(2));

            let tasks = [(PlayerNumber::One, p1.id()), (PlayerNumber::Two, p2.id())].map(|(player, id)| {
                let room = room.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    let command = Command::Place { card_index: 0, slot_index: 7 };
                    room.apply(player, id, command, &mut OsRng).await.map(|_| ())
                })
            });
            let [first, second] = tasks;
            let results = [first.await.unwrap(), second.await.unwrap()];

            // Player 1 holds the turn; player 2 loses whichever order the lock grants.
            assert!(results[0].is_ok());
            assert!(matches!(
                results[1],
                Err(RoomError::Game(GameError::NotYourTurn)) | Err(RoomError::Game(GameError::SlotOccupied))
            ));

            room.with_game(|g| {
                let g = g.unwrap();
                assert_eq!(g.board().occupied_count(), 1);
                assert_eq!(g.board().get(7).unwrap().owner, PlayerNumber::One);
                assert_eq!(g.cards_placed(PlayerNumber::One), 1);
                assert_eq!(g.cards_placed(PlayerNumber::Two), 0);
            })
            .await;
        }
    }

    #[tokio::test]
    async fn test_full_game_reveal_sequence() {
        let (room, mut p1, mut p2) = placement_room().await;
        finish_game(&room, &p1, &p2).await;

        let to_p2 = p2.drain();
        let reveals: Vec<_> = to_p2
            .iter()
            .filter_map(|m| match m {
                ServerMessage::RevealCard { order, delay, .. } => Some((*order, *delay)),
                _ => None,
            })
            .collect();
        assert_eq!(reveals.len(), 14);
        assert_eq!(reveals[0], (0, 0));
        assert_eq!(reveals[13], (13, 13 * 800));
        assert!(matches!(to_p2.last(), Some(ServerMessage::GameResult { board, .. }) if board.len() == 14));
        // Player 1 opened, so player 2 received one more turn prompt.
        assert_eq!(p1.drain().len() + 1, to_p2.len());

        assert!(room.with_game(|g| g.unwrap().phase() == Phase::GameOver).await);
    }

    #[tokio::test]
    async fn test_rematch_flow() {
        let (room, mut p1, mut p2) = placement_room().await;

        let err = room
            .apply(PlayerNumber::One, p1.id(), Command::Rematch, &mut OsRng)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "game is not over");

        finish_game(&room, &p1, &p2).await;
        p1.drain();
        p2.drain();

        room.apply(PlayerNumber::One, p1.id(), Command::Rematch, &mut OsRng)
            .await
            .unwrap()
            .deliver();
        let waiting = ServerMessage::PlayAgainWaiting { player_name: "Ada".into() };
        assert_eq!(p1.drain(), vec![waiting.clone()]);
        assert_eq!(p2.drain(), vec![waiting]);

        let err = room
            .apply(PlayerNumber::One, p1.id(), Command::Rematch, &mut OsRng)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::RematchRequested));

        // A failed deal does not consume player 2's request.
        let err = room
            .apply(PlayerNumber::Two, p2.id(), Command::Rematch, &mut FailingRng)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Game(GameError::Rng(_))));

        room.apply(PlayerNumber::Two, p2.id(), Command::Rematch, &mut OsRng)
            .await
            .unwrap()
            .deliver();
        assert!(matches!(p1.drain()[..], [ServerMessage::TurnOrderPrompt { .. }]));
        assert!(matches!(p2.drain()[..], [ServerMessage::TurnOrderPrompt { .. }]));
        assert!(room.with_game(|g| g.unwrap().phase() == Phase::TurnOrderPick).await);
    }

    #[tokio::test]
    async fn test_leave_notifies_partner_once() {
        let (room, p1, mut p2) = placement_room().await;

        let departure = room.leave(p1.id()).await.unwrap();
        assert_eq!(departure.player, PlayerNumber::One);
        assert!(!departure.vacant);
        departure.notice.deliver();

        assert_eq!(
            p2.drain(),
            vec![ServerMessage::PlayerDisconnected {
                player_name: "Ada".into(),
                player_number: PlayerNumber::One,
            }]
        );
        assert!(room.leave(p1.id()).await.is_none());

        // Resume is not supported.
        let p3 = TestPeer::new("Cy");
        let err = room.admit(p3.handle.clone(), &mut OsRng).await.unwrap_err();
        assert!(matches!(err, RoomError::GameInProgress));

        let departure = room.leave(p2.id()).await.unwrap();
        assert!(departure.vacant);
        assert!(departure.notice.is_empty());

        let err = room.admit(p3.handle.clone(), &mut OsRng).await.unwrap_err();
        assert!(matches!(err, RoomError::Closed));
    }

    #[tokio::test]
    async fn test_rematch_needs_partner() {
        let (room, mut p1, p2) = placement_room().await;
        finish_game(&room, &p1, &p2).await;
        room.leave(p2.id()).await.unwrap().notice.deliver();
        p1.drain();

        let err = room
            .apply(PlayerNumber::One, p1.id(), Command::Rematch, &mut OsRng)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::PartnerRequired));
        assert_eq!(err.to_string(), "both players required");
        assert!(p1.drain().is_empty());
        assert!(room.with_game(|g| g.unwrap().phase() == Phase::GameOver).await);
    }

    #[tokio::test]
    async fn test_final_dispatch_is_one_burst() {
        let (room, p1, p2) = placement_room().await;
        let ids = [p1.id(), p2.id()];

        // Fill the board, then skip the first swap turn.
        loop {
            let step = room
                .with_game(|g| {
                    let g = g.unwrap();
                    let player = g.current_turn()?;
                    let card = (0..HAND_SIZE).find(|&i| !g.hand(player).is_used(i));
                    let slot = (0..BOARD_SIZE).find(|&s| !g.board().is_occupied(s));
                    Some((player, g.phase(), card, slot))
                })
                .await;
            match step {
                Some((player, Phase::Placement, Some(card_index), Some(slot_index))) => {
                    room.apply(player, ids[player.index()], Command::Place { card_index, slot_index }, &mut OsRng)
                        .await
                        .unwrap();
                }
                _ => break,
            }
        }
        room.apply(PlayerNumber::One, p1.id(), Command::SkipSwap, &mut OsRng)
            .await
            .unwrap();

        let last = room
            .apply(PlayerNumber::Two, p2.id(), Command::SkipSwap, &mut OsRng)
            .await
            .unwrap();
        // Swap result, every placed card, then the game result.
        assert_eq!(last.messages().len(), TOTAL_PLACEMENTS as usize + 2);
        assert!(last.messages().iter().all(|(to, _)| *to == Recipient::Both));
    }
}
