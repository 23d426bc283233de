//! WebSocket Game Server
//!
//! Accepts WebSocket connections and runs two tasks per peer: a reader that
//! feeds decoded text to a [`Connection`], and a writer that drains the
//! peer's bounded mailbox and sends keep-alive pings. Either side stopping
//! ends the connection through the same cleanup.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval_at, timeout, timeout_at};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async_with_config, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use crate::network::connection::Connection;
use crate::network::protocol::ServerMessage;
use crate::network::registry::RoomRegistry;
use crate::network::room::RoomConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Outbound messages buffered per peer before new ones are dropped.
    pub mailbox_capacity: usize,
    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,
    /// Time allowed for a single outbound write.
    pub write_timeout: Duration,
    /// Silence after which a peer is considered gone.
    pub pong_timeout: Duration,
    /// Interval between keep-alive pings. Must be below `pong_timeout`.
    pub ping_interval: Duration,
    /// Server version string.
    pub version: String,
    /// Settings for every room.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pong_timeout = Duration::from_secs(60);
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            mailbox_capacity: 64,
            max_message_size: 4096,
            write_timeout: Duration::from_secs(10),
            pong_timeout,
            ping_interval: pong_timeout * 9 / 10,
            version: env!("CARGO_PKG_VERSION").to_string(),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse::<SocketAddr>("SEQUENCE_DUEL_BIND") {
            config.bind_addr = addr;
        }
        if let Some(capacity) = env_parse::<usize>("SEQUENCE_DUEL_MAILBOX").filter(|&c| c > 0) {
            config.mailbox_capacity = capacity;
        }
        if let Some(secs) = env_parse::<u64>("SEQUENCE_DUEL_PONG_TIMEOUT_SECS").filter(|&s| s > 0) {
            config.pong_timeout = Duration::from_secs(secs);
            config.ping_interval = config.pong_timeout * 9 / 10;
        }
        if let Some(ms) = env_parse::<u64>("SEQUENCE_DUEL_REVEAL_STAGGER_MS") {
            config.room.reveal_stagger = Duration::from_millis(ms);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection time.
    connected_at: Instant,
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Live rooms.
    registry: Arc<RoomRegistry>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry: Arc::new(RoomRegistry::new(config.room.clone())),
            config,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            "Sequence Duel server v{} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let registry = self.registry.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ws_config = WebSocketConfig::default();
            ws_config.max_message_size = Some(config.max_message_size);
            ws_config.max_frame_size = Some(config.max_message_size);

            let ws_stream = match accept_async_with_config(stream, Some(ws_config)).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, msg_rx) = mpsc::channel::<ServerMessage>(config.mailbox_capacity);
            let mut connection = Connection::new(registry, msg_tx);

            clients.write().await.insert(
                addr,
                ConnectedClient {
                    connected_at: Instant::now(),
                },
            );

            let mut sender_task = tokio::spawn(Self::run_writer(ws_sender, msg_rx, config.clone(), addr));

            // Any inbound frame, pongs included, proves the peer is alive.
            let mut deadline = tokio::time::Instant::now() + config.pong_timeout;
            loop {
                tokio::select! {
                    // A dead outbound side ends the session like a read error.
                    _ = &mut sender_task => {
                        info!("Writer for {} stopped, closing connection", addr);
                        break;
                    }
                    msg = timeout_at(deadline, ws_receiver.next()) => {
                        let msg = match msg {
                            Ok(msg) => msg,
                            Err(_) => {
                                info!("Client {} timed out", addr);
                                break;
                            }
                        };
                        deadline = tokio::time::Instant::now() + config.pong_timeout;

                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                connection.handle_text(&text).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                debug!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            connection.close().await;
            sender_task.abort();

            if let Some(client) = clients.write().await.remove(&addr) {
                debug!(
                    "Client {} cleaned up after {:?}",
                    addr,
                    client.connected_at.elapsed()
                );
            }
        });
    }

    /// Drain the mailbox into the socket and send periodic pings.
    async fn run_writer(
        mut ws_sender: WsSink,
        mut msg_rx: mpsc::Receiver<ServerMessage>,
        config: ServerConfig,
        addr: SocketAddr,
    ) {
        let mut ticker = interval_at(
            tokio::time::Instant::now() + config.ping_interval,
            config.ping_interval,
        );

        loop {
            let frame = tokio::select! {
                msg = msg_rx.recv() => match msg {
                    Some(msg) => match msg.to_json() {
                        Ok(text) => Message::Text(text),
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    },
                    None => {
                        let _ = timeout(config.write_timeout, ws_sender.send(Message::Close(None))).await;
                        break;
                    }
                },
                _ = ticker.tick() => Message::Ping(Vec::new()),
            };

            match timeout(config.write_timeout, ws_sender.send(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Write to {} failed: {}", addr, e);
                    break;
                }
                Err(_) => {
                    warn!("Write to {} timed out", addr);
                    break;
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get live room count.
    pub async fn room_count(&self) -> usize {
        self.registry.room_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{PlayerNumber, TOTAL_PLACEMENTS};
    use futures_util::stream::SplitStream;
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::MaybeTlsStream;

    type ClientStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
    type ClientSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

    async fn start_server(config: ServerConfig) -> (Arc<GameServer>, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(GameServer::new(config));
        tokio::spawn({
            let server = server.clone();
            async move { server.serve(listener).await }
        });
        (server, format!("ws://{}", addr))
    }

    async fn connect(url: &str) -> (ClientSink, ClientStream) {
        let (ws, _) = connect_async(url).await.unwrap();
        ws.split()
    }

    async fn send_json(tx: &mut ClientSink, value: serde_json::Value) {
        tx.send(Message::Text(value.to_string())).await.unwrap();
    }

    /// Alice creates a room, Bob joins without reading anything back.
    async fn pair_over_websocket(url: &str) -> (ClientSink, ClientStream, ClientSink, ClientStream) {
        let (mut alice_tx, mut alice_rx) = connect(url).await;
        send_json(&mut alice_tx, json!({ "type": "create_room", "name": "Alice" })).await;
        let code = match next_message(&mut alice_rx).await {
            ServerMessage::RoomCreated { room_code, .. } => room_code,
            other => panic!("unexpected {:?}", other),
        };

        let (mut bob_tx, bob_rx) = connect(url).await;
        send_json(&mut bob_tx, json!({ "type": "join_room", "name": "Bob", "roomCode": code })).await;
        assert!(matches!(
            next_message(&mut alice_rx).await,
            ServerMessage::PlayerJoined { player_number: PlayerNumber::One, .. }
        ));
        (alice_tx, alice_rx, bob_tx, bob_rx)
    }

    /// Read until a disconnect notice arrives, within `limit`.
    async fn wait_for_disconnect(stream: &mut ClientStream, limit: Duration) -> String {
        timeout(limit, async {
            loop {
                if let ServerMessage::PlayerDisconnected { player_name, .. } = next_message(stream).await {
                    return player_name;
                }
            }
        })
        .await
        .expect("partner was never told about the disconnect")
    }

    async fn wait_for_no_rooms(server: &GameServer) {
        for _ in 0..100 {
            if server.room_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("room was never deregistered");
    }

    async fn next_message(stream: &mut ClientStream) -> ServerMessage {
        loop {
            let frame = timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out waiting for message")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.mailbox_capacity, 64);
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.ping_interval, Duration::from_secs(54));
        assert_eq!(config.room.reveal_stagger, Duration::from_millis(800));
        assert!(config.ping_interval < config.pong_timeout);
    }

    #[test]
    fn test_mailbox_fits_reveal_burst_with_room_to_spare() {
        // Final swap result, one card per placement, then the game result.
        let burst = 1 + TOTAL_PLACEMENTS as usize + 1;
        assert!(ServerConfig::default().mailbox_capacity >= 2 * burst);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config);

        assert_eq!(server.connection_count().await, 0);
        assert_eq!(server.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Arc::new(GameServer::new(ServerConfig::default()));

        let handle = tokio::spawn({
            let server = server.clone();
            async move { server.serve(listener).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        server.shutdown();

        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_and_join_over_websocket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(GameServer::new(ServerConfig::default()));
        tokio::spawn({
            let server = server.clone();
            async move { server.serve(listener).await }
        });

        let url = format!("ws://{}", addr);
        let (alice, _) = connect_async(url.as_str()).await.unwrap();
        let (mut alice_tx, mut alice_rx) = alice.split();
        alice_tx
            .send(Message::Text(json!({ "type": "create_room", "name": "Alice" }).to_string()))
            .await
            .unwrap();
        let code = match next_message(&mut alice_rx).await {
            ServerMessage::RoomCreated { room_code, .. } => room_code,
            other => panic!("unexpected {:?}", other),
        };

        let (bob, _) = connect_async(url.as_str()).await.unwrap();
        let (mut bob_tx, mut bob_rx) = bob.split();
        bob_tx
            .send(Message::Text(
                json!({ "type": "join_room", "name": "Bob", "roomCode": code }).to_string(),
            ))
            .await
            .unwrap();

        assert!(matches!(
            next_message(&mut bob_rx).await,
            ServerMessage::PlayerJoined { player_number: PlayerNumber::Two, .. }
        ));
        assert!(matches!(next_message(&mut bob_rx).await, ServerMessage::TurnOrderPrompt { .. }));
        assert!(matches!(
            next_message(&mut alice_rx).await,
            ServerMessage::PlayerJoined { player_number: PlayerNumber::One, .. }
        ));
        assert_eq!(server.room_count().await, 1);

        // Dropping Bob's socket notifies Alice.
        drop(bob_tx);
        drop(bob_rx);
        loop {
            if let ServerMessage::PlayerDisconnected { player_name, .. } = next_message(&mut alice_rx).await {
                assert_eq!(player_name, "Bob");
                break;
            }
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let config = ServerConfig {
            ping_interval: Duration::from_millis(100),
            pong_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let (server, url) = start_server(config).await;
        let (alice_tx, mut alice_rx, _bob_tx, _bob_rx) = pair_over_websocket(&url).await;

        // Bob never polls, so never answers a ping.
        assert_eq!(wait_for_disconnect(&mut alice_rx, Duration::from_secs(5)).await, "Bob");
        assert_eq!(server.room_count().await, 1);

        // Exactly one notice.
        let extra = timeout(Duration::from_millis(300), async {
            loop {
                if let ServerMessage::PlayerDisconnected { .. } = next_message(&mut alice_rx).await {
                    return;
                }
            }
        })
        .await;
        assert!(extra.is_err());

        drop(alice_tx);
        drop(alice_rx);
        wait_for_no_rooms(&server).await;
        server.shutdown();
    }

    #[tokio::test]
    async fn test_stalled_writer_ends_session() {
        let config = ServerConfig {
            write_timeout: Duration::from_millis(200),
            ping_interval: Duration::from_secs(27),
            pong_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let (server, url) = start_server(config).await;
        let (alice_tx, mut alice_rx, mut bob_tx, bob_rx) = pair_over_websocket(&url).await;

        // Bob keeps sending but never reads, so the server's writes to him stall
        // while his inbound frames keep the read deadline fresh.
        let flood = tokio::spawn(async move {
            let big = json!({ "type": "echo", "payload": "x".repeat(3900) }).to_string();
            for _ in 0..8000 {
                if bob_tx.send(Message::Text(big.clone())).await.is_err() {
                    return;
                }
            }
            let small = json!({ "type": "echo" }).to_string();
            loop {
                if bob_tx.send(Message::Text(small.clone())).await.is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });

        assert_eq!(wait_for_disconnect(&mut alice_rx, Duration::from_secs(10)).await, "Bob");

        drop(alice_tx);
        drop(alice_rx);
        wait_for_no_rooms(&server).await;

        flood.abort();
        drop(bob_rx);
        server.shutdown();
    }
}
