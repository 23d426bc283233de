//! Sequence Duel Server
//!
//! Serves the game over WebSocket until Ctrl-C.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use sequence_duel::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    info!("Sequence Duel Server v{}", VERSION);
    info!(
        "mailbox {} messages, pong timeout {:?}, reveal stagger {:?}",
        config.mailbox_capacity, config.pong_timeout, config.room.reveal_stagger
    );

    let server = Arc::new(GameServer::new(config));

    let shutdown = {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                server.shutdown();
            }
        })
    };

    server.run().await?;
    shutdown.abort();
    Ok(())
}
