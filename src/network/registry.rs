//! Room Registry
//!
//! Maps short room codes to live rooms. Codes are drawn from an alphabet
//! without look-alike glyphs and compared case-insensitively.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::RngCore;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::core::rng::{uniform_below, RngError};
use crate::network::room::{Room, RoomConfig};

/// Characters in a room code.
pub const CODE_LENGTH: usize = 4;

/// Code alphabet. Excludes 0, O, 1, I and L.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Collision retries before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 100;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Every attempt collided with a live code.
    #[error("no free room code after 100 attempts")]
    CodesExhausted,

    /// Randomness failed while drawing a code.
    #[error(transparent)]
    Rng(#[from] RngError),
}

/// Draw one room code.
pub fn generate_code<R: RngCore + ?Sized>(rng: &mut R) -> Result<String, RngError> {
    let mut code = String::with_capacity(CODE_LENGTH);
    for _ in 0..CODE_LENGTH {
        let i = uniform_below(rng, CODE_ALPHABET.len() as u32)?;
        code.push(CODE_ALPHABET[i as usize] as char);
    }
    Ok(code)
}

/// Canonical form of a typed code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// All live rooms.
pub struct RoomRegistry {
    rooms: RwLock<BTreeMap<String, Arc<Room>>>,
    config: RoomConfig,
}

impl RoomRegistry {
    /// Create an empty registry whose rooms use `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// Settings handed to every room.
    pub fn room_config(&self) -> &RoomConfig {
        &self.config
    }

    /// Register a new empty room under a fresh code.
    pub async fn create<R: RngCore + Send + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Arc<Room>, RegistryError> {
        let mut rooms = self.rooms.write().await;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(rng)?;
            if rooms.contains_key(&code) {
                continue;
            }

            let room = Arc::new(Room::new(code.clone(), self.config.clone()));
            rooms.insert(code.clone(), room.clone());
            info!(room = %code, "room created");
            return Ok(room);
        }
        Err(RegistryError::CodesExhausted)
    }

    /// Find a room by code, ignoring case and surrounding whitespace.
    pub async fn lookup(&self, code: &str) -> Option<Arc<Room>> {
        let rooms = self.rooms.read().await;
        rooms.get(&normalize_code(code)).cloned()
    }

    /// Deregister a room by code.
    pub async fn remove(&self, code: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let removed = rooms.remove(&normalize_code(code)).is_some();
        if removed {
            info!(room = %code, "room removed");
        }
        removed
    }

    /// Deregister `room` only if its code still maps to this very room.
    pub async fn remove_room(&self, room: &Arc<Room>) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get(room.code()) {
            Some(current) if Arc::ptr_eq(current, room) => {
                rooms.remove(room.code());
                info!(room = %room.code(), "room removed");
                true
            }
            _ => false,
        }
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
