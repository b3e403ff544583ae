//! Live rooms by code.
//!
//! The registry only hands out channels. Each room's state lives on its own
//! task, and connections talk to it through a `RoomHandle`.

use crate::config::ServerConfig;
use crate::error::GameError;
use crate::room::{run_room, Outbound, PlayerId, Room, RoomCommand};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use pong_shared::protocol::Side;
use rand::Rng;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// No 0/O or 1/I, so codes survive being read aloud.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_CODE_ATTEMPTS: usize = 32;

pub fn generate_room_code<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are typed by people; accept any case and stray whitespace.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Command side of a room. This is all a connection keeps after joining, so
/// its broadcast subscription closes once the room task ends.
#[derive(Clone)]
pub struct RoomSender {
    code: String,
    cmd_tx: mpsc::Sender<RoomCommand>,
}

impl RoomSender {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub async fn send(&self, cmd: RoomCommand) -> Result<(), GameError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| GameError::RoomNotFound(self.code.clone()))
    }
}

/// Registry entry: commands plus the means to subscribe.
#[derive(Clone)]
pub struct RoomHandle {
    sender: RoomSender,
    broadcast_tx: broadcast::Sender<Outbound>,
}

impl RoomHandle {
    pub fn code(&self) -> &str {
        self.sender.code()
    }

    pub async fn send(&self, cmd: RoomCommand) -> Result<(), GameError> {
        self.sender.send(cmd).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.broadcast_tx.subscribe()
    }
}

/// A successful join: the side taken plus a subscription opened before the
/// join was processed, so no frame about it is missed.
pub struct Membership {
    pub room: RoomSender,
    pub side: Side,
    pub rx: broadcast::Receiver<Outbound>,
}

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    rooms: DashMap<String, RoomHandle>,
    config: ServerConfig,
    next_player_id: AtomicU32,
    rooms_created: AtomicU64,
}

impl SessionRegistry {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: DashMap::new(),
                config,
                next_player_id: AtomicU32::new(1),
                rooms_created: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn next_player_id(&self) -> PlayerId {
        self.inner.next_player_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn get_room(&self, code: &str) -> Option<RoomHandle> {
        self.inner
            .rooms
            .get(&normalize_room_code(code))
            .map(|entry| entry.value().clone())
    }

    pub fn remove_room(&self, code: &str) {
        if self.inner.rooms.remove(code).is_some() {
            tracing::info!("Room {} removed ({} active)", code, self.room_count());
        }
    }

    /// Register an empty room under a fresh code and start its loop.
    pub fn create_room(&self) -> Result<RoomHandle, GameError> {
        let config = &self.inner.config;
        if self.room_count() >= config.max_rooms {
            tracing::warn!("Refusing new room: {} rooms active", self.room_count());
            return Err(GameError::RegistryFull);
        }

        let mut rng = rand::thread_rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code(&mut rng, config.room_code_len);
            let Entry::Vacant(slot) = self.inner.rooms.entry(code.clone()) else {
                continue;
            };

            let (cmd_tx, cmd_rx) = mpsc::channel(config.room_command_capacity);
            let (broadcast_tx, _) = broadcast::channel(config.room_broadcast_capacity);
            let handle = RoomHandle {
                sender: RoomSender {
                    code: code.clone(),
                    cmd_tx,
                },
                broadcast_tx: broadcast_tx.clone(),
            };
            slot.insert(handle.clone());

            let seed = self.room_seed(&mut rng);
            let room = Room::new(code.clone(), config.physics, seed);
            tokio::spawn(run_room(
                room,
                cmd_rx,
                broadcast_tx,
                self.clone(),
                config.tick_interval(),
                config.physics.max_dt,
            ));

            tracing::info!("Room {} created ({} active)", code, self.room_count());
            return Ok(handle);
        }

        tracing::error!("Could not find a free room code");
        Err(GameError::RegistryFull)
    }

    /// Take a free side in the room with this code.
    pub async fn join_room(
        &self,
        code: &str,
        player_id: PlayerId,
    ) -> Result<Membership, GameError> {
        let handle = self
            .get_room(code)
            .ok_or_else(|| GameError::RoomNotFound(normalize_room_code(code)))?;
        self.join(handle, player_id).await
    }

    pub async fn join(
        &self,
        handle: RoomHandle,
        player_id: PlayerId,
    ) -> Result<Membership, GameError> {
        let rx = handle.subscribe();
        let (response, answer) = oneshot::channel();
        handle
            .send(RoomCommand::Join {
                player_id,
                response,
            })
            .await?;
        let side = answer
            .await
            .map_err(|_| GameError::RoomNotFound(handle.code().to_string()))??;
        Ok(Membership {
            room: handle.sender,
            side,
            rx,
        })
    }

    fn room_seed<R: Rng>(&self, rng: &mut R) -> u64 {
        let n = self.inner.rooms_created.fetch_add(1, Ordering::Relaxed);
        match self.inner.config.rng_seed {
            Some(seed) => seed.wrapping_add(n),
            None => rng.gen(),
        }
    }
}
