//! Room-scoped persistence. The engine only sees the `RoomStore` port, a
//! plain key-value surface, so reducers and tallies stay testable without a
//! real storage backend. Keys are namespaced per room:
//! `game:<roomId>` (state), `game:<roomId>:draft` (setup draft),
//! `board:<roomId>` (display mirror).

use crate::board::BoardState;
use crate::types::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored record is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Injected key-value port. Absence of a key is `Ok(None)`, never an error.
pub trait RoomStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

pub fn state_key(room_id: &str) -> String {
    format!("game:{room_id}")
}

pub fn draft_key(room_id: &str) -> String {
    format!("game:{room_id}:draft")
}

pub fn board_key(room_id: &str) -> String {
    format!("board:{room_id}")
}

/// In-memory store for tests and the demo binary.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory; the local-device persistence
/// backend.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        // Room ids are opaque strings; keep filenames safe.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl RoomStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::write(self.path(key), value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Load a room's state; a missing room is a fresh room, not an error.
pub fn load_room(store: &(impl RoomStore + ?Sized), room_id: &str) -> Result<Option<GameState>, StoreError> {
    match store.get(&state_key(room_id))? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn save_room(store: &(impl RoomStore + ?Sized), room_id: &str, state: &GameState) -> Result<(), StoreError> {
    store.set(&state_key(room_id), &serde_json::to_string(state)?)
}

pub fn clear_room(store: &(impl RoomStore + ?Sized), room_id: &str) -> Result<(), StoreError> {
    store.delete(&state_key(room_id))
}

pub fn load_draft(store: &(impl RoomStore + ?Sized), room_id: &str) -> Result<Option<SetupDraft>, StoreError> {
    match store.get(&draft_key(room_id))? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn save_draft(
    store: &(impl RoomStore + ?Sized),
    room_id: &str,
    draft: &SetupDraft,
) -> Result<(), StoreError> {
    store.set(&draft_key(room_id), &serde_json::to_string(draft)?)
}

pub fn clear_draft(store: &(impl RoomStore + ?Sized), room_id: &str) -> Result<(), StoreError> {
    store.delete(&draft_key(room_id))
}

pub fn load_board(store: &(impl RoomStore + ?Sized), room_id: &str) -> Result<Option<BoardState>, StoreError> {
    match store.get(&board_key(room_id))? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn save_board(
    store: &(impl RoomStore + ?Sized),
    room_id: &str,
    board: &BoardState,
) -> Result<(), StoreError> {
    store.set(&board_key(room_id), &serde_json::to_string(board)?)
}

pub fn clear_board(store: &(impl RoomStore + ?Sized), room_id: &str) -> Result<(), StoreError> {
    store.delete(&board_key(room_id))
}
