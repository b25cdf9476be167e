//! Fire-and-forget broadcast between local instances of the same room.
//! Delivery is best-effort, unordered across senders, and lossy when nobody
//! is listening; the design is last-snapshot-wins.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Buffered messages per channel before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 64;

/// Wire envelope. Anything that fails to parse into one of these shapes is
/// dropped on receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    /// Full-state snapshot; receivers adopt it wholesale.
    State { state: GameState },
    /// Out-of-band wipe signal. Receivers clear and reset but never relay
    /// it, so resets cannot loop between more than two instances.
    HardReset { room_id: RoomId, at: i64 },
}

impl BusMessage {
    pub fn state(state: GameState) -> Self {
        BusMessage::State { state }
    }

    pub fn hard_reset(room_id: impl Into<RoomId>) -> Self {
        BusMessage::HardReset {
            room_id: room_id.into(),
            at: now_ms(),
        }
    }

    pub fn to_json(&self) -> String {
        // The envelope is plain data; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Channel name for a room's authoritative state traffic.
pub fn game_channel(room_id: &str) -> String {
    format!("game:{room_id}")
}

/// Channel name for the board display mirror.
pub fn board_channel(room_id: &str) -> String {
    format!("board:{room_id}")
}

/// Parse and validate an incoming payload for a specific room. Returns
/// `None` (and logs) for malformed envelopes, foreign rooms, or snapshots
/// from another engine generation.
pub fn parse_for_room(raw: &str, room_id: &str) -> Option<BusMessage> {
    let message: BusMessage = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(room = %room_id, error = %e, "dropping malformed broadcast message");
            return None;
        }
    };

    match &message {
        BusMessage::State { state } => {
            if state.schema_version != SCHEMA_VERSION {
                tracing::warn!(
                    room = %room_id,
                    got = state.schema_version,
                    expected = SCHEMA_VERSION,
                    "dropping snapshot from another engine generation"
                );
                return None;
            }
            if state.room_id != room_id {
                tracing::debug!(room = %room_id, foreign = %state.room_id, "ignoring foreign-room snapshot");
                return None;
            }
        }
        BusMessage::HardReset { room_id: target, .. } => {
            if target != room_id {
                tracing::debug!(room = %room_id, foreign = %target, "ignoring foreign-room hard reset");
                return None;
            }
        }
    }
    Some(message)
}

/// Publish/subscribe port, one logical channel per room. The engine only
/// depends on this interface, so a server-relayed transport can drop in
/// without touching game logic.
pub trait Bus: Send + Sync {
    fn publish(&self, channel: &str, payload: String);
    fn subscribe(&self, channel: &str) -> broadcast::Receiver<String>;
}

/// In-process fan-out over tokio broadcast channels, one per channel name.
#[derive(Default)]
pub struct LocalBus {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Bus for LocalBus {
    fn publish(&self, channel: &str, payload: String) {
        // No receivers connected is fine.
        let _ = self.sender(channel).send(payload);
    }

    fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender(channel).subscribe()
    }
}
