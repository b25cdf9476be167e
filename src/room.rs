//! Per-room glue: owns the authoritative `GameState` on this device, runs
//! events through the reducer, and performs the persistence/broadcast side
//! effects that follow a successful transition. When opened as the writer
//! role it also mirrors every change onto the board display schema.

use crate::board::BoardBridge;
use crate::bus::{self, Bus, BusMessage};
use crate::engine::{self, GameEvent};
use crate::store::{self, RoomStore, StoreError};
use crate::types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct GameRoom<S: RoomStore, B: Bus> {
    room_id: RoomId,
    store: Arc<S>,
    bus: Arc<B>,
    /// Present when this instance is the writer role and mirrors onto the
    /// board display schema.
    bridge: Option<BoardBridge<S, B>>,
    state: GameState,
}

impl<S: RoomStore, B: Bus> GameRoom<S, B> {
    /// Open a room: last persisted state, or a fresh empty one.
    pub fn open(
        room_id: impl Into<RoomId>,
        store: Arc<S>,
        bus: Arc<B>,
        mirror_to_board: bool,
    ) -> Result<Self, RoomError> {
        let room_id = room_id.into();
        let state = store::load_room(store.as_ref(), &room_id)?
            .unwrap_or_else(|| GameState::empty(room_id.clone()));
        let bridge = mirror_to_board.then(|| BoardBridge::new(store.clone(), bus.clone()));
        Ok(Self {
            room_id,
            store,
            bus,
            bridge,
            state,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Subscribe to this room's state traffic.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<String> {
        self.bus.subscribe(&bus::game_channel(&self.room_id))
    }

    /// Run one event through the reducer. A rejected event leaves the state
    /// untouched and performs no side effects; an applied one is persisted,
    /// broadcast, and mirrored to the board when this room is the writer.
    pub fn dispatch(&mut self, event: &GameEvent) -> Result<&GameState, RoomError> {
        let next = engine::apply(&self.state, event);
        if next != self.state {
            self.state = next;
            self.persist_and_publish()?;
        }
        Ok(&self.state)
    }

    /// Validate and adopt an incoming broadcast payload. Returns whether the
    /// message changed anything. Hard resets are consumed, never relayed.
    pub fn handle_message(&mut self, raw: &str) -> Result<bool, RoomError> {
        match bus::parse_for_room(raw, &self.room_id) {
            Some(BusMessage::State { state }) => {
                if state == self.state {
                    return Ok(false);
                }
                // Last snapshot wins; receivers never re-derive phases.
                self.state = state;
                store::save_room(self.store.as_ref(), &self.room_id, &self.state)?;
                if let Some(bridge) = &self.bridge {
                    bridge.publish(&self.room_id, &self.state)?;
                }
                Ok(true)
            }
            Some(BusMessage::HardReset { at, .. }) => {
                tracing::info!(room = %self.room_id, at, "hard reset received, wiping room");
                self.wipe(true)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Unconditionally wipe the room: clear persistence (optionally the
    /// setup draft too), reset to empty, and tell every other instance.
    /// The initiator broadcasts; receivers consume without relaying.
    pub fn hard_reset(&mut self, clear_setup_draft: bool) -> Result<(), RoomError> {
        self.wipe(clear_setup_draft)?;
        self.bus.publish(
            &bus::game_channel(&self.room_id),
            BusMessage::hard_reset(self.room_id.clone()).to_json(),
        );
        Ok(())
    }

    fn wipe(&mut self, clear_setup_draft: bool) -> Result<(), RoomError> {
        store::clear_room(self.store.as_ref(), &self.room_id)?;
        if clear_setup_draft {
            store::clear_draft(self.store.as_ref(), &self.room_id)?;
        }
        if let Some(bridge) = &self.bridge {
            bridge.clear_mirror(&self.room_id)?;
        }
        self.state = GameState::empty(self.room_id.clone());
        Ok(())
    }

    /// Deadline for the writing turn that is open right now, per the
    /// configured turn length. Feed this to `schedule_turn_timeout`.
    pub fn turn_deadline(&self) -> Instant {
        Instant::now() + Duration::from_secs(u64::from(self.state.config.turn_seconds))
    }

    pub fn load_setup_draft(&self) -> Result<Option<SetupDraft>, RoomError> {
        Ok(store::load_draft(self.store.as_ref(), &self.room_id)?)
    }

    pub fn save_setup_draft(&self, draft: &SetupDraft) -> Result<(), RoomError> {
        Ok(store::save_draft(self.store.as_ref(), &self.room_id, draft)?)
    }

    fn persist_and_publish(&self) -> Result<(), RoomError> {
        store::save_room(self.store.as_ref(), &self.room_id, &self.state)?;
        self.bus.publish(
            &bus::game_channel(&self.room_id),
            BusMessage::state(self.state.clone()).to_json(),
        );
        if let Some(bridge) = &self.bridge {
            bridge.publish(&self.room_id, &self.state)?;
        }
        Ok(())
    }
}

/// Single-fire guard shared between a scheduled timeout and the manual
/// submission path: whichever fires first wins, the other becomes a no-op.
#[derive(Default)]
pub struct TurnGuard {
    fired: AtomicBool,
}

impl TurnGuard {
    /// Claim the turn. True exactly once per guard.
    pub fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }
}

/// Schedule the auto-skip for one specific writing turn. When the deadline
/// passes and neither the guard nor the turn has moved on, a single blank
/// `SubmitCard` (a skip) is dispatched. Manual submission should call
/// `guard.fire()` first to disarm the timer.
pub fn schedule_turn_timeout<S, B>(
    room: Arc<Mutex<GameRoom<S, B>>>,
    deadline: Instant,
    round: u32,
    player_index: usize,
) -> Arc<TurnGuard>
where
    S: RoomStore + 'static,
    B: Bus + 'static,
{
    let guard = Arc::new(TurnGuard::default());
    let task_guard = guard.clone();

    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        if !task_guard.fire() {
            return;
        }

        let mut room = match room.lock() {
            Ok(room) => room,
            Err(_) => return,
        };
        let state = room.state();
        let still_this_turn = state.phase == GamePhase::P1Writing
            && state.p1.round == round
            && state.p1.player_index == player_index;
        if !still_this_turn {
            return;
        }

        let Some(player_id) = state.players.get(player_index).map(|p| p.id.clone()) else {
            return;
        };
        tracing::debug!(room = %room.room_id(), round, player_index, "turn timer expired, skipping");
        if let Err(e) = room.dispatch(&GameEvent::SubmitCard {
            player_id,
            text: String::new(),
        }) {
            tracing::warn!(room = %room.room_id(), error = %e, "failed to dispatch timed skip");
        }
    });

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::store::MemoryStore;

    fn start_event() -> GameEvent {
        GameEvent::StartGame {
            player_names: vec!["Ada".into(), "Ben".into()],
            config: GameConfig {
                rounds: 1,
                ..GameConfig::default()
            },
            prompts: vec!["prompt".into()],
            theme: "theme".into(),
        }
    }

    fn open_room(
        store: &Arc<MemoryStore>,
        bus: &Arc<LocalBus>,
        mirror: bool,
    ) -> GameRoom<MemoryStore, LocalBus> {
        GameRoom::open("room-1", store.clone(), bus.clone(), mirror).unwrap()
    }

    #[tokio::test]
    async fn dispatch_persists_and_broadcasts() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&store, &bus, false);
        let mut rx = room.subscribe();

        room.dispatch(&start_event()).unwrap();

        let persisted = store::load_room(store.as_ref(), "room-1").unwrap().unwrap();
        assert_eq!(persisted.phase, GamePhase::P1Writing);

        let raw = rx.recv().await.unwrap();
        match bus::parse_for_room(&raw, "room-1").unwrap() {
            BusMessage::State { state } => assert_eq!(state, persisted),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_event_has_no_side_effects() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&store, &bus, false);
        let mut rx = room.subscribe();

        // CloseVoting is invalid in SETUP.
        room.dispatch(&GameEvent::CloseVoting).unwrap();

        assert!(store::load_room(store.as_ref(), "room-1").unwrap().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn receiver_adopts_snapshot() {
        let store_a = Arc::new(MemoryStore::new());
        let store_b = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut writer = GameRoom::open("room-1", store_a, bus.clone(), false).unwrap();
        let mut reader = GameRoom::open("room-1", store_b.clone(), bus.clone(), false).unwrap();
        let mut rx = reader.subscribe();

        writer.dispatch(&start_event()).unwrap();
        let raw = rx.recv().await.unwrap();
        assert!(reader.handle_message(&raw).unwrap());

        assert_eq!(reader.state(), writer.state());
        // Adopted snapshots are persisted locally too.
        let persisted = store::load_room(store_b.as_ref(), "room-1").unwrap().unwrap();
        assert_eq!(&persisted, writer.state());
    }

    #[tokio::test]
    async fn hard_reset_receiver_does_not_relay() {
        let bus = Arc::new(LocalBus::new());
        let mut initiator =
            GameRoom::open("room-1", Arc::new(MemoryStore::new()), bus.clone(), false).unwrap();
        let store_b = Arc::new(MemoryStore::new());
        let mut receiver = GameRoom::open("room-1", store_b.clone(), bus.clone(), false).unwrap();

        initiator.dispatch(&start_event()).unwrap();
        let mut rx = receiver.subscribe();
        initiator.hard_reset(true).unwrap();

        // The subscription was opened after the state snapshot, so the
        // first message is the reset itself.
        let raw = rx.recv().await.unwrap();
        let mut echo_rx = receiver.subscribe();
        assert!(receiver.handle_message(&raw).unwrap());

        assert_eq!(receiver.state().phase, GamePhase::Setup);
        assert!(store::load_room(store_b.as_ref(), "room-1").unwrap().is_none());
        // The receiver consumed the reset without re-emitting it.
        assert!(echo_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn foreign_room_messages_leave_state_unchanged() {
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&Arc::new(MemoryStore::new()), &bus, false);
        room.dispatch(&start_event()).unwrap();
        let before = room.state().clone();

        // Scenario D: a hard reset for some other room arrives.
        let foreign = BusMessage::hard_reset("other-room").to_json();
        assert!(!room.handle_message(&foreign).unwrap());
        assert_eq!(room.state(), &before);

        let garbage = "{\"type\":\"state\",\"state\":42}";
        assert!(!room.handle_message(garbage).unwrap());
        assert_eq!(room.state(), &before);
    }

    #[tokio::test]
    async fn writer_room_mirrors_to_board() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&store, &bus, true);

        room.dispatch(&start_event()).unwrap();

        let board = store::load_board(store.as_ref(), "room-1").unwrap().unwrap();
        assert_eq!(board.phase, crate::board::BoardPhase::Writing);
        assert_eq!(board.players.len(), 2);
    }

    #[tokio::test]
    async fn reopening_restores_persisted_state() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        {
            let mut room = open_room(&store, &bus, false);
            room.dispatch(&start_event()).unwrap();
        }
        let reopened = open_room(&store, &bus, false);
        assert_eq!(reopened.state().phase, GamePhase::P1Writing);
    }

    #[tokio::test]
    async fn setup_draft_survives_soft_clear_only() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&store, &bus, false);
        room.save_setup_draft(&SetupDraft {
            player_names: vec!["Ada".into()],
            ..SetupDraft::default()
        })
        .unwrap();

        room.hard_reset(false).unwrap();
        assert!(room.load_setup_draft().unwrap().is_some());

        room.hard_reset(true).unwrap();
        assert!(room.load_setup_draft().unwrap().is_none());
    }

    #[test]
    fn turn_guard_fires_once() {
        let guard = TurnGuard::default();
        assert!(guard.fire());
        assert!(!guard.fire());
        assert!(!guard.fire());
    }

    #[tokio::test]
    async fn timer_skips_the_stalled_turn() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&store, &bus, false);
        room.dispatch(&GameEvent::StartGame {
            player_names: vec!["Ada".into(), "Ben".into()],
            config: GameConfig {
                rounds: 1,
                turn_seconds: 0,
                ..GameConfig::default()
            },
            prompts: vec!["prompt".into()],
            theme: "theme".into(),
        })
        .unwrap();
        let room = Arc::new(Mutex::new(room));

        // The deadline comes out of the room's own turn configuration.
        let deadline = room.lock().unwrap().turn_deadline();
        schedule_turn_timeout(room.clone(), deadline, 1, 0);
        tokio::time::sleep(Duration::from_millis(80)).await;

        let room = room.lock().unwrap();
        // The turn advanced without creating a card.
        assert_eq!(room.state().p1.player_index, 1);
        assert!(room.state().p1.cards.is_empty());
    }

    #[tokio::test]
    async fn disarmed_timer_never_fires() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&store, &bus, false);
        room.dispatch(&start_event()).unwrap();
        let room = Arc::new(Mutex::new(room));

        let guard = schedule_turn_timeout(
            room.clone(),
            Instant::now() + Duration::from_millis(20),
            1,
            0,
        );
        // Manual submission wins the guard first.
        assert!(guard.fire());
        {
            let mut room = room.lock().unwrap();
            let player_id = room.state().players[0].id.clone();
            room.dispatch(&GameEvent::SubmitCard {
                player_id,
                text: "written in time".into(),
            })
            .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        let room = room.lock().unwrap();
        assert_eq!(room.state().p1.cards.len(), 1);
        assert_eq!(room.state().p1.player_index, 1);
    }

    #[tokio::test]
    async fn stale_timer_is_a_noop_after_turn_moved_on() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let mut room = open_room(&store, &bus, false);
        room.dispatch(&start_event()).unwrap();
        let room = Arc::new(Mutex::new(room));

        // Timer armed for turn 0, but the turn completes and play moves on
        // without disarming (e.g. a raced snapshot adoption).
        schedule_turn_timeout(
            room.clone(),
            Instant::now() + Duration::from_millis(20),
            1,
            0,
        );
        {
            let mut room = room.lock().unwrap();
            let player_id = room.state().players[0].id.clone();
            room.dispatch(&GameEvent::SubmitCard {
                player_id,
                text: "quick".into(),
            })
            .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        let room = room.lock().unwrap();
        // The guard fired but the turn check kept it from double-skipping.
        assert_eq!(room.state().p1.player_index, 1);
        assert_eq!(room.state().p1.cards.len(), 1);
    }
}
