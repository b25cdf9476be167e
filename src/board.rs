//! Board bridge: projects the authoritative engine state onto the older,
//! display-only schema consumed by the shared board screen. The two schemas
//! evolved independently, so the mapping is an explicit, exhaustive
//! translation layer. Strictly one-directional: board state never feeds
//! back into the engine.

use crate::bus::{board_channel, Bus};
use crate::store::{self, RoomStore, StoreError};
use crate::tally;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Display-schema generation.
pub const BOARD_SCHEMA_VERSION: u32 = 1;

/// The board's flat phase names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoardPhase {
    Idle,
    Writing,
    Review,
    Voting,
    Results,
    Intro,
    Discuss,
    Ranking,
    Reveal,
}

/// Fixed 1:1 phase lookup. Exhaustive on purpose: a new engine phase must
/// be mapped here before it can ship.
pub fn map_phase(phase: GamePhase) -> BoardPhase {
    match phase {
        GamePhase::Setup => BoardPhase::Idle,
        GamePhase::P1Writing => BoardPhase::Writing,
        GamePhase::P1Review => BoardPhase::Review,
        GamePhase::P1Voting => BoardPhase::Voting,
        GamePhase::P1Results => BoardPhase::Results,
        GamePhase::P2Intro => BoardPhase::Intro,
        GamePhase::P2RankSecret => BoardPhase::Ranking,
        GamePhase::P2Discuss => BoardPhase::Discuss,
        GamePhase::P2RankFinal => BoardPhase::Ranking,
        GamePhase::Reveal => BoardPhase::Reveal,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardPlayer {
    pub id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardCard {
    pub id: CardId,
    pub number: u32,
    pub text: String,
    pub author: String,
}

/// Aggregate vote shape the board consumer expects to already exist; the
/// source schema's reveal payload does not carry it, so the bridge
/// recomputes it from the raw vote list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardTally {
    pub session_key: String,
    pub scores: HashMap<CardId, u32>,
    pub top3: Vec<CardId>,
    pub reaction_winners: HashMap<Reaction, CardId>,
}

/// Phase-2 reveal block, 1:1 with the engine's since both schemas converge
/// on the same ranking semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardFinale {
    pub top_counts: HashMap<CardId, u32>,
    pub collective_win: bool,
    pub collective_winning_card_id: Option<CardId>,
    pub winning_card_id: Option<CardId>,
    pub winning_author_id: Option<PlayerId>,
    pub is_tie: bool,
    pub tied_top_card_ids: Vec<CardId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardState {
    pub room_id: RoomId,
    pub schema_version: u32,
    pub phase: BoardPhase,
    pub players: Vec<BoardPlayer>,
    pub cards: Vec<BoardCard>,
    pub theme: Option<String>,
    pub tally: Option<BoardTally>,
    pub finale: Option<BoardFinale>,
    pub updated_at: i64,
}

impl BoardState {
    pub fn empty(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            schema_version: BOARD_SCHEMA_VERSION,
            phase: BoardPhase::Idle,
            players: Vec::new(),
            cards: Vec::new(),
            theme: None,
            tally: None,
            finale: None,
            updated_at: 0,
        }
    }
}

/// Build the board projection of an engine state.
pub fn project(source: &GameState) -> BoardState {
    // The session whose votes the board should aggregate: the open one if
    // voting is live, otherwise the most recently closed one.
    let session_key = source
        .p1_voting
        .as_ref()
        .map(|s| s.scope.session_key())
        .or_else(|| source.p1_results.as_ref().map(|r| r.session_key.clone()));

    let tally = session_key.map(|key| {
        let covered: Vec<Card> = match key.strip_prefix("round:") {
            Some(round) => {
                let round: u32 = round.parse().unwrap_or(0);
                source
                    .p1
                    .cards
                    .iter()
                    .filter(|c| c.round == round)
                    .cloned()
                    .collect()
            }
            None => source.p1.cards.clone(),
        };
        let results = tally::phase1(&covered, &source.votes, &key);
        BoardTally {
            session_key: key,
            scores: results.scores,
            top3: results.top3,
            reaction_winners: results.reaction_winners,
        }
    });

    let finale = source.reveal.as_ref().map(|reveal| BoardFinale {
        top_counts: reveal.phase2.top_counts.clone(),
        collective_win: reveal.phase2.collective_win,
        collective_winning_card_id: reveal.phase2.collective_winning_card_id.clone(),
        winning_card_id: reveal.phase2.winning_card_id.clone(),
        winning_author_id: reveal.phase2.winning_author_id.clone(),
        is_tie: reveal.phase2.is_tie,
        tied_top_card_ids: reveal.phase2.tied_top_card_ids.clone(),
    });

    BoardState {
        room_id: source.room_id.clone(),
        schema_version: BOARD_SCHEMA_VERSION,
        phase: map_phase(source.phase),
        players: source
            .players
            .iter()
            .map(|p| BoardPlayer {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect(),
        cards: source
            .p1
            .cards
            .iter()
            .map(|c| BoardCard {
                id: c.id.clone(),
                number: c.display_number,
                text: c.text.clone(),
                author: c.author_name.clone(),
            })
            .collect(),
        theme: source
            .p2
            .as_ref()
            .map(|p2| p2.theme.clone())
            .or_else(|| source.theme.clone()),
        tally,
        finale,
        updated_at: now_ms(),
    }
}

/// Persists and broadcasts board projections on the board channel.
pub struct BoardBridge<S: RoomStore, B: Bus> {
    store: Arc<S>,
    bus: Arc<B>,
}

impl<S: RoomStore, B: Bus> BoardBridge<S, B> {
    pub fn new(store: Arc<S>, bus: Arc<B>) -> Self {
        Self { store, bus }
    }

    /// Project `source` and push it to the board's persistence key and
    /// broadcast channel.
    pub fn publish(&self, room_id: &str, source: &GameState) -> Result<(), StoreError> {
        let board = project(source);
        store::save_board(self.store.as_ref(), room_id, &board)?;
        self.broadcast(room_id, &board);
        Ok(())
    }

    /// Reset the projected copy to empty and broadcast it; used when the
    /// underlying game is wiped.
    pub fn clear_mirror(&self, room_id: &str) -> Result<(), StoreError> {
        let board = BoardState {
            updated_at: now_ms(),
            ..BoardState::empty(room_id)
        };
        store::clear_board(self.store.as_ref(), room_id)?;
        self.broadcast(room_id, &board);
        Ok(())
    }

    fn broadcast(&self, room_id: &str, board: &BoardState) {
        match serde_json::to_string(board) {
            Ok(payload) => self.bus.publish(&board_channel(room_id), payload),
            Err(e) => tracing::warn!(room = %room_id, error = %e, "failed to encode board state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::store::MemoryStore;

    #[test]
    fn phase_map_is_total() {
        let phases = [
            GamePhase::Setup,
            GamePhase::P1Writing,
            GamePhase::P1Review,
            GamePhase::P1Voting,
            GamePhase::P1Results,
            GamePhase::P2Intro,
            GamePhase::P2RankSecret,
            GamePhase::P2Discuss,
            GamePhase::P2RankFinal,
            GamePhase::Reveal,
        ];
        for phase in phases {
            // Must not panic, and SETUP is the only phase mapping to IDLE.
            let mapped = map_phase(phase);
            assert_eq!(mapped == BoardPhase::Idle, phase == GamePhase::Setup);
        }
    }

    fn state_with_votes() -> GameState {
        let mut state = GameState::empty("room-b");
        for name in ["Ada", "Ben"] {
            state.players.push(Player {
                id: format!("p-{name}"),
                name: name.into(),
            });
        }
        for (i, author) in ["p-Ada", "p-Ben"].iter().enumerate() {
            state.p1.cards.push(Card {
                id: format!("c{i}"),
                round: 1,
                author_id: author.to_string(),
                author_name: author.to_string(),
                display_number: i as u32 + 1,
                text: format!("card {i}"),
                created_at: now_rfc3339(),
            });
        }
        state.votes.push(ReactionVote {
            card_id: "c1".into(),
            voter_id: "p-Ada".into(),
            reaction: Reaction::Heart,
            session_key: "round:1".into(),
        });
        state.p1_results = Some(tally::phase1(&state.p1.cards, &state.votes, "round:1"));
        state.phase = GamePhase::P1Results;
        state
    }

    #[test]
    fn projection_recomputes_tally_from_raw_votes() {
        let mut state = state_with_votes();
        // Corrupt the cached aggregate; the bridge must not trust it.
        state.p1_results.as_mut().unwrap().scores.insert("c0".into(), 99);

        let board = project(&state);
        let tally = board.tally.unwrap();

        assert_eq!(tally.scores.get("c0"), Some(&0));
        assert_eq!(tally.scores.get("c1"), Some(&1));
        assert_eq!(tally.top3.first().map(String::as_str), Some("c1"));
    }

    #[test]
    fn projection_copies_roster_and_cards() {
        let state = state_with_votes();
        let board = project(&state);

        assert_eq!(board.phase, BoardPhase::Results);
        assert_eq!(board.players.len(), 2);
        assert_eq!(board.cards.len(), 2);
        assert_eq!(board.cards[0].number, 1);
        assert_eq!(board.schema_version, BOARD_SCHEMA_VERSION);
    }

    #[test]
    fn projection_translates_finale() {
        let mut state = state_with_votes();
        state.phase = GamePhase::Reveal;
        state.reveal = Some(RevealResult {
            phase1: state.p1_results.clone(),
            phase2: Phase2Results {
                top_counts: HashMap::from([("c1".to_string(), 2)]),
                is_tie: false,
                tied_top_card_ids: vec!["c1".into()],
                winning_card_id: Some("c1".into()),
                winning_author_id: Some("p-Ben".into()),
                collective_win: true,
                collective_winning_card_id: Some("c1".into()),
            },
        });

        let board = project(&state);
        let finale = board.finale.unwrap();

        assert!(finale.collective_win);
        assert_eq!(finale.collective_winning_card_id.as_deref(), Some("c1"));
        assert_eq!(finale.winning_card_id.as_deref(), Some("c1"));
        assert!(!finale.is_tie);
    }

    #[tokio::test]
    async fn bridge_persists_and_broadcasts() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let bridge = BoardBridge::new(store.clone(), bus.clone());
        let mut rx = bus.subscribe(&board_channel("room-b"));

        let state = state_with_votes();
        bridge.publish("room-b", &state).unwrap();

        let saved = store::load_board(store.as_ref(), "room-b").unwrap().unwrap();
        assert_eq!(saved.phase, BoardPhase::Results);

        let sent: BoardState = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(sent.phase, BoardPhase::Results);
    }

    #[tokio::test]
    async fn clear_mirror_broadcasts_empty_state() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(LocalBus::new());
        let bridge = BoardBridge::new(store.clone(), bus.clone());

        bridge.publish("room-b", &state_with_votes()).unwrap();
        let mut rx = bus.subscribe(&board_channel("room-b"));
        bridge.clear_mirror("room-b").unwrap();

        assert!(store::load_board(store.as_ref(), "room-b").unwrap().is_none());
        let sent: BoardState = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(sent.phase, BoardPhase::Idle);
        assert!(sent.players.is_empty());
    }
}
