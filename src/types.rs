use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type RoomId = String;
pub type PlayerId = String;
pub type CardId = String;

/// Engine generation carried in every snapshot; receivers refuse anything else.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Setup,
    P1Writing,
    P1Review,
    P1Voting,
    P1Results,
    P2Intro,
    P2RankSecret,
    P2Discuss,
    P2RankFinal,
    Reveal,
}

/// The fixed reaction kinds. Each cast reaction costs one unit of the
/// voter's per-session budget no matter which kind it is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Heart,
    Laugh,
    Wow,
    Nope,
}

impl Reaction {
    pub const ALL: [Reaction; 4] = [
        Reaction::Heart,
        Reaction::Laugh,
        Reaction::Wow,
        Reaction::Nope,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub rounds: u32,
    pub turn_seconds: u32,
    pub max_reactions_per_voter: u32,
    pub allow_self_vote: bool,
    pub deck_size: usize,
    /// Route P2_INTRO through a secret ranking round before discussion.
    pub secret_ranking: bool,
    /// Allow a FINAL-scoped session (all cards) in the review after the
    /// last round instead of scoping it to that round alone.
    pub final_vote_session: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            turn_seconds: 60,
            max_reactions_per_voter: 3,
            allow_self_vote: false,
            deck_size: 5,
            secret_ranking: true,
            final_vote_session: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

/// One player-authored entry from a phase-1 writing turn. Never mutated
/// after creation; never deleted while the room exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub round: u32,
    pub author_id: PlayerId,
    pub author_name: String,
    /// Sequential display number across the whole game (1-based).
    pub display_number: u32,
    pub text: String,
    pub created_at: String,
}

/// Scope of a voting session, rendered into the session key that tags
/// every vote cast while the session is open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum VotingScope {
    Round { round: u32 },
    Final,
}

impl VotingScope {
    pub fn session_key(&self) -> String {
        match self {
            VotingScope::Round { round } => format!("round:{round}"),
            VotingScope::Final => "final".to_string(),
        }
    }
}

/// One cast reaction. `session_key` scopes the vote to the session it was
/// cast in so re-opened voting never mixes tallies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionVote {
    pub card_id: CardId,
    pub voter_id: PlayerId,
    pub reaction: Reaction,
    pub session_key: String,
}

/// Transient while phase = P1_VOTING; discarded on close (votes remain).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VotingSession {
    #[serde(flatten)]
    pub scope: VotingScope,
    pub current_voter_index: usize,
    pub votes_used: HashMap<PlayerId, u32>,
}

/// Phase-1 writing progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase1State {
    /// 1-based current round.
    pub round: u32,
    /// Index into `players` of whoever writes next.
    pub player_index: usize,
    pub cards: Vec<Card>,
    /// One writing prompt per round, chosen at setup.
    pub prompts: Vec<String>,
}

/// Cached output of the phase-1 tally for the most recently closed session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase1Results {
    pub session_key: String,
    pub scores: HashMap<CardId, u32>,
    pub top3: Vec<CardId>,
    pub reaction_winners: HashMap<Reaction, CardId>,
    pub winner_card_id: Option<CardId>,
    pub winner_author_id: Option<PlayerId>,
}

/// Phase-2 ranking assignment: the promoted deck plus collected orderings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase2State {
    pub theme: String,
    pub deck_card_ids: Vec<CardId>,
    pub current_ranker_index: usize,
    /// Secret round orderings; shown during discussion, never tallied.
    pub secret_rankings: HashMap<PlayerId, Vec<CardId>>,
    /// One immutable ordering per player; a permutation of the deck.
    pub final_rankings: HashMap<PlayerId, Vec<CardId>>,
}

/// Phase-2 tally output attached to the reveal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase2Results {
    pub top_counts: HashMap<CardId, u32>,
    pub is_tie: bool,
    pub tied_top_card_ids: Vec<CardId>,
    pub winning_card_id: Option<CardId>,
    pub winning_author_id: Option<PlayerId>,
    pub collective_win: bool,
    pub collective_winning_card_id: Option<CardId>,
}

/// Computed once when the terminal phase is reached; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevealResult {
    pub phase1: Option<Phase1Results>,
    pub phase2: Phase2Results,
}

/// Aggregate root. Exactly one instance is authoritative per room on any
/// device; cross-device consistency is last-snapshot-wins via broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub room_id: RoomId,
    pub schema_version: u32,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub config: GameConfig,
    /// Phase-2 ranking theme, chosen at setup; copied into `p2` when the
    /// deck is built.
    pub theme: Option<String>,
    pub p1: Phase1State,
    pub p1_voting: Option<VotingSession>,
    pub p1_results: Option<Phase1Results>,
    pub p2: Option<Phase2State>,
    pub votes: Vec<ReactionVote>,
    pub reveal: Option<RevealResult>,
    /// Epoch milliseconds of the last applied event.
    pub updated_at: i64,
}

impl GameState {
    /// A fresh, empty room in SETUP. Used when no persisted state exists
    /// and after a hard reset.
    pub fn empty(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            schema_version: SCHEMA_VERSION,
            phase: GamePhase::Setup,
            players: Vec::new(),
            config: GameConfig::default(),
            theme: None,
            p1: Phase1State {
                round: 1,
                player_index: 0,
                cards: Vec::new(),
                prompts: Vec::new(),
            },
            p1_voting: None,
            p1_results: None,
            p2: None,
            votes: Vec::new(),
            reveal: None,
            updated_at: 0,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.p1.cards.iter().find(|c| c.id == id)
    }
}

/// Transient pre-game configuration record, persisted under its own room
/// key so the setup screen can be prefilled before a game starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SetupDraft {
    pub player_names: Vec<String>,
    pub config: Option<GameConfig>,
    pub prompts: Vec<String>,
    pub theme: Option<String>,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}
