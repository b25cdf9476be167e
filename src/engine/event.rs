use crate::types::*;
use serde::{Deserialize, Serialize};

/// Every mutation the engine accepts. Callers pre-validate their UI input;
/// anything structurally or phase-wise invalid is a silent no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum GameEvent {
    /// SETUP -> P1_WRITING with a roster, config and pre-picked prompts.
    StartGame {
        player_names: Vec<String>,
        config: GameConfig,
        prompts: Vec<String>,
        theme: String,
    },
    /// A writing turn by the current writer. Blank text is a skip: the
    /// turn advances, no card is created.
    SubmitCard { player_id: PlayerId, text: String },
    /// P1_REVIEW -> P1_VOTING with a round- or final-scoped session.
    OpenVoting { scope: VotingScope },
    /// Moves the pass-the-device pointer; no game effect beyond display.
    SetActiveVoter { voter_index: usize },
    CastReaction {
        voter_id: PlayerId,
        card_id: CardId,
        reaction: Reaction,
    },
    /// P1_VOTING -> P1_RESULTS; runs the phase-1 tally for the session.
    CloseVoting,
    /// P1_RESULTS -> P1_WRITING (rounds remain) or P2_INTRO (deck built).
    AdvanceRound,
    OpenSecretRanking,
    OpenDiscussion,
    SubmitSecretRanking {
        player_id: PlayerId,
        ranking: Vec<CardId>,
    },
    OpenFinalRanking,
    /// One per player, in ranker order; the last one runs the phase-2
    /// tally and moves to REVEAL.
    SubmitFinalRanking {
        player_id: PlayerId,
        ranking: Vec<CardId>,
    },
}
