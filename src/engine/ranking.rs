//! Phase 2: intro, optional secret ranking round, discussion, and the
//! final rankings that feed the reveal.

use crate::tally;
use crate::types::*;
use std::collections::{HashMap, HashSet};

pub(super) fn open_secret_ranking(state: &GameState) -> Option<GameState> {
    if state.phase != GamePhase::P2Intro || !state.config.secret_ranking {
        return None;
    }
    state.p2.as_ref()?;

    let mut next = state.clone();
    next.phase = GamePhase::P2RankSecret;
    Some(next)
}

/// From P2_INTRO (skipping the secret round) or P2_RANK_SECRET (all in, or
/// the host moves on early).
pub(super) fn open_discussion(state: &GameState) -> Option<GameState> {
    if !matches!(state.phase, GamePhase::P2Intro | GamePhase::P2RankSecret) {
        return None;
    }
    state.p2.as_ref()?;

    let mut next = state.clone();
    next.phase = GamePhase::P2Discuss;
    Some(next)
}

pub(super) fn submit_secret_ranking(
    state: &GameState,
    player_id: &str,
    ranking: &[CardId],
) -> Option<GameState> {
    if state.phase != GamePhase::P2RankSecret {
        return None;
    }
    let p2 = state.p2.as_ref()?;
    state.player(player_id)?;
    if p2.secret_rankings.contains_key(player_id) {
        return None;
    }
    if !is_deck_permutation(ranking, &p2.deck_card_ids) {
        return None;
    }

    let mut next = state.clone();
    {
        let p2 = next.p2.as_mut()?;
        p2.secret_rankings
            .insert(player_id.to_string(), ranking.to_vec());
        if p2.secret_rankings.len() == next.players.len() {
            next.phase = GamePhase::P2Discuss;
        }
    }
    Some(next)
}

pub(super) fn open_final_ranking(state: &GameState) -> Option<GameState> {
    if state.phase != GamePhase::P2Discuss {
        return None;
    }
    state.p2.as_ref()?;

    let mut next = state.clone();
    next.p2.as_mut()?.current_ranker_index = 0;
    next.phase = GamePhase::P2RankFinal;
    Some(next)
}

/// One immutable ordering per player, in ranker order. The last submission
/// runs the phase-2 tally and attaches the reveal.
pub(super) fn submit_final_ranking(
    state: &GameState,
    player_id: &str,
    ranking: &[CardId],
) -> Option<GameState> {
    if state.phase != GamePhase::P2RankFinal {
        return None;
    }
    let p2 = state.p2.as_ref()?;
    let current = state.players.get(p2.current_ranker_index)?;
    if current.id != player_id || p2.final_rankings.contains_key(player_id) {
        return None;
    }
    if !is_deck_permutation(ranking, &p2.deck_card_ids) {
        return None;
    }

    let mut next = state.clone();
    let done = {
        let p2 = next.p2.as_mut()?;
        p2.final_rankings
            .insert(player_id.to_string(), ranking.to_vec());
        p2.current_ranker_index += 1;
        p2.current_ranker_index >= next.players.len()
    };

    if done {
        let p2 = next.p2.as_ref()?;
        let authors: HashMap<CardId, PlayerId> = next
            .p1
            .cards
            .iter()
            .map(|c| (c.id.clone(), c.author_id.clone()))
            .collect();
        let phase2 = tally::phase2(&p2.deck_card_ids, &p2.final_rankings, &authors);
        next.reveal = Some(RevealResult {
            phase1: next.p1_results.clone(),
            phase2,
        });
        next.phase = GamePhase::Reveal;
    }
    Some(next)
}

/// True when `ranking` is exactly the deck: same cards, no additions, no
/// drops, no duplicates.
fn is_deck_permutation(ranking: &[CardId], deck: &[CardId]) -> bool {
    if ranking.len() != deck.len() {
        return false;
    }
    let seen: HashSet<&CardId> = ranking.iter().collect();
    seen.len() == deck.len() && deck.iter().all(|id| seen.contains(id))
}
