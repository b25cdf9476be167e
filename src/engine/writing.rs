//! Setup and phase-1 writing turns: roster creation, round-robin turn
//! advancement, and the promotion into phase 2 once writing is exhausted.

use crate::types::*;
use std::collections::HashMap;

pub(super) fn start_game(
    state: &GameState,
    player_names: &[String],
    config: &GameConfig,
    prompts: &[String],
    theme: &str,
) -> Option<GameState> {
    if state.phase != GamePhase::Setup {
        return None;
    }
    if player_names.iter().all(|n| n.trim().is_empty()) || config.rounds == 0 {
        return None;
    }

    let players: Vec<Player> = player_names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|name| Player {
            id: new_id(),
            name: name.trim().to_string(),
        })
        .collect();

    let mut next = state.clone();
    next.phase = GamePhase::P1Writing;
    next.players = players;
    next.config = config.clone();
    next.theme = Some(theme.to_string());
    next.p1 = Phase1State {
        round: 1,
        player_index: 0,
        cards: Vec::new(),
        prompts: prompts.to_vec(),
    };
    Some(next)
}

/// A writing turn. Blank text means the player (or their expired timer)
/// skipped: the turn advances but no card is created.
pub(super) fn submit_card(state: &GameState, player_id: &str, text: &str) -> Option<GameState> {
    if state.phase != GamePhase::P1Writing {
        return None;
    }
    let current = state.players.get(state.p1.player_index)?;
    if current.id != player_id {
        return None;
    }

    let mut next = state.clone();
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        let card = Card {
            id: new_id(),
            round: next.p1.round,
            author_id: current.id.clone(),
            author_name: current.name.clone(),
            display_number: next.p1.cards.len() as u32 + 1,
            text: trimmed.to_string(),
            created_at: now_rfc3339(),
        };
        next.p1.cards.push(card);
    }

    next.p1.player_index += 1;
    if next.p1.player_index >= next.players.len() {
        next.p1.player_index = 0;
        next.phase = GamePhase::P1Review;
    }
    Some(next)
}

/// P1_RESULTS onwards: either start the next writing round or, with writing
/// exhausted, build the phase-2 deck from the top-scoring cards.
pub(super) fn advance_round(state: &GameState) -> Option<GameState> {
    if state.phase != GamePhase::P1Results {
        return None;
    }

    let mut next = state.clone();
    if state.p1.round < state.config.rounds {
        next.p1.round += 1;
        next.p1.player_index = 0;
        next.phase = GamePhase::P1Writing;
        return Some(next);
    }

    // Deck selection: aggregate reaction count across every session, ties
    // broken by card creation order.
    let mut totals: HashMap<&str, u32> = HashMap::new();
    for vote in &state.votes {
        *totals.entry(vote.card_id.as_str()).or_insert(0) += 1;
    }
    let mut ordered: Vec<&Card> = state.p1.cards.iter().collect();
    ordered.sort_by_key(|c| std::cmp::Reverse(totals.get(c.id.as_str()).copied().unwrap_or(0)));
    let deck_card_ids: Vec<CardId> = ordered
        .iter()
        .take(state.config.deck_size)
        .map(|c| c.id.clone())
        .collect();
    if deck_card_ids.is_empty() {
        return None;
    }

    next.p2 = Some(Phase2State {
        theme: state.theme.clone().unwrap_or_default(),
        deck_card_ids,
        current_ranker_index: 0,
        secret_rankings: HashMap::new(),
        final_rankings: HashMap::new(),
    });
    next.phase = GamePhase::P2Intro;
    Some(next)
}
