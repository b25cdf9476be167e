//! Phase-1 voting sessions: open, cast with budget enforcement, close with
//! the tally cached into state.

use crate::tally;
use crate::types::*;
use std::collections::HashMap;

pub(super) fn open_voting(state: &GameState, scope: VotingScope) -> Option<GameState> {
    if state.phase != GamePhase::P1Review {
        return None;
    }
    match scope {
        VotingScope::Round { round } => {
            if round != state.p1.round {
                return None;
            }
        }
        // A FINAL session covers every card in the game, so it only exists
        // after the last round. Accepting it earlier would let a later
        // re-open reset `votes_used` while both sessions' votes share the
        // "final" session key, busting the per-session budget.
        VotingScope::Final => {
            if !state.config.final_vote_session || state.p1.round != state.config.rounds {
                return None;
            }
        }
    }

    let mut next = state.clone();
    next.p1_voting = Some(VotingSession {
        scope,
        current_voter_index: 0,
        votes_used: HashMap::new(),
    });
    next.phase = GamePhase::P1Voting;
    Some(next)
}

pub(super) fn set_active_voter(state: &GameState, voter_index: usize) -> Option<GameState> {
    if state.phase != GamePhase::P1Voting || voter_index >= state.players.len() {
        return None;
    }

    let mut next = state.clone();
    next.p1_voting.as_mut()?.current_voter_index = voter_index;
    Some(next)
}

pub(super) fn cast_reaction(
    state: &GameState,
    voter_id: &str,
    card_id: &str,
    reaction: Reaction,
) -> Option<GameState> {
    if state.phase != GamePhase::P1Voting {
        return None;
    }
    let session = state.p1_voting.as_ref()?;
    state.player(voter_id)?;
    let card = state.card(card_id)?;

    if let VotingScope::Round { round } = session.scope {
        if card.round != round {
            return None;
        }
    }
    if !state.config.allow_self_vote && card.author_id == voter_id {
        return None;
    }
    let used = session.votes_used.get(voter_id).copied().unwrap_or(0);
    if used >= state.config.max_reactions_per_voter {
        return None;
    }

    let session_key = session.scope.session_key();
    let mut next = state.clone();
    next.votes.push(ReactionVote {
        card_id: card_id.to_string(),
        voter_id: voter_id.to_string(),
        reaction,
        session_key,
    });
    *next
        .p1_voting
        .as_mut()?
        .votes_used
        .entry(voter_id.to_string())
        .or_insert(0) += 1;
    Some(next)
}

/// Close the session: tally it over the cards it covered, cache the result,
/// and discard the session (votes stay in the log).
pub(super) fn close_voting(state: &GameState) -> Option<GameState> {
    if state.phase != GamePhase::P1Voting {
        return None;
    }
    let session = state.p1_voting.as_ref()?;
    let session_key = session.scope.session_key();

    let covered: Vec<Card> = match session.scope {
        VotingScope::Round { round } => state
            .p1
            .cards
            .iter()
            .filter(|c| c.round == round)
            .cloned()
            .collect(),
        VotingScope::Final => state.p1.cards.clone(),
    };

    let mut next = state.clone();
    next.p1_results = Some(tally::phase1(&covered, &state.votes, &session_key));
    next.p1_voting = None;
    next.phase = GamePhase::P1Results;
    Some(next)
}
