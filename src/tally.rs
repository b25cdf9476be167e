//! Pure vote-aggregation algorithms. Both tallies are deterministic and
//! idempotent: recomputing from the same inputs yields the same result.

use crate::types::*;
use std::collections::HashMap;

/// Tally a closed phase-1 voting session.
///
/// Scores count every reaction for a card within `session_key` regardless
/// of kind. `top3` ties are broken by stable card order (creation order),
/// as are per-kind reaction winners.
pub fn phase1(cards: &[Card], votes: &[ReactionVote], session_key: &str) -> Phase1Results {
    let session_votes: Vec<&ReactionVote> = votes
        .iter()
        .filter(|v| v.session_key == session_key)
        .collect();

    let mut scores: HashMap<CardId, u32> = HashMap::new();
    for card in cards {
        scores.insert(card.id.clone(), 0);
    }
    let mut kind_counts: HashMap<(Reaction, CardId), u32> = HashMap::new();
    for vote in &session_votes {
        *scores.entry(vote.card_id.clone()).or_insert(0) += 1;
        *kind_counts
            .entry((vote.reaction, vote.card_id.clone()))
            .or_insert(0) += 1;
    }

    // Sort by score descending; stable sort keeps creation order for ties.
    let mut ordered: Vec<&Card> = cards.iter().collect();
    ordered.sort_by_key(|c| std::cmp::Reverse(scores.get(&c.id).copied().unwrap_or(0)));
    let top3: Vec<CardId> = ordered.iter().take(3).map(|c| c.id.clone()).collect();

    let mut reaction_winners: HashMap<Reaction, CardId> = HashMap::new();
    for kind in Reaction::ALL {
        let mut best: Option<(&Card, u32)> = None;
        for card in cards {
            let count = kind_counts
                .get(&(kind, card.id.clone()))
                .copied()
                .unwrap_or(0);
            if count > 0 && best.map(|(_, b)| count > b).unwrap_or(true) {
                best = Some((card, count));
            }
        }
        if let Some((card, _)) = best {
            reaction_winners.insert(kind, card.id.clone());
        }
    }

    let winner_card_id = ordered
        .first()
        .filter(|c| scores.get(&c.id).copied().unwrap_or(0) > 0)
        .map(|c| c.id.clone());
    let winner_author_id = winner_card_id
        .as_ref()
        .and_then(|id| cards.iter().find(|c| &c.id == id))
        .map(|c| c.author_id.clone());

    Phase1Results {
        session_key: session_key.to_string(),
        scores,
        top3,
        reaction_winners,
        winner_card_id,
        winner_author_id,
    }
}

/// Tally the submitted final rankings for the phase-2 deck.
///
/// Majority outcome: `top_counts` over every ranking's first card, with
/// `is_tie` when the maximum is shared. The tie-break for `winning_card_id`
/// is explicit: the tied card that appears earliest in `deck` wins the
/// label, and `is_tie`/`tied_top_card_ids` carry the full picture.
///
/// Collective win: for a candidate card, drop the top pick cast by the
/// card's own author; if the remaining voters are unanimous on that card
/// and at least one such voter exists, every non-author player wins
/// together and the author is excluded.
pub fn phase2(
    deck: &[CardId],
    rankings: &HashMap<PlayerId, Vec<CardId>>,
    authors: &HashMap<CardId, PlayerId>,
) -> Phase2Results {
    let mut top_counts: HashMap<CardId, u32> = HashMap::new();
    for ranking in rankings.values() {
        if let Some(top) = ranking.first() {
            *top_counts.entry(top.clone()).or_insert(0) += 1;
        }
    }

    let max_count = top_counts.values().copied().max().unwrap_or(0);
    let tied_top_card_ids: Vec<CardId> = deck
        .iter()
        .filter(|id| top_counts.get(*id).copied().unwrap_or(0) == max_count && max_count > 0)
        .cloned()
        .collect();
    let is_tie = tied_top_card_ids.len() > 1;

    let winning_card_id = tied_top_card_ids.first().cloned();
    let winning_author_id = winning_card_id
        .as_ref()
        .and_then(|id| authors.get(id))
        .cloned();

    let mut collective_winning_card_id: Option<CardId> = None;
    for candidate in deck {
        let author = authors.get(candidate);
        let non_author_picks: Vec<&CardId> = rankings
            .iter()
            .filter(|(player, _)| Some(*player) != author)
            .filter_map(|(_, ranking)| ranking.first())
            .collect();
        if !non_author_picks.is_empty() && non_author_picks.iter().all(|pick| *pick == candidate) {
            collective_winning_card_id = Some(candidate.clone());
            break;
        }
    }
    let collective_win = collective_winning_card_id.is_some();

    Phase2Results {
        top_counts,
        is_tie,
        tied_top_card_ids,
        winning_card_id,
        winning_author_id,
        collective_win,
        collective_winning_card_id,
    }
}
