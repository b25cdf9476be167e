//! The reducer / phase engine: a total, pure transition function over
//! `GameState`. Invalid events return the state unchanged so UI code never
//! has to handle engine errors; `tracing::debug!` is the only diagnostic.

mod event;
mod ranking;
mod voting;
mod writing;

pub use event::GameEvent;

use crate::types::*;

/// Check a phase transition against the defined state graph.
pub fn is_valid_transition(from: GamePhase, to: GamePhase) -> bool {
    use GamePhase::*;

    matches!(
        (from, to),
        (Setup, P1Writing)
            | (P1Writing, P1Writing)
            | (P1Writing, P1Review)
            | (P1Review, P1Voting)
            | (P1Voting, P1Voting)
            | (P1Voting, P1Results)
            | (P1Results, P1Writing)
            | (P1Results, P2Intro)
            | (P2Intro, P2RankSecret)
            | (P2Intro, P2Discuss)
            | (P2RankSecret, P2RankSecret)
            | (P2RankSecret, P2Discuss)
            | (P2Discuss, P2RankFinal)
            | (P2RankFinal, P2RankFinal)
            | (P2RankFinal, Reveal)
    )
}

/// Apply one event. Returns the next state; on any invalid event the input
/// state comes back unchanged (`updated_at` included).
pub fn apply(state: &GameState, event: &GameEvent) -> GameState {
    let next = match event {
        GameEvent::StartGame {
            player_names,
            config,
            prompts,
            theme,
        } => writing::start_game(state, player_names, config, prompts, theme),
        GameEvent::SubmitCard { player_id, text } => writing::submit_card(state, player_id, text),
        GameEvent::OpenVoting { scope } => voting::open_voting(state, *scope),
        GameEvent::SetActiveVoter { voter_index } => voting::set_active_voter(state, *voter_index),
        GameEvent::CastReaction {
            voter_id,
            card_id,
            reaction,
        } => voting::cast_reaction(state, voter_id, card_id, *reaction),
        GameEvent::CloseVoting => voting::close_voting(state),
        GameEvent::AdvanceRound => writing::advance_round(state),
        GameEvent::OpenSecretRanking => ranking::open_secret_ranking(state),
        GameEvent::OpenDiscussion => ranking::open_discussion(state),
        GameEvent::SubmitSecretRanking { player_id, ranking } => {
            ranking::submit_secret_ranking(state, player_id, ranking)
        }
        GameEvent::OpenFinalRanking => ranking::open_final_ranking(state),
        GameEvent::SubmitFinalRanking { player_id, ranking } => {
            ranking::submit_final_ranking(state, player_id, ranking)
        }
    };

    match next {
        Some(mut next) => {
            debug_assert!(is_valid_transition(state.phase, next.phase));
            next.updated_at = now_ms();
            next
        }
        None => {
            tracing::debug!(
                room = %state.room_id,
                phase = ?state.phase,
                "rejected event in current phase"
            );
            state.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> GameState {
        let state = GameState::empty("room-1");
        apply(
            &state,
            &GameEvent::StartGame {
                player_names: vec!["Ada".into(), "Ben".into(), "Cleo".into()],
                config: GameConfig {
                    rounds: 1,
                    ..GameConfig::default()
                },
                prompts: vec!["Something to do before 30".into()],
                theme: "Most likely to actually happen".into(),
            },
        )
    }

    #[test]
    fn start_game_builds_roster() {
        let state = started();

        assert_eq!(state.phase, GamePhase::P1Writing);
        assert_eq!(state.players.len(), 3);
        assert_eq!(state.players[0].name, "Ada");
        assert_eq!(state.p1.round, 1);
        assert_eq!(state.p1.player_index, 0);
        assert_eq!(state.theme.as_deref(), Some("Most likely to actually happen"));
    }

    #[test]
    fn start_game_rejected_outside_setup() {
        let state = started();
        let again = apply(
            &state,
            &GameEvent::StartGame {
                player_names: vec!["X".into()],
                config: GameConfig::default(),
                prompts: vec![],
                theme: "t".into(),
            },
        );

        assert_eq!(again, state);
    }

    #[test]
    fn start_game_requires_players_and_rounds() {
        let empty = GameState::empty("room-1");
        let no_players = apply(
            &empty,
            &GameEvent::StartGame {
                player_names: vec![],
                config: GameConfig::default(),
                prompts: vec![],
                theme: "t".into(),
            },
        );
        assert_eq!(no_players, empty);

        let zero_rounds = apply(
            &empty,
            &GameEvent::StartGame {
                player_names: vec!["Ada".into()],
                config: GameConfig {
                    rounds: 0,
                    ..GameConfig::default()
                },
                prompts: vec![],
                theme: "t".into(),
            },
        );
        assert_eq!(zero_rounds, empty);
    }

    #[test]
    fn writing_round_robin_reaches_review() {
        let mut state = started();
        for i in 0..3 {
            let id = state.players[i].id.clone();
            state = apply(
                &state,
                &GameEvent::SubmitCard {
                    player_id: id,
                    text: format!("idea {i}"),
                },
            );
        }

        assert_eq!(state.phase, GamePhase::P1Review);
        assert_eq!(state.p1.cards.len(), 3);
        assert_eq!(state.p1.cards[2].display_number, 3);
    }

    #[test]
    fn blank_submission_skips_without_card() {
        let state = started();
        let id = state.players[0].id.clone();
        let next = apply(
            &state,
            &GameEvent::SubmitCard {
                player_id: id,
                text: "   ".into(),
            },
        );

        assert_eq!(next.phase, GamePhase::P1Writing);
        assert!(next.p1.cards.is_empty());
        assert_eq!(next.p1.player_index, 1);
    }

    #[test]
    fn out_of_turn_submission_is_noop() {
        let state = started();
        let wrong = state.players[1].id.clone();
        let next = apply(
            &state,
            &GameEvent::SubmitCard {
                player_id: wrong,
                text: "sneaky".into(),
            },
        );

        assert_eq!(next, state);
    }

    #[test]
    fn no_event_skips_a_phase() {
        // Straight from writing to voting must be impossible.
        let state = started();
        let next = apply(
            &state,
            &GameEvent::OpenVoting {
                scope: VotingScope::Final,
            },
        );
        assert_eq!(next, state);

        let next = apply(&state, &GameEvent::CloseVoting);
        assert_eq!(next, state);

        let next = apply(&state, &GameEvent::OpenFinalRanking);
        assert_eq!(next, state);
    }

    #[test]
    fn transition_graph_matches_phases() {
        use GamePhase::*;

        assert!(is_valid_transition(Setup, P1Writing));
        assert!(is_valid_transition(P1Results, P2Intro));
        assert!(is_valid_transition(P2RankFinal, Reveal));
        assert!(!is_valid_transition(Setup, P1Voting));
        assert!(!is_valid_transition(Reveal, Setup));
        assert!(!is_valid_transition(P1Writing, P1Voting));
    }
}
