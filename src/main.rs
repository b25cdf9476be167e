//! Demo: two engine instances, a player device (writer role) and a board
//! display, share an in-process bus and play one scripted game.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bucketparty::bus::{board_channel, Bus, LocalBus};
use bucketparty::engine::GameEvent;
use bucketparty::room::GameRoom;
use bucketparty::store::MemoryStore;
use bucketparty::themes::ThemeBank;
use bucketparty::types::*;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bucketparty=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(LocalBus::new());
    let room_id = new_id();

    // The board display listens on its own channel for mirrored state.
    let mut board_rx = bus.subscribe(&board_channel(&room_id));
    tokio::spawn(async move {
        while let Ok(raw) = board_rx.recv().await {
            if let Ok(board) = serde_json::from_str::<bucketparty::board::BoardState>(&raw) {
                tracing::info!(phase = ?board.phase, cards = board.cards.len(), "board updated");
            }
        }
    });

    let mut room = GameRoom::open(room_id.clone(), store, bus, true).expect("open room");

    let bank = ThemeBank::new();
    let mut rng = rand::rng();
    let config = GameConfig {
        rounds: 1,
        deck_size: 3,
        secret_ranking: false,
        ..GameConfig::default()
    };
    room.dispatch(&GameEvent::StartGame {
        player_names: vec!["Ada".into(), "Ben".into(), "Cleo".into()],
        config,
        prompts: bank.pick_prompts(1, &mut rng),
        theme: bank.pick_theme(&mut rng),
    })
    .expect("start game");
    tracing::info!(prompt = %room.state().p1.prompts[0], "writing round open");

    for text in ["see the northern lights", "run a marathon", "learn to sail"] {
        let player_id = room.state().players[room.state().p1.player_index].id.clone();
        room.dispatch(&GameEvent::SubmitCard {
            player_id,
            text: text.into(),
        })
        .expect("submit card");
    }

    room.dispatch(&GameEvent::OpenVoting {
        scope: VotingScope::Final,
    })
    .expect("open voting");
    let players: Vec<PlayerId> = room.state().players.iter().map(|p| p.id.clone()).collect();
    let cards: Vec<CardId> = room.state().p1.cards.iter().map(|c| c.id.clone()).collect();
    for (voter, card) in [(0, 1), (1, 2), (2, 0), (0, 2)] {
        room.dispatch(&GameEvent::CastReaction {
            voter_id: players[voter].clone(),
            card_id: cards[card].clone(),
            reaction: Reaction::Heart,
        })
        .expect("cast reaction");
    }
    room.dispatch(&GameEvent::CloseVoting).expect("close voting");
    room.dispatch(&GameEvent::AdvanceRound).expect("advance");

    room.dispatch(&GameEvent::OpenDiscussion).expect("discuss");
    room.dispatch(&GameEvent::OpenFinalRanking).expect("final ranking");
    let deck = room.state().p2.as_ref().expect("deck").deck_card_ids.clone();
    for player_id in players {
        room.dispatch(&GameEvent::SubmitFinalRanking {
            player_id,
            ranking: deck.clone(),
        })
        .expect("submit ranking");
    }

    let reveal = room.state().reveal.as_ref().expect("reveal");
    tracing::info!(
        winner = ?reveal.phase2.winning_card_id,
        collective = reveal.phase2.collective_win,
        "game over"
    );

    // Let the board listener drain its channel before exiting.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
