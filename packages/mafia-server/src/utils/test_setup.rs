use std::sync::Once;

use crate::models::config::GameConfig;
use crate::models::player::PlayerId;
use crate::models::role::RoleCatalog;
use crate::services::game_service;
use crate::state::AppState;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A state with the embedded role content and a fixed role-assignment seed.
pub fn test_state(seed: u64) -> AppState {
    setup_test_env();
    let catalog = RoleCatalog::builtin().expect("embedded role content is valid");
    AppState::new(GameConfig::default().with_seed(seed), catalog)
}

/// Creates `game_name` led by `p1` and seats players `p1..=pN` named `Player1..=PlayerN`.
pub async fn seat_players(state: &AppState, game_name: &str, count: usize) -> Vec<PlayerId> {
    game_service::create_game(state, game_name, PlayerId::new("p1"))
        .await
        .expect("game creation");
    let mut ids = Vec::with_capacity(count);
    for i in 1..=count {
        let id = PlayerId::new(format!("p{}", i));
        game_service::join_game(state, game_name, id.clone(), format!("Player{}", i))
            .await
            .expect("join");
        ids.push(id);
    }
    ids
}

/// Seats `count` players and has them all vote to start.
pub async fn start_game(state: &AppState, game_name: &str, count: usize) -> Vec<PlayerId> {
    let ids = seat_players(state, game_name, count).await;
    for id in &ids {
        game_service::cast_start_vote(state, id)
            .await
            .expect("start vote");
    }
    ids
}
