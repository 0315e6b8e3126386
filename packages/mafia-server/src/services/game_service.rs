use thiserror::Error;

use crate::{
    models::{
        game::{Game, GameError, GameSnapshot, PlayerView, StartVote},
        notification::{Notification, Outbox},
        player::PlayerId,
        role::CatalogError,
    },
    state::{AppState, GameHandle, RegistryError},
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Game(#[from] GameError),
}

impl ServiceError {
    /// The game-level rejection behind this error, if there is one.
    pub fn game_error(&self) -> Option<&GameError> {
        match self {
            ServiceError::Game(e) | ServiceError::Registry(RegistryError::Game(e)) => Some(e),
            _ => None,
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Runs `op` against one game under its lock. A game that concludes is
/// archived once the lock has been released.
async fn apply<T>(
    state: &AppState,
    handle: GameHandle,
    op: impl FnOnce(&mut Game) -> Result<T, GameError>,
) -> Result<T, ServiceError> {
    let (result, concluded) = {
        let mut game = handle.lock().await;
        let result = op(&mut game);
        let concluded = game.is_concluded().then(|| game.name.clone());
        (result, concluded)
    };

    if let Some(name) = concluded {
        state.registry.remove(&name).await;
    }
    result.map_err(|e| {
        tracing::warn!("Rejected command: {}", e);
        e.into()
    })
}

async fn apply_for_member<T>(
    state: &AppState,
    player_id: &PlayerId,
    op: impl FnOnce(&mut Game) -> Result<T, GameError>,
) -> Result<T, ServiceError> {
    let handle = state.registry.membership(player_id).await?;
    apply(state, handle, op).await
}

pub async fn create_game(
    state: &AppState,
    name: &str,
    leader: PlayerId,
) -> Result<(GameHandle, Vec<Notification>), ServiceError> {
    if !is_valid_name(name) {
        return Err(RegistryError::InvalidName(name.to_string()).into());
    }
    let ruleset = state.catalog.resolve(&state.config.default_ruleset)?;
    let game = Game::new(
        name.to_string(),
        leader.clone(),
        ruleset,
        &state.config,
        state.catalog.clone(),
        state.game_rng(),
    );
    let handle = state.registry.create_game(game).await?;

    let mut outbox = Outbox::new();
    outbox.public(format!(
        "Welcome to Mafia_{0}.\nTo join, use `joingame {0}`\nGames in progress may not be joined.\n{1} may set the ruleset with `ruleset <name>`.",
        name, leader
    ));
    Ok((handle, outbox.into_vec()))
}

pub async fn join_game(
    state: &AppState,
    game_name: &str,
    player_id: PlayerId,
    display_name: String,
) -> Result<Vec<Notification>, ServiceError> {
    let (_, notifications) = state
        .registry
        .join(game_name, player_id, display_name)
        .await?;
    Ok(notifications)
}

pub async fn leave_game(state: &AppState, player_id: &PlayerId) -> Result<Vec<Notification>, ServiceError> {
    Ok(state.registry.leave(player_id).await?)
}

pub async fn set_ruleset(
    state: &AppState,
    player_id: &PlayerId,
    ruleset_name: &str,
) -> Result<Vec<Notification>, ServiceError> {
    let ruleset = state.catalog.resolve(ruleset_name)?;
    apply_for_member(state, player_id, |game| game.set_ruleset(player_id, ruleset)).await
}

pub async fn cast_start_vote(state: &AppState, player_id: &PlayerId) -> Result<StartVote, ServiceError> {
    apply_for_member(state, player_id, |game| game.cast_start_vote(player_id)).await
}

pub async fn submit_night_action(
    state: &AppState,
    player_id: &PlayerId,
    target_name: &str,
) -> Result<Vec<Notification>, ServiceError> {
    apply_for_member(state, player_id, |game| {
        game.submit_night_action(player_id, target_name)
    })
    .await
}

pub async fn cast_day_vote(
    state: &AppState,
    player_id: &PlayerId,
    target_name: &str,
) -> Result<Vec<Notification>, ServiceError> {
    apply_for_member(state, player_id, |game| game.cast_day_vote(player_id, target_name)).await
}

pub async fn mafia_chat(
    state: &AppState,
    player_id: &PlayerId,
    message: &str,
) -> Result<Vec<Notification>, ServiceError> {
    apply_for_member(state, player_id, |game| game.mafia_chat(player_id, message)).await
}

/// Entry point for an external idle timer.
pub async fn force_resolve(state: &AppState, game_name: &str) -> Result<Vec<Notification>, ServiceError> {
    let handle = state.registry.get(game_name).await?;
    apply(state, handle, Game::force_resolve).await
}

pub async fn player_view(state: &AppState, player_id: &PlayerId) -> Result<PlayerView, ServiceError> {
    let handle = state.registry.membership(player_id).await?;
    let game = handle.lock().await;
    Ok(game.view(player_id)?)
}

pub async fn get_game_state(state: &AppState, game_name: &str) -> Result<GameSnapshot, ServiceError> {
    let handle = state.registry.get(game_name).await?;
    let game = handle.lock().await;
    Ok(game.snapshot())
}
