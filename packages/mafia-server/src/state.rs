use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::models::config::GameConfig;
use crate::models::game::{Game, GameError, GamePhase};
use crate::models::notification::Notification;
use crate::models::player::{Player, PlayerId};
use crate::models::role::{CatalogError, RoleCatalog};

/// A game behind its own lock; every command holds it for the whole
/// mutate-and-evaluate step.
pub type GameHandle = Arc<Mutex<Game>>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid name {0:?}. Names must be alphanumeric with underscores and dashes.")]
    InvalidName(String),
    #[error("A game named {0} already exists")]
    DuplicateName(String),
    #[error("Game {0} not found")]
    GameNotFound(String),
    #[error("You are already in game {0}")]
    AlreadyInAGame(String),
    #[error("Mafia_{0} is already in session")]
    GameInSession(String),
    #[error("Player {0} is not in a game")]
    NotInGame(PlayerId),
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Live games by name, and the single game each player belongs to.
///
/// Locks are always taken in the order members → games → individual game.
#[derive(Clone, Default)]
pub struct GameRegistry {
    members: Arc<RwLock<HashMap<PlayerId, String>>>,
    games: Arc<RwLock<HashMap<String, GameHandle>>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_game(&self, game: Game) -> Result<GameHandle, RegistryError> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.name) {
            return Err(RegistryError::DuplicateName(game.name));
        }
        let name = game.name.clone();
        let handle = Arc::new(Mutex::new(game));
        games.insert(name.clone(), handle.clone());
        tracing::info!("Created game {}", name);
        Ok(handle)
    }

    pub async fn get(&self, name: &str) -> Result<GameHandle, RegistryError> {
        self.games
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::GameNotFound(name.to_string()))
    }

    pub async fn join(
        &self,
        name: &str,
        player_id: PlayerId,
        display_name: String,
    ) -> Result<(Player, Vec<Notification>), RegistryError> {
        let mut members = self.members.write().await;
        if let Some(current) = members.get(&player_id) {
            return Err(RegistryError::AlreadyInAGame(current.clone()));
        }
        let handle = self.get(name).await?;

        let mut game = handle.lock().await;
        if game.phase() != GamePhase::Lobby {
            return Err(RegistryError::GameInSession(name.to_string()));
        }
        let notifications = game.add_player(player_id.clone(), display_name)?;
        let player = game
            .player(&player_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotInGame(player_id.clone()))?;
        members.insert(player_id, name.to_string());
        Ok((player, notifications))
    }

    /// Takes a player out of a lobby; an emptied lobby is discarded.
    pub async fn leave(&self, player_id: &PlayerId) -> Result<Vec<Notification>, RegistryError> {
        let mut members = self.members.write().await;
        let name = members
            .get(player_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotInGame(player_id.clone()))?;
        let mut games = self.games.write().await;
        let handle = games
            .get(&name)
            .cloned()
            .ok_or_else(|| RegistryError::GameNotFound(name.clone()))?;

        let mut game = handle.lock().await;
        let notifications = game.remove_player(player_id)?;
        members.remove(player_id);
        if game.size() == 0 {
            games.remove(&name);
            tracing::info!("Discarded empty game {}", name);
        }
        Ok(notifications)
    }

    pub async fn membership(&self, player_id: &PlayerId) -> Result<GameHandle, RegistryError> {
        let members = self.members.read().await;
        let name = members
            .get(player_id)
            .ok_or_else(|| RegistryError::NotInGame(player_id.clone()))?;
        self.get(name).await
    }

    pub async fn lookup(&self, player_id: &PlayerId) -> Result<(GameHandle, Player), RegistryError> {
        let handle = self.membership(player_id).await?;
        let player = handle
            .lock()
            .await
            .player(player_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotInGame(player_id.clone()))?;
        Ok((handle, player))
    }

    /// Archives a game, releasing every member so they can join another.
    pub async fn remove(&self, name: &str) -> Option<GameHandle> {
        let mut members = self.members.write().await;
        let removed = self.games.write().await.remove(name);
        if removed.is_some() {
            members.retain(|_, game| game != name);
            tracing::info!("Removed game {}", name);
        }
        removed
    }

    pub async fn game_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.games.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: GameRegistry,
    pub catalog: Arc<RoleCatalog>,
    pub config: Arc<GameConfig>,
}

impl AppState {
    pub fn new(config: GameConfig, catalog: RoleCatalog) -> Self {
        AppState {
            registry: GameRegistry::new(),
            catalog: Arc::new(catalog),
            config: Arc::new(config),
        }
    }

    /// Loads role content from the configured path, or the embedded copy.
    pub fn from_config(config: GameConfig) -> Result<Self, CatalogError> {
        let catalog = match &config.content_path {
            Some(path) => RoleCatalog::from_path(path)?,
            None => RoleCatalog::builtin()?,
        };
        Ok(Self::new(config, catalog))
    }

    pub fn game_rng(&self) -> ChaCha8Rng {
        match self.config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}
