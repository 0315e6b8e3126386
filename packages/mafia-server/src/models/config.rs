use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Roster size required before a start vote can begin the game.
    pub min_players: usize,
    pub max_players: usize,
    pub default_ruleset: String,
    /// Fixed seed for role assignment; fresh entropy per game when unset.
    pub rng_seed: Option<u64>,
    /// Role content file; the embedded copy is used when unset.
    pub content_path: Option<PathBuf>,
    pub log_level: tracing::Level,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 9,
            default_ruleset: "default".to_string(),
            rng_seed: None,
            content_path: None,
            log_level: tracing::Level::INFO,
        }
    }
}

fn parsed<T: FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let min_players = parsed("MAFIA_MIN_PLAYERS").unwrap_or(defaults.min_players);
        let max_players = parsed::<usize>("MAFIA_MAX_PLAYERS")
            .filter(|max| *max >= min_players)
            .unwrap_or(defaults.max_players.max(min_players));
        let default_ruleset = env::var("MAFIA_DEFAULT_RULESET")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.default_ruleset);
        let rng_seed = parsed("MAFIA_RNG_SEED");
        let content_path = env::var("MAFIA_CONTENT_PATH").ok().map(PathBuf::from);
        let log_level = parsed("MAFIA_LOG_LEVEL").unwrap_or(defaults.log_level);

        Self {
            min_players,
            max_players,
            default_ruleset,
            rng_seed,
            content_path,
            log_level,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
