use once_cell::sync::Lazy;

use crate::models::config::GameConfig;

pub static CONFIG: Lazy<GameConfig> = Lazy::new(GameConfig::from_env);
