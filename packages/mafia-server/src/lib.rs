pub mod models;
pub mod services;
pub mod state;
pub mod utils;

pub use models::game::{Game, GameError, GamePhase, GameResult};
pub use models::notification::{Notification, NotificationBody, Recipient};
pub use models::player::{Player, PlayerId};
pub use models::role::{Faction, Role, RoleCatalog};
pub use state::{AppState, GameHandle, GameRegistry};
