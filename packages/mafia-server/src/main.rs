//! Local table: plays one game between scripted bots and prints every
//! notification the chat transport would deliver.

use anyhow::{bail, Context};
use dotenvy::dotenv;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use mafia_server::models::game::{GamePhase, PlayerView};
use mafia_server::models::notification::{Notification, NotificationBody, Recipient};
use mafia_server::models::player::PlayerId;
use mafia_server::models::role::{NightAction, Role};
use mafia_server::services::game_service::{self, ServiceError};
use mafia_server::state::AppState;
use mafia_server::utils::config::CONFIG;

const TABLE: &str = "table";
const MAX_ROUNDS: u32 = 50;

fn init_logger(level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .init();
}

fn dispatch(notifications: Vec<Notification>) {
    for notification in notifications {
        let to = match &notification.recipient {
            Recipient::Public => format!("#mafia_{}", TABLE),
            Recipient::Mafia => "@mafia".to_string(),
            Recipient::Player(id) => format!("@{}", id),
        };
        match notification.body {
            NotificationBody::Text(text) => println!("[{}] {}", to, text),
            NotificationBody::CloseChannel => println!("[{}] <channel closed>", to),
        }
    }
}

fn report(result: Result<Vec<Notification>, ServiceError>) {
    match result {
        Ok(notifications) => dispatch(notifications),
        Err(e) => tracing::warn!("Bot command rejected: {}", e),
    }
}

async fn views(state: &AppState, ids: &[PlayerId]) -> Vec<PlayerView> {
    let mut views = Vec::new();
    for id in ids {
        if let Ok(view) = game_service::player_view(state, id).await {
            views.push(view);
        }
    }
    views
}

/// Picks a live player other than the bot itself, avoiding teammates for mafia.
fn pick_target(bot: &PlayerView, views: &[PlayerView], rng: &mut ChaCha8Rng) -> Option<String> {
    let bot_is_mafia = bot.role.is_some_and(Role::is_mafia);
    let candidates: Vec<&PlayerView> = views
        .iter()
        .filter(|v| v.alive && v.player != bot.player)
        .filter(|v| !(bot_is_mafia && v.role.is_some_and(Role::is_mafia)))
        .collect();
    candidates.choose(rng).map(|v| v.name.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv() {
        eprintln!("Warning: no .env file loaded: {}", e);
    }
    let config = (*CONFIG).clone();
    init_logger(config.log_level);

    let players: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("player count must be a number")?,
        None => 7,
    };
    if players < config.min_players || players > config.max_players {
        bail!(
            "player count must be between {} and {}",
            config.min_players,
            config.max_players
        );
    }

    let mut rng = match config.rng_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
        None => ChaCha8Rng::from_entropy(),
    };
    let state = AppState::from_config(config).context("loading role content")?;

    let (handle, notifications) = game_service::create_game(&state, TABLE, PlayerId::new("p1")).await?;
    dispatch(notifications);

    let ids: Vec<PlayerId> = (1..=players).map(|i| PlayerId::new(format!("p{}", i))).collect();
    for (i, id) in ids.iter().enumerate() {
        dispatch(game_service::join_game(&state, TABLE, id.clone(), format!("Player{}", i + 1)).await?);
    }
    for id in &ids {
        let vote = game_service::cast_start_vote(&state, id).await?;
        dispatch(vote.notifications);
    }

    loop {
        let (phase, round) = {
            let game = handle.lock().await;
            (game.phase(), game.round())
        };
        if round > MAX_ROUNDS {
            bail!("no result after {} rounds", MAX_ROUNDS);
        }

        let table = views(&state, &ids).await;
        match phase {
            GamePhase::Night => {
                for bot in table.iter().filter(|v| v.alive && !v.has_acted) {
                    let Some(action) = bot.role.and_then(Role::night_action) else {
                        continue;
                    };
                    let target = match action {
                        NightAction::Protect => table
                            .iter()
                            .filter(|v| v.alive)
                            .collect::<Vec<_>>()
                            .choose(&mut rng)
                            .map(|v| v.name.clone()),
                        NightAction::Kill | NightAction::Investigate => pick_target(bot, &table, &mut rng),
                    };
                    if let Some(target) = target {
                        report(game_service::submit_night_action(&state, &bot.player, &target).await);
                    }
                }
            }
            GamePhase::Day => {
                for bot in table.iter().filter(|v| v.alive) {
                    if let Some(target) = pick_target(bot, &table, &mut rng) {
                        report(game_service::cast_day_vote(&state, &bot.player, &target).await);
                    }
                }
            }
            GamePhase::Concluded(result) => {
                tracing::info!("Simulation finished after {} rounds: {:?}", round, result);
                return Ok(());
            }
            GamePhase::Lobby | GamePhase::Lynch => bail!("unexpected phase {}", phase),
        }
    }
}
