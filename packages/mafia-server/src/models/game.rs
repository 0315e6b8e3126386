use chrono::{DateTime, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::config::GameConfig;
use super::notification::{Notification, Outbox};
use super::player::{Player, PlayerId};
use super::role::{NightAction, Role, RoleCatalog, Ruleset};
use super::vote::VoteTally;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("The game has already started and cannot be joined")]
    NotInLobby,
    #[error("The game has already started")]
    AlreadyStarted,
    #[error("That can only be done during the {expected} phase (currently {actual})")]
    WrongPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("The game is not in session")]
    NotInSession,
    #[error("{0} not found")]
    UnknownTarget(String),
    #[error("Player {0} is not part of this game")]
    UnknownPlayer(PlayerId),
    #[error("Player {0} has already joined")]
    AlreadyJoined(PlayerId),
    #[error("A display name is required")]
    EmptyName,
    #[error("The name {0} is already taken in this game")]
    NameTaken(String),
    #[error("The game is full ({0} players)")]
    RosterFull(usize),
    #[error("Dead players cannot act")]
    PlayerDead,
    #[error("The {0} role has no night action")]
    NoNightAction(Role),
    #[error("That can only be used once per night")]
    DuplicateAction,
    #[error("Only mafia members can do that")]
    NotMafia,
    #[error("Only the game leader can do that")]
    NotLeader,
    #[error("The ruleset needs {required} players but only {available} joined")]
    InsufficientPlayers { required: usize, available: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    MafiaWin,
    TownWin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Lobby,
    Night,
    Day,
    /// Transient while a day vote is being resolved.
    Lynch,
    Concluded(GameResult),
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Lobby => write!(f, "lobby"),
            GamePhase::Night => write!(f, "night"),
            GamePhase::Day => write!(f, "day"),
            GamePhase::Lynch => write!(f, "lynch"),
            GamePhase::Concluded(GameResult::MafiaWin) => write!(f, "concluded (mafia win)"),
            GamePhase::Concluded(GameResult::TownWin) => write!(f, "concluded (town win)"),
        }
    }
}

/// What a player has submitted for the current phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ballot {
    Start,
    /// Automatic night ballot for roles without a night action.
    Pass,
    Target(PlayerId),
}

/// Why a start vote was recorded without starting the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartBlocker {
    RosterTooSmall { required: usize, available: usize },
}

#[derive(Debug, Clone)]
pub struct StartVote {
    pub votes_for: usize,
    pub votes_needed: usize,
    pub started: bool,
    /// Set when the roster keeps the game from starting however many vote.
    pub blocked: Option<StartBlocker>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    /// Only revealed once the game has concluded.
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub name: String,
    pub leader: PlayerId,
    pub phase: GamePhase,
    pub round: u32,
    pub ruleset: String,
    pub players: Vec<PlayerSummary>,
    pub created_at: DateTime<Utc>,
}

/// A single player's private view of their game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub game: String,
    pub player: PlayerId,
    pub name: String,
    pub role: Option<Role>,
    pub alive: bool,
    pub phase: GamePhase,
    pub has_acted: bool,
    pub live_players: Vec<String>,
}

/// Deals roles for a roster of `roster_size` players.
///
/// A third of the roster (rounded down) becomes mafia, then every ruleset role
/// goes to one remaining player, in ruleset order. Everyone left is innocent.
/// The returned vector is indexed like the roster.
pub fn plan_roles<R: Rng + ?Sized>(
    roster_size: usize,
    ruleset: &[Role],
    rng: &mut R,
) -> Result<Vec<Role>, GameError> {
    let mafia = roster_size / 3;
    let required = mafia + ruleset.len();
    if required > roster_size {
        return Err(GameError::InsufficientPlayers {
            required,
            available: roster_size,
        });
    }

    let mut roles: Vec<Option<Role>> = vec![None; roster_size];
    let mut unassigned: Vec<usize> = (0..roster_size).collect();
    let draws = std::iter::repeat(Role::Mafia)
        .take(mafia)
        .chain(ruleset.iter().copied());
    for role in draws {
        let pick = rng.gen_range(0..unassigned.len());
        roles[unassigned.remove(pick)] = Some(role);
    }

    Ok(roles
        .into_iter()
        .map(|role| role.unwrap_or(Role::Innocent))
        .collect())
}

pub struct Game {
    pub game_id: String,
    pub name: String,
    leader: PlayerId,
    players: Vec<Player>,
    ruleset: Ruleset,
    phase: GamePhase,
    votes: VoteTally<Ballot>,
    round: u32,
    min_players: usize,
    max_players: usize,
    catalog: Arc<RoleCatalog>,
    rng: ChaCha8Rng,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("name", &self.name)
            .field("leader", &self.leader)
            .field("players", &self.players)
            .field("ruleset", &self.ruleset.name)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .finish()
    }
}

impl Game {
    pub fn new(
        name: String,
        leader: PlayerId,
        ruleset: Ruleset,
        config: &GameConfig,
        catalog: Arc<RoleCatalog>,
        rng: ChaCha8Rng,
    ) -> Self {
        Game {
            game_id: uuid::Uuid::new_v4().to_string(),
            name,
            leader,
            players: Vec::new(),
            ruleset,
            phase: GamePhase::Lobby,
            votes: VoteTally::new(),
            round: 0,
            min_players: config.min_players,
            max_players: config.max_players,
            catalog,
            rng,
            created_at: Utc::now(),
        }
    }

    pub fn leader(&self) -> &PlayerId {
        &self.leader
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn size(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn result(&self) -> Option<GameResult> {
        match self.phase {
            GamePhase::Concluded(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.result().is_some()
    }

    pub fn ballot_of(&self, id: &PlayerId) -> Option<&Ballot> {
        self.votes.choice_of(id)
    }

    fn live_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive())
    }

    fn live_ids(&self) -> Vec<PlayerId> {
        self.live_players().map(|p| p.id.clone()).collect()
    }

    fn all_live_submitted(&self) -> bool {
        self.votes.all_submitted(&self.live_ids())
    }

    fn display_name<'a>(&'a self, id: &'a PlayerId) -> &'a str {
        self.player(id).map(|p| p.name.as_str()).unwrap_or(id.as_str())
    }

    fn require_phase(&self, expected: GamePhase) -> Result<(), GameError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn live_actor(&self, id: &PlayerId) -> Result<&Player, GameError> {
        let player = self
            .player(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))?;
        if player.is_dead {
            return Err(GameError::PlayerDead);
        }
        Ok(player)
    }

    fn live_target(&self, name: &str) -> Result<&Player, GameError> {
        self.live_players()
            .find(|p| p.name == name.trim())
            .ok_or_else(|| GameError::UnknownTarget(name.to_string()))
    }

    pub fn add_player(&mut self, id: PlayerId, name: String) -> Result<Vec<Notification>, GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::NotInLobby);
        }
        if self.player(&id).is_some() {
            return Err(GameError::AlreadyJoined(id));
        }
        // targets are looked up by trimmed name
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(GameError::EmptyName);
        }
        if self.players.iter().any(|p| p.name == name) {
            return Err(GameError::NameTaken(name));
        }
        if self.players.len() >= self.max_players {
            return Err(GameError::RosterFull(self.max_players));
        }

        tracing::debug!("{} joined game {}", name, self.name);
        let mut outbox = Outbox::new();
        outbox.public(format!("{} joined.", name));
        self.players.push(Player::new(id, name));
        Ok(outbox.into_vec())
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Result<Vec<Notification>, GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::AlreadyStarted);
        }
        let index = self
            .players
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))?;

        let player = self.players.remove(index);
        self.votes.retract(id);

        let mut outbox = Outbox::new();
        outbox.public(format!("{} left.", player.name));
        if &self.leader == id {
            if let Some(next) = self.players.first() {
                self.leader = next.id.clone();
                outbox.public(format!("{} now leads the game.", next.name));
            }
        }
        Ok(outbox.into_vec())
    }

    pub fn set_ruleset(
        &mut self,
        requester: &PlayerId,
        ruleset: Ruleset,
    ) -> Result<Vec<Notification>, GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::AlreadyStarted);
        }
        if &self.leader != requester {
            return Err(GameError::NotLeader);
        }

        let mut outbox = Outbox::new();
        let roles: Vec<&str> = ruleset.roles.iter().map(|r| r.name()).collect();
        outbox.public(format!(
            "Ruleset set to {} (special roles: {}).",
            ruleset.name,
            if roles.is_empty() {
                "none".to_string()
            } else {
                roles.join(", ")
            }
        ));
        self.ruleset = ruleset;
        Ok(outbox.into_vec())
    }

    /// Records a vote to start. Once every member of a large enough roster has
    /// voted, roles are dealt and the first night begins.
    pub fn cast_start_vote(&mut self, voter: &PlayerId) -> Result<StartVote, GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::AlreadyStarted);
        }
        if self.player(voter).is_none() {
            return Err(GameError::UnknownPlayer(voter.clone()));
        }

        let size = self.size();
        let votes_for = self.votes.count(&Ballot::Start) + usize::from(!self.votes.has_voted(voter));
        let mut outbox = Outbox::new();

        if size >= self.min_players && votes_for == size {
            // plan on a copy so a misconfigured ruleset leaves the game untouched
            let mut rng = self.rng.clone();
            let roles = plan_roles(size, &self.ruleset.roles, &mut rng)?;
            self.rng = rng;
            self.votes.cast(voter, Ballot::Start);

            outbox.public(format!("Votes to start: {}/{}", votes_for, size));
            outbox.public("Game is now in session.");
            self.deal(roles, &mut outbox);
            self.begin_night(&mut outbox);
            return Ok(StartVote {
                votes_for,
                votes_needed: size,
                started: true,
                blocked: None,
                notifications: outbox.into_vec(),
            });
        }

        self.votes.cast(voter, Ballot::Start);
        outbox.public(format!("Votes to start: {}/{}", votes_for, size));
        let blocked = (size < self.min_players).then_some(StartBlocker::RosterTooSmall {
            required: self.min_players,
            available: size,
        });
        if blocked.is_some() {
            outbox.public(format!(
                "There need to be at least {} players to start a game.",
                self.min_players
            ));
        }
        Ok(StartVote {
            votes_for,
            votes_needed: size,
            started: false,
            blocked,
            notifications: outbox.into_vec(),
        })
    }

    fn deal(&mut self, roles: Vec<Role>, outbox: &mut Outbox) {
        for (player, role) in self.players.iter_mut().zip(roles) {
            player.role = Some(role);
            outbox.private(
                &player.id,
                "All character actions should be done here so you don't reveal who you are.",
            );
            outbox.private(&player.id, self.catalog.instruction_text(role));
        }

        let mafia: Vec<&str> = self
            .players
            .iter()
            .filter(|p| p.is_mafia())
            .map(|p| p.name.as_str())
            .collect();
        outbox.mafia(format!("Members of team mafia:\n{}", mafia.join("\n")));

        tracing::info!(
            "Dealt roles for game {} ({} players, {} mafia, ruleset {})",
            self.name,
            self.players.len(),
            mafia.len(),
            self.ruleset.name
        );
    }

    fn begin_night(&mut self, outbox: &mut Outbox) {
        self.phase = GamePhase::Night;
        self.round += 1;
        self.votes.clear();
        let passive: Vec<PlayerId> = self
            .live_players()
            .filter(|p| p.role.and_then(Role::night_action).is_none())
            .map(|p| p.id.clone())
            .collect();
        for id in &passive {
            self.votes.cast(id, Ballot::Pass);
        }

        tracing::info!("Game {} entered night {}", self.name, self.round);
        outbox.public(
            "It is now night.\nThe game will progress to morning once all characters perform their action.",
        );
    }

    /// Submits the acting player's night ballot; its effect depends on their role.
    ///
    /// Kill votes and saves may be changed until the night resolves. An
    /// investigation answers at once and counts as the detective's only action.
    pub fn submit_night_action(
        &mut self,
        actor: &PlayerId,
        target_name: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.require_phase(GamePhase::Night)?;
        let player = self.live_actor(actor)?;
        let role = player.role.unwrap_or(Role::Innocent);
        let action = role.night_action().ok_or(GameError::NoNightAction(role))?;
        let target = self.live_target(target_name)?.clone();
        if self.votes.has_voted(actor) && !action.can_overwrite() {
            return Err(GameError::DuplicateAction);
        }

        let actor_name = player.name.clone();
        let mut outbox = Outbox::new();
        match action {
            NightAction::Kill => {
                outbox.mafia(format!("{} votes to kill {}.", actor_name, target.name));
            }
            NightAction::Protect => {
                outbox.private(actor, format!("You are prepared to save {}.", target.name));
            }
            NightAction::Investigate => {
                let role = target.role.unwrap_or(Role::Innocent);
                outbox.private(actor, format!("{} is {}.", target.name, role));
            }
        }
        tracing::debug!("{} submitted {:?} in game {}", actor_name, action, self.name);
        self.votes.cast(actor, Ballot::Target(target.id));

        if self.all_live_submitted() {
            self.resolve_night(false, &mut outbox);
        }
        Ok(outbox.into_vec())
    }

    pub fn cast_day_vote(
        &mut self,
        voter: &PlayerId,
        target_name: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.require_phase(GamePhase::Day)?;
        let name = self.live_actor(voter)?.name.clone();
        let target = self.live_target(target_name)?.id.clone();

        tracing::debug!("{} voted to lynch {} in game {}", name, target, self.name);
        let mut outbox = Outbox::new();
        outbox.private(voter, "Vote recorded \u{1F44C}");
        self.votes.cast(voter, Ballot::Target(target));

        if self.all_live_submitted() {
            self.resolve_lynch(false, &mut outbox);
        }
        Ok(outbox.into_vec())
    }

    /// Relays a night-time message from one mafia member to the rest of the team.
    pub fn mafia_chat(&self, speaker: &PlayerId, message: &str) -> Result<Vec<Notification>, GameError> {
        self.require_phase(GamePhase::Night)?;
        let player = self.live_actor(speaker)?;
        if !player.is_mafia() {
            return Err(GameError::NotMafia);
        }

        let mut outbox = Outbox::new();
        for teammate in self.players.iter().filter(|p| p.is_mafia() && &p.id != speaker) {
            outbox.private(&teammate.id, format!("{}: {}", player.name, message));
        }
        Ok(outbox.into_vec())
    }

    /// Resolves the current night or day with whatever ballots are in.
    pub fn force_resolve(&mut self) -> Result<Vec<Notification>, GameError> {
        let mut outbox = Outbox::new();
        match self.phase {
            GamePhase::Night => self.resolve_night(true, &mut outbox),
            GamePhase::Day => self.resolve_lynch(true, &mut outbox),
            _ => return Err(GameError::NotInSession),
        }
        Ok(outbox.into_vec())
    }

    fn resolve_night(&mut self, forced: bool, outbox: &mut Outbox) {
        assert!(
            forced || self.all_live_submitted(),
            "night resolved before every live player acted"
        );
        self.votes.seal();

        let kill = self
            .votes
            .plurality_among(|id| self.player(id).is_some_and(|p| p.is_alive() && p.is_mafia()))
            .and_then(|ballot| match ballot {
                Ballot::Target(id) => Some(id.clone()),
                _ => None,
            });
        let saved = kill.as_ref().is_some_and(|victim| {
            self.live_players()
                .filter(|p| p.has_role(Role::Doctor))
                .any(|doctor| self.votes.choice_of(&doctor.id) == Some(&Ballot::Target(victim.clone())))
        });

        let mut message = vec!["It is now day.".to_string()];
        match kill {
            Some(victim) if saved => {
                message.push(format!(
                    "An attempt was made on {}'s life, but they were saved.",
                    self.display_name(&victim)
                ));
            }
            Some(victim) => {
                message.push(format!("{} was killed.", self.display_name(&victim)));
                self.kill(&victim);
            }
            None => message.push("The night passed quietly.".to_string()),
        }

        if let Some(result) = self.winner() {
            outbox.public(message.join("\n"));
            self.conclude(result, outbox);
            return;
        }

        self.votes.clear();
        self.phase = GamePhase::Day;
        tracing::info!("Game {} entered day {}", self.name, self.round);
        message.push("Now it is time to discuss. When you are ready to vote, use vote <name>.".to_string());
        message.push("If you want to vote anonymously, DM the command to me.".to_string());
        outbox.public(message.join("\n"));
    }

    fn resolve_lynch(&mut self, forced: bool, outbox: &mut Outbox) {
        assert!(
            forced || self.all_live_submitted(),
            "lynch resolved before every live player voted"
        );
        self.phase = GamePhase::Lynch;
        self.votes.seal();

        let target = self.votes.plurality().and_then(|ballot| match ballot {
            Ballot::Target(id) => Some(id.clone()),
            _ => None,
        });

        let mut message = vec!["The vote is over.".to_string()];
        match target {
            Some(id) => {
                message.push(format!("{} has been lynched.", self.display_name(&id)));
                self.kill(&id);
            }
            None => message.push("No one was lynched.".to_string()),
        }
        outbox.public(message.join("\n"));

        match self.winner() {
            Some(result) => self.conclude(result, outbox),
            None => self.begin_night(outbox),
        }
    }

    fn kill(&mut self, id: &PlayerId) {
        if let Some(player) = self.players.iter_mut().find(|p| &p.id == id) {
            player.is_dead = true;
            tracing::info!("{} died in game {}", player.name, self.name);
        }
    }

    /// Town wins once no mafia is alive; mafia wins at parity with the living.
    fn winner(&self) -> Option<GameResult> {
        let live = self.live_players().count();
        let mafia = self.live_players().filter(|p| p.is_mafia()).count();
        if mafia == 0 {
            Some(GameResult::TownWin)
        } else if mafia * 2 >= live {
            Some(GameResult::MafiaWin)
        } else {
            None
        }
    }

    fn conclude(&mut self, result: GameResult, outbox: &mut Outbox) {
        self.phase = GamePhase::Concluded(result);
        self.votes.clear();

        let mut message = vec![
            match result {
                GameResult::MafiaWin => "Mafia win!",
                GameResult::TownWin => "Innocents win!",
            }
            .to_string(),
            "Who was who:".to_string(),
        ];
        for player in &self.players {
            let role = player.role.map(Role::name).unwrap_or("unassigned");
            message.push(format!("{} -- {}", player.name, role));
        }
        message.push("\nThe game is over. This channel will remain as a record until deleted.".to_string());
        outbox.public(message.join("\n"));
        outbox.close_channel();

        tracing::info!("Game {} concluded: {:?}", self.name, result);
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let reveal = self.is_concluded();
        GameSnapshot {
            game_id: self.game_id.clone(),
            name: self.name.clone(),
            leader: self.leader.clone(),
            phase: self.phase,
            round: self.round,
            ruleset: self.ruleset.name.clone(),
            players: self
                .players
                .iter()
                .map(|p| PlayerSummary {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    alive: p.is_alive(),
                    role: if reveal { p.role } else { None },
                })
                .collect(),
            created_at: self.created_at,
        }
    }

    pub fn view(&self, id: &PlayerId) -> Result<PlayerView, GameError> {
        let player = self
            .player(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))?;
        Ok(PlayerView {
            game: self.name.clone(),
            player: player.id.clone(),
            name: player.name.clone(),
            role: player.role,
            alive: player.is_alive(),
            phase: self.phase,
            has_acted: self.votes.has_voted(id),
            live_players: self.live_players().map(|p| p.name.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::{NotificationBody, Recipient};
    use rand::SeedableRng;

    fn new_game(ruleset: &[Role]) -> Game {
        let catalog = Arc::new(RoleCatalog::builtin().unwrap());
        Game::new(
            "test".to_string(),
            PlayerId::new("p1"),
            Ruleset {
                name: "test".to_string(),
                roles: ruleset.to_vec(),
            },
            &GameConfig::default(),
            catalog,
            ChaCha8Rng::seed_from_u64(7),
        )
    }

    fn lobby(ruleset: &[Role], size: usize) -> Game {
        let mut game = new_game(ruleset);
        for i in 1..=size {
            game.add_player(PlayerId::new(format!("p{}", i)), format!("Player{}", i))
                .unwrap();
        }
        game
    }

    fn started(ruleset: &[Role], size: usize) -> Game {
        let mut game = lobby(ruleset, size);
        for i in 1..=size {
            game.cast_start_vote(&PlayerId::new(format!("p{}", i))).unwrap();
        }
        assert_eq!(game.phase(), GamePhase::Night);
        game
    }

    fn with_role(game: &Game, role: Role) -> Player {
        game.players().iter().find(|p| p.has_role(role)).cloned().unwrap()
    }

    fn texts(notifications: &[Notification]) -> Vec<&str> {
        notifications.iter().filter_map(|n| n.text()).collect()
    }

    #[test]
    fn plan_roles_deals_a_third_mafia_and_the_ruleset() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let roles = plan_roles(7, &[Role::Doctor, Role::Detective], &mut rng).unwrap();
        assert_eq!(roles.len(), 7);
        assert_eq!(roles.iter().filter(|r| **r == Role::Mafia).count(), 2);
        assert_eq!(roles.iter().filter(|r| **r == Role::Doctor).count(), 1);
        assert_eq!(roles.iter().filter(|r| **r == Role::Detective).count(), 1);
        assert_eq!(roles.iter().filter(|r| **r == Role::Innocent).count(), 3);
    }

    #[test]
    fn plan_roles_is_reproducible() {
        let a = plan_roles(9, &[Role::Doctor], &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let b = plan_roles(9, &[Role::Doctor], &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn plan_roles_rejects_oversized_ruleset() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = plan_roles(4, &[Role::Doctor, Role::Detective, Role::Doctor, Role::Detective], &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientPlayers {
                required: 5,
                available: 4
            }
        );
    }

    #[test]
    fn join_rules_are_enforced() {
        let mut game = lobby(&[], 2);
        assert_eq!(
            game.add_player(PlayerId::new("p1"), "Other".to_string()),
            Err(GameError::AlreadyJoined(PlayerId::new("p1")))
        );
        assert_eq!(
            game.add_player(PlayerId::new("p9"), "Player1".to_string()),
            Err(GameError::NameTaken("Player1".to_string()))
        );

        let mut full = lobby(&[], 9);
        assert_eq!(
            full.add_player(PlayerId::new("p10"), "Player10".to_string()),
            Err(GameError::RosterFull(9))
        );
    }

    #[test]
    fn display_names_are_trimmed_on_join() {
        let mut game = lobby(&[Role::Doctor, Role::Detective], 3);
        assert_eq!(
            game.add_player(PlayerId::new("p8"), "   ".to_string()),
            Err(GameError::EmptyName)
        );
        assert_eq!(
            game.add_player(PlayerId::new("p8"), "Player1 ".to_string()),
            Err(GameError::NameTaken("Player1".to_string()))
        );

        let out = game.add_player(PlayerId::new("p4"), " Bob ".to_string()).unwrap();
        assert_eq!(texts(&out), vec!["Bob joined."]);
        assert_eq!(game.player(&PlayerId::new("p4")).unwrap().name, "Bob");

        for i in 1..=4 {
            game.cast_start_vote(&PlayerId::new(format!("p{}", i))).unwrap();
        }
        let bob = game.player(&PlayerId::new("p4")).cloned().unwrap();
        let actor = game
            .players()
            .iter()
            .find(|p| p.id != bob.id && p.role.and_then(Role::night_action).is_some())
            .cloned()
            .unwrap();
        game.submit_night_action(&actor.id, "Bob ").unwrap();
        assert_eq!(game.ballot_of(&actor.id), Some(&Ballot::Target(bob.id)));
    }

    #[test]
    fn start_needs_minimum_roster() {
        let mut game = lobby(&[], 3);
        for i in 1..=3 {
            let vote = game.cast_start_vote(&PlayerId::new(format!("p{}", i))).unwrap();
            assert!(!vote.started);
            assert_eq!(
                vote.blocked,
                Some(StartBlocker::RosterTooSmall {
                    required: 4,
                    available: 3
                })
            );
            assert_eq!(vote.votes_for, i);
            assert_eq!(vote.votes_needed, 3);
        }
        assert_eq!(game.phase(), GamePhase::Lobby);
    }

    #[test]
    fn force_resolve_needs_a_game_in_session() {
        let mut game = lobby(&[], 4);
        assert_eq!(game.force_resolve(), Err(GameError::NotInSession));
        assert_eq!(game.phase(), GamePhase::Lobby);
    }

    #[test]
    fn repeated_start_vote_is_counted_once() {
        let mut game = lobby(&[], 4);
        game.cast_start_vote(&PlayerId::new("p1")).unwrap();
        let vote = game.cast_start_vote(&PlayerId::new("p1")).unwrap();
        assert_eq!(vote.votes_for, 1);
        // waiting on votes, not blocked
        assert_eq!(vote.blocked, None);
    }

    #[test]
    fn unanimous_start_deals_roles_and_begins_night() {
        let mut game = lobby(&[Role::Doctor, Role::Detective], 4);
        for i in 1..=3 {
            game.cast_start_vote(&PlayerId::new(format!("p{}", i))).unwrap();
        }
        let vote = game.cast_start_vote(&PlayerId::new("p4")).unwrap();
        assert!(vote.started);
        assert_eq!(game.phase(), GamePhase::Night);
        assert_eq!(game.round(), 1);

        let mafia = game.players().iter().filter(|p| p.is_mafia()).count();
        assert_eq!(mafia, 1);
        assert!(game.players().iter().all(|p| p.role.is_some()));

        // every player gets their instructions, the mafia learns its members
        for player in game.players() {
            assert!(vote
                .notifications
                .iter()
                .any(|n| n.recipient == Recipient::Player(player.id.clone())));
        }
        assert!(vote.notifications.iter().any(|n| n.recipient == Recipient::Mafia));

        // innocents pass automatically
        let innocent = with_role(&game, Role::Innocent);
        assert_eq!(game.ballot_of(&innocent.id), Some(&Ballot::Pass));
    }

    #[test]
    fn misconfigured_ruleset_aborts_start_untouched() {
        let mut game = lobby(&[Role::Doctor, Role::Detective, Role::Doctor, Role::Detective], 4);
        for i in 1..=3 {
            game.cast_start_vote(&PlayerId::new(format!("p{}", i))).unwrap();
        }
        let err = game.cast_start_vote(&PlayerId::new("p4")).unwrap_err();
        assert!(matches!(err, GameError::InsufficientPlayers { .. }));
        assert_eq!(game.phase(), GamePhase::Lobby);
        assert!(game.players().iter().all(|p| p.role.is_none()));
        assert_eq!(game.ballot_of(&PlayerId::new("p4")), None);
    }

    #[test]
    fn doctor_saves_the_mafia_target() {
        let mut game = started(&[Role::Doctor, Role::Detective], 4);
        let mafia = with_role(&game, Role::Mafia);
        let doctor = with_role(&game, Role::Doctor);
        let detective = with_role(&game, Role::Detective);

        game.submit_night_action(&mafia.id, &detective.name).unwrap();
        game.submit_night_action(&doctor.id, &detective.name).unwrap();
        let out = game.submit_night_action(&detective.id, &mafia.name).unwrap();

        assert_eq!(game.phase(), GamePhase::Day);
        assert!(game.players().iter().all(|p| p.is_alive()));
        assert!(texts(&out).iter().any(|t| t.contains("but they were saved")));
        assert!(texts(&out).contains(&format!("{} is mafia.", mafia.name).as_str()));
    }

    #[test]
    fn unprotected_target_dies() {
        let mut game = started(&[Role::Doctor, Role::Detective], 4);
        let mafia = with_role(&game, Role::Mafia);
        let doctor = with_role(&game, Role::Doctor);
        let detective = with_role(&game, Role::Detective);
        let innocent = with_role(&game, Role::Innocent);

        game.submit_night_action(&mafia.id, &innocent.name).unwrap();
        game.submit_night_action(&doctor.id, &doctor.name).unwrap();
        game.submit_night_action(&detective.id, &doctor.name).unwrap();

        assert_eq!(game.phase(), GamePhase::Day);
        assert!(game.player(&innocent.id).unwrap().is_dead);
    }

    #[test]
    fn detective_may_investigate_once_per_night() {
        let mut game = started(&[Role::Doctor, Role::Detective], 4);
        let detective = with_role(&game, Role::Detective);
        let doctor = with_role(&game, Role::Doctor);

        game.submit_night_action(&detective.id, &doctor.name).unwrap();
        assert_eq!(
            game.submit_night_action(&detective.id, &doctor.name),
            Err(GameError::DuplicateAction)
        );
    }

    #[test]
    fn kill_votes_may_change_until_resolution() {
        let mut game = started(&[Role::Doctor, Role::Detective], 4);
        let mafia = with_role(&game, Role::Mafia);
        let doctor = with_role(&game, Role::Doctor);
        let innocent = with_role(&game, Role::Innocent);

        game.submit_night_action(&mafia.id, &doctor.name).unwrap();
        game.submit_night_action(&mafia.id, &innocent.name).unwrap();
        assert_eq!(
            game.ballot_of(&mafia.id),
            Some(&Ballot::Target(innocent.id.clone()))
        );
    }

    #[test]
    fn invalid_night_actions_are_rejected() {
        let mut game = started(&[Role::Doctor, Role::Detective], 4);
        let mafia = with_role(&game, Role::Mafia);
        let innocent = with_role(&game, Role::Innocent);

        assert_eq!(
            game.submit_night_action(&innocent.id, &mafia.name),
            Err(GameError::NoNightAction(Role::Innocent))
        );
        assert_eq!(
            game.submit_night_action(&mafia.id, "Nobody"),
            Err(GameError::UnknownTarget("Nobody".to_string()))
        );
        assert_eq!(game.ballot_of(&mafia.id), None);
        assert_eq!(
            game.cast_day_vote(&mafia.id, &innocent.name),
            Err(GameError::WrongPhase {
                expected: GamePhase::Day,
                actual: GamePhase::Night
            })
        );
    }

    #[test]
    fn lynching_the_last_mafia_ends_the_game() {
        let mut game = started(&[Role::Doctor, Role::Detective], 4);
        let mafia = with_role(&game, Role::Mafia);
        let doctor = with_role(&game, Role::Doctor);
        let detective = with_role(&game, Role::Detective);

        game.submit_night_action(&mafia.id, &detective.name).unwrap();
        game.submit_night_action(&doctor.id, &detective.name).unwrap();
        game.submit_night_action(&detective.id, &mafia.name).unwrap();

        let ids: Vec<PlayerId> = game.players().iter().map(|p| p.id.clone()).collect();
        let mut out = Vec::new();
        for id in &ids {
            out = game.cast_day_vote(id, &mafia.name).unwrap();
        }

        assert_eq!(game.phase(), GamePhase::Concluded(GameResult::TownWin));
        assert!(texts(&out).iter().any(|t| t.starts_with("Innocents win!")));
        assert!(out.iter().any(|n| n.body == NotificationBody::CloseChannel));

        // nothing moves a concluded game
        assert!(game.cast_day_vote(&ids[0], &doctor.name).is_err());
        assert_eq!(game.force_resolve().unwrap_err(), GameError::NotInSession);
        assert_eq!(game.phase(), GamePhase::Concluded(GameResult::TownWin));
    }

    #[test]
    fn mafia_wins_at_parity() {
        let mut game = started(&[], 4);
        let mafia = with_role(&game, Role::Mafia);
        let town: Vec<Player> = game.players().iter().filter(|p| !p.is_mafia()).cloned().collect();

        game.submit_night_action(&mafia.id, &town[0].name).unwrap();
        assert_eq!(game.phase(), GamePhase::Day);

        // town turns on itself
        let voters: Vec<PlayerId> = game
            .players()
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id.clone())
            .collect();
        for voter in &voters {
            game.cast_day_vote(voter, &town[1].name).unwrap();
        }
        assert_eq!(game.phase(), GamePhase::Concluded(GameResult::MafiaWin));
    }

    #[test]
    fn dead_players_cannot_act() {
        let mut game = started(&[], 4);
        let mafia = with_role(&game, Role::Mafia);
        let victim = game.players().iter().find(|p| !p.is_mafia()).cloned().unwrap();
        game.submit_night_action(&mafia.id, &victim.name).unwrap();

        assert_eq!(
            game.cast_day_vote(&victim.id, &mafia.name),
            Err(GameError::PlayerDead)
        );
        assert_eq!(
            game.cast_day_vote(&mafia.id, &victim.name),
            Err(GameError::UnknownTarget(victim.name.clone()))
        );
    }

    #[test]
    fn force_resolve_without_ballots_spares_everyone() {
        let mut game = started(&[Role::Doctor], 4);
        game.force_resolve().unwrap();
        assert_eq!(game.phase(), GamePhase::Day);
        assert!(game.players().iter().all(|p| p.is_alive()));

        let out = game.force_resolve().unwrap();
        assert!(texts(&out).iter().any(|t| t.contains("No one was lynched.")));
        assert_eq!(game.phase(), GamePhase::Night);
        assert_eq!(game.round(), 2);
    }

    #[test]
    fn leader_passes_on_when_leaving() {
        let mut game = lobby(&[], 3);
        game.cast_start_vote(&PlayerId::new("p1")).unwrap();
        game.remove_player(&PlayerId::new("p1")).unwrap();
        assert_eq!(game.leader(), &PlayerId::new("p2"));
        assert_eq!(game.size(), 2);
        assert_eq!(game.ballot_of(&PlayerId::new("p1")), None);
    }

    #[test]
    fn only_leader_sets_ruleset() {
        let mut game = lobby(&[], 4);
        let vanilla = Ruleset {
            name: "vanilla".to_string(),
            roles: vec![],
        };
        assert_eq!(
            game.set_ruleset(&PlayerId::new("p2"), vanilla.clone()),
            Err(GameError::NotLeader)
        );
        game.set_ruleset(&PlayerId::new("p1"), vanilla).unwrap();
        assert_eq!(game.ruleset().name, "vanilla");
    }

    #[test]
    fn mafia_chat_reaches_teammates_only() {
        let game = started(&[], 6);
        let mafia: Vec<Player> = game.players().iter().filter(|p| p.is_mafia()).cloned().collect();
        assert_eq!(mafia.len(), 2);

        let out = game.mafia_chat(&mafia[0].id, "hello").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, Recipient::Player(mafia[1].id.clone()));

        let town = game.players().iter().find(|p| !p.is_mafia()).cloned().unwrap();
        assert_eq!(game.mafia_chat(&town.id, "hi"), Err(GameError::NotMafia));
    }

    #[test]
    fn snapshot_hides_roles_until_conclusion() {
        let game = started(&[], 4);
        assert!(game.snapshot().players.iter().all(|p| p.role.is_none()));
        let view = game.view(&PlayerId::new("p1")).unwrap();
        assert!(view.role.is_some());
        assert_eq!(view.live_players.len(), 4);
    }
}
