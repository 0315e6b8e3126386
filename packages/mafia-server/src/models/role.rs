use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const BUILTIN_CONTENT: &str = include_str!("../../content/mafia.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown ruleset: {0}")]
    UnknownRuleset(String),
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("Ruleset {ruleset} lists {role}, which is not a special role")]
    InvalidRulesetRole { ruleset: String, role: Role },
    #[error("No instructions loaded for role {0}")]
    MissingInstructions(Role),
    #[error("Failed to read role content: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse role content: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Innocent,
    Mafia,
    Doctor,
    Detective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Town,
    Mafia,
}

/// What a role does when it submits its night ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightAction {
    Kill,
    Protect,
    Investigate,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Innocent, Role::Mafia, Role::Doctor, Role::Detective];

    pub fn name(self) -> &'static str {
        match self {
            Role::Innocent => "innocent",
            Role::Mafia => "mafia",
            Role::Doctor => "doctor",
            Role::Detective => "detective",
        }
    }

    pub fn faction(self) -> Faction {
        match self {
            Role::Mafia => Faction::Mafia,
            Role::Innocent | Role::Doctor | Role::Detective => Faction::Town,
        }
    }

    /// Roles a ruleset hands out on top of the mafia.
    pub fn is_special(self) -> bool {
        matches!(self, Role::Doctor | Role::Detective)
    }

    pub fn is_mafia(self) -> bool {
        self.faction() == Faction::Mafia
    }

    /// `None` for passive roles, which pass automatically every night.
    pub fn night_action(self) -> Option<NightAction> {
        match self {
            Role::Innocent => None,
            Role::Mafia => Some(NightAction::Kill),
            Role::Doctor => Some(NightAction::Protect),
            Role::Detective => Some(NightAction::Investigate),
        }
    }
}

impl NightAction {
    /// Investigations answer immediately, so they cannot be taken back.
    pub fn can_overwrite(self) -> bool {
        !matches!(self, NightAction::Investigate)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Town => write!(f, "town"),
            Faction::Mafia => write!(f, "mafia"),
        }
    }
}

impl FromStr for Role {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownRole(s.to_string()))
    }
}

/// Raw shape of a role content file.
#[derive(Debug, Deserialize)]
struct CatalogContent {
    roles: HashMap<String, String>,
    #[serde(default)]
    rulesets: BTreeMap<String, Vec<String>>,
}

/// A named, ordered list of special roles to hand out on top of the mafia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    pub name: String,
    pub roles: Vec<Role>,
}

/// Immutable role descriptions and rulesets, loaded once.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    instructions: HashMap<Role, String>,
    rulesets: BTreeMap<String, Vec<Role>>,
}

impl RoleCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CONTENT)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let content: CatalogContent = serde_json::from_str(raw)?;

        let mut instructions = HashMap::new();
        for (name, text) in content.roles {
            instructions.insert(name.parse::<Role>()?, text);
        }
        if let Some(missing) = Role::ALL.into_iter().find(|r| !instructions.contains_key(r)) {
            return Err(CatalogError::MissingInstructions(missing));
        }

        let mut rulesets = BTreeMap::new();
        for (name, roles) in content.rulesets {
            let roles = roles
                .iter()
                .map(|r| r.parse::<Role>())
                .collect::<Result<Vec<_>, _>>()?;
            // mafia are dealt by roster size and innocents fill the rest
            if let Some(role) = roles.iter().copied().find(|r| !r.is_special()) {
                return Err(CatalogError::InvalidRulesetRole { ruleset: name, role });
            }
            rulesets.insert(name, roles);
        }

        Ok(Self {
            instructions,
            rulesets,
        })
    }

    pub fn resolve(&self, ruleset: &str) -> Result<Ruleset, CatalogError> {
        self.rulesets
            .get(ruleset)
            .map(|roles| Ruleset {
                name: ruleset.to_string(),
                roles: roles.clone(),
            })
            .ok_or_else(|| CatalogError::UnknownRuleset(ruleset.to_string()))
    }

    pub fn faction_of(&self, role: &str) -> Result<Faction, CatalogError> {
        Ok(role.parse::<Role>()?.faction())
    }

    pub fn instruction_text(&self, role: Role) -> &str {
        // load rejects catalogs without text for every role
        self.instructions
            .get(&role)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn ruleset_names(&self) -> impl Iterator<Item = &str> {
        self.rulesets.keys().map(String::as_str)
    }
}
