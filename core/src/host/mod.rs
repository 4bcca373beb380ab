//! Boundary to the game engine.
//!
//! The coordinator never touches world simulation directly. It reads the
//! roster and achievement progress through [`GameHost`] and issues every
//! side effect (chat, game mode, teleport, sidebar) as an effector call
//! that returns an [`EffectResult`]. Capabilities a host may lack have
//! default implementations that report [`EffectorError::Unsupported`].

pub mod memory;
pub mod respawn;

use serde::{Deserialize, Serialize};
use splitrun_types::StyledText;

use crate::display::DisplayLine;
use crate::error::{EffectResult, EffectorError};

pub use respawn::{ManualRespawn, RespawnCapability, ServerRespawn, respawn_capability};

/// Stable player identity (the host's UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// World (dimension) identifier plus coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Squared distance, or `None` when the two points are in different worlds.
    pub fn distance_sq(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dx * dx + dy * dy + dz * dz)
    }

    /// Integer block coordinates of this point.
    pub fn block(&self) -> (i64, i64, i64) {
        (
            self.x.floor() as i64,
            self.y.floor() as i64,
            self.z.floor() as i64,
        )
    }

    /// Block-aligned relocation target, nudged up so players land on top of
    /// the block they died on rather than inside it.
    pub fn relocation_anchor(&self) -> Location {
        Location::new(
            self.world.clone(),
            self.x.floor(),
            (self.y + 0.2).floor(),
            self.z.floor(),
        )
    }
}

/// Point-in-time view of a connected player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub location: Location,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attacker {
    Player { name: String },
    Entity { kind: String },
}

/// Descriptor of a damage or death source as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageSource {
    /// Damage type name, e.g. `inFire`, `mob`, `genericKill`.
    pub kind: String,
    #[serde(default)]
    pub attacker: Option<Attacker>,
    /// Entity type of the projectile that delivered the hit, if any.
    #[serde(default)]
    pub projectile: Option<String>,
}

impl DamageSource {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attacker: None,
            projectile: None,
        }
    }

    pub fn with_attacker(mut self, attacker: Attacker) -> Self {
        self.attacker = Some(attacker);
        self
    }

    pub fn with_projectile(mut self, projectile: impl Into<String>) -> Self {
        self.projectile = Some(projectile.into());
        self
    }

    /// Case-insensitive substring match against the type name.
    pub fn kind_matches(&self, needle: &str) -> bool {
        self.kind
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    /// `environment`, `player:<name>` or the attacking entity's type.
    pub fn describe_attacker(&self) -> String {
        match &self.attacker {
            None => "environment".to_string(),
            Some(Attacker::Player { name }) => format!("player:{}", name),
            Some(Attacker::Entity { kind }) => kind.clone(),
        }
    }

    /// `projectile:<type>` for ranged hits, otherwise the type name.
    pub fn describe_cause(&self) -> String {
        match &self.projectile {
            Some(projectile) => format!("projectile:{}", projectile),
            None => self.kind.clone(),
        }
    }
}

/// Everything the coordinator needs from the game engine.
///
/// Roster order returned by [`GameHost::players`] must be stable: the first
/// player in that order wins a milestone completed simultaneously.
pub trait GameHost: Send + Sync {
    /// Connected players in stable roster order.
    fn players(&self) -> Vec<PlayerSnapshot>;

    fn player(&self, id: &PlayerId) -> Option<PlayerSnapshot> {
        self.players().into_iter().find(|p| &p.id == id)
    }

    /// Whether the host knows this achievement at all. Unknown achievements
    /// are skipped instead of being treated as incomplete forever.
    fn achievement_exists(&self, _achievement: &str) -> bool {
        true
    }

    fn has_achievement(&self, player: &PlayerId, achievement: &str) -> bool;

    fn broadcast(&self, message: &StyledText) -> EffectResult;

    fn send_action_bar(&self, _player: &PlayerId, _message: &StyledText) -> EffectResult {
        Err(EffectorError::Unsupported {
            capability: "action_bar",
        })
    }

    /// Put the player into the non-participating observer mode.
    fn set_spectator(&self, player: &PlayerId) -> EffectResult;

    /// Cross-world teleport.
    fn teleport(&self, player: &PlayerId, target: &Location) -> EffectResult;

    /// Teleport within the player's current world (degraded path).
    fn teleport_local(&self, _player: &PlayerId, _x: f64, _y: f64, _z: f64) -> EffectResult {
        Err(EffectorError::Unsupported {
            capability: "teleport_local",
        })
    }

    fn zero_velocity(&self, _player: &PlayerId) -> EffectResult {
        Err(EffectorError::Unsupported {
            capability: "zero_velocity",
        })
    }

    /// Respawn a player that is still on the death screen.
    fn force_respawn(&self, _player: &PlayerId) -> EffectResult {
        Err(EffectorError::Unsupported {
            capability: "force_respawn",
        })
    }

    /// Skip the death screen for future deaths.
    fn enable_immediate_respawn(&self) -> EffectResult {
        Err(EffectorError::Unsupported {
            capability: "immediate_respawn",
        })
    }

    /// Create the sidebar objective and show it. Called once per process.
    fn ensure_objective(&self, objective: &str, title: &str) -> EffectResult;

    /// Show `line` at its slot, keyed by [`DisplayLine::holder`].
    fn set_line(&self, objective: &str, line: &DisplayLine) -> EffectResult;

    /// Remove a line previously shown with [`GameHost::set_line`].
    fn remove_line(&self, objective: &str, line: &DisplayLine) -> EffectResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_sq_same_world() {
        let a = Location::new("minecraft:overworld", 0.0, 64.0, 0.0);
        let b = Location::new("minecraft:overworld", 3.0, 68.0, 0.0);
        assert_eq!(a.distance_sq(&b), Some(25.0));
    }

    #[test]
    fn test_distance_sq_other_world() {
        let a = Location::new("minecraft:overworld", 0.0, 64.0, 0.0);
        let b = Location::new("minecraft:the_nether", 0.0, 64.0, 0.0);
        assert_eq!(a.distance_sq(&b), None);
    }

    #[test]
    fn test_relocation_anchor_floors_and_lifts() {
        let death = Location::new("minecraft:overworld", -3.5, 63.9, 10.2);
        let anchor = death.relocation_anchor();
        assert_eq!((anchor.x, anchor.y, anchor.z), (-4.0, 64.0, 10.0));
        assert_eq!(death.block(), (-4, 63, 10));
    }

    #[test]
    fn test_describe_attacker_and_cause() {
        let env = DamageSource::new("lava");
        assert_eq!(env.describe_attacker(), "environment");
        assert_eq!(env.describe_cause(), "lava");

        let arrow = DamageSource::new("arrow")
            .with_attacker(Attacker::Entity {
                kind: "entity.minecraft.skeleton".to_string(),
            })
            .with_projectile("entity.minecraft.arrow");
        assert_eq!(arrow.describe_attacker(), "entity.minecraft.skeleton");
        assert_eq!(arrow.describe_cause(), "projectile:entity.minecraft.arrow");

        let pvp = DamageSource::new("player").with_attacker(Attacker::Player {
            name: "Alex".to_string(),
        });
        assert_eq!(pvp.describe_attacker(), "player:Alex");
    }

    #[test]
    fn test_kind_matches_is_case_insensitive() {
        assert!(DamageSource::new("genericKill").kind_matches("generickill"));
        assert!(DamageSource::new("onFire").kind_matches("FIRE"));
        assert!(!DamageSource::new("fall").kind_matches("fire"));
    }
}
