//! In-memory [`GameHost`] that records every effector call.
//!
//! Backs the coordinator tests and the replay driver. Teleports and game
//! mode changes are applied to the stored roster so later reads observe
//! them, and individual capabilities can be switched off to exercise the
//! degraded paths.

use std::collections::BTreeMap;
use std::sync::Mutex;

use hashbrown::HashSet;
use splitrun_types::StyledText;

use super::{GameHost, Location, PlayerId, PlayerSnapshot};
use crate::display::DisplayLine;
use crate::error::{EffectResult, EffectorError};
use crate::lock;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Broadcast(StyledText),
    ActionBar {
        player: PlayerId,
        message: StyledText,
    },
    Spectator(PlayerId),
    Teleport {
        player: PlayerId,
        target: Location,
    },
    TeleportLocal {
        player: PlayerId,
        x: f64,
        y: f64,
        z: f64,
    },
    ZeroVelocity(PlayerId),
    ForceRespawn(PlayerId),
    ImmediateRespawn,
    EnsureObjective {
        objective: String,
        title: String,
    },
    SetLine {
        objective: String,
        slot: i32,
        holder: String,
    },
    RemoveLine {
        objective: String,
        holder: String,
    },
}

#[derive(Debug, Clone)]
struct MemoryPlayer {
    snapshot: PlayerSnapshot,
    spectator: bool,
}

#[derive(Debug, Default)]
struct World {
    players: Vec<MemoryPlayer>,
    achievements: HashSet<(PlayerId, String)>,
    unknown_achievements: HashSet<String>,
    unsupported: HashSet<&'static str>,
    calls: Vec<HostCall>,
    /// holder -> (slot, text)
    sidebar: BTreeMap<String, (i32, StyledText)>,
}

impl World {
    fn check(&self, capability: &'static str) -> EffectResult {
        if self.unsupported.contains(capability) {
            return Err(EffectorError::Unsupported { capability });
        }
        Ok(())
    }

    fn player_mut(&mut self, id: &PlayerId) -> Option<&mut MemoryPlayer> {
        self.players.iter_mut().find(|p| &p.snapshot.id == id)
    }

    fn require_player(&mut self, id: &PlayerId, capability: &'static str) -> Result<&mut MemoryPlayer, EffectorError> {
        self.player_mut(id).ok_or_else(|| EffectorError::Failed {
            capability,
            reason: format!("player {} is not connected", id),
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    world: Mutex<World>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Roster ---

    /// Connect a player, or refresh their snapshot if already connected.
    pub fn join(&self, snapshot: PlayerSnapshot) {
        let mut world = lock(&self.world);
        match world.player_mut(&snapshot.id) {
            Some(existing) => existing.snapshot = snapshot,
            None => world.players.push(MemoryPlayer {
                snapshot,
                spectator: false,
            }),
        }
    }

    pub fn leave(&self, id: &PlayerId) {
        lock(&self.world).players.retain(|p| &p.snapshot.id != id);
    }

    pub fn move_to(&self, id: &PlayerId, location: Location) {
        if let Some(player) = lock(&self.world).player_mut(id) {
            player.snapshot.location = location;
        }
    }

    pub fn set_health(&self, id: &PlayerId, health: f32) {
        if let Some(player) = lock(&self.world).player_mut(id) {
            player.snapshot.health = health;
        }
    }

    pub fn is_spectator(&self, id: &PlayerId) -> bool {
        lock(&self.world)
            .players
            .iter()
            .any(|p| &p.snapshot.id == id && p.spectator)
    }

    // --- Achievements ---

    pub fn grant(&self, id: &PlayerId, achievement: &str) {
        lock(&self.world)
            .achievements
            .insert((id.clone(), achievement.to_string()));
    }

    pub fn revoke_all(&self) {
        lock(&self.world).achievements.clear();
    }

    /// Make the host report `achievement` as unknown.
    pub fn forget_achievement(&self, achievement: &str) {
        lock(&self.world)
            .unknown_achievements
            .insert(achievement.to_string());
    }

    // --- Capabilities ---

    pub fn mark_unsupported(&self, capability: &'static str) {
        lock(&self.world).unsupported.insert(capability);
    }

    // --- Inspection ---

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.world).calls.clone()
    }

    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut lock(&self.world).calls)
    }

    /// Plain text of every broadcast so far, in order.
    pub fn broadcasts(&self) -> Vec<String> {
        lock(&self.world)
            .calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Broadcast(text) => Some(text.plain()),
                _ => None,
            })
            .collect()
    }

    /// Sidebar as `(slot, visible text)`, highest slot first.
    pub fn sidebar(&self) -> Vec<(i32, String)> {
        let mut lines: Vec<_> = lock(&self.world)
            .sidebar
            .values()
            .map(|(slot, text)| (*slot, text.plain()))
            .collect();
        lines.sort_by(|a, b| b.0.cmp(&a.0));
        lines
    }
}

impl GameHost for MemoryHost {
    fn players(&self) -> Vec<PlayerSnapshot> {
        lock(&self.world)
            .players
            .iter()
            .map(|p| p.snapshot.clone())
            .collect()
    }

    fn achievement_exists(&self, achievement: &str) -> bool {
        !lock(&self.world).unknown_achievements.contains(achievement)
    }

    fn has_achievement(&self, player: &PlayerId, achievement: &str) -> bool {
        lock(&self.world)
            .achievements
            .contains(&(player.clone(), achievement.to_string()))
    }

    fn broadcast(&self, message: &StyledText) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("broadcast")?;
        world.calls.push(HostCall::Broadcast(message.clone()));
        Ok(())
    }

    fn send_action_bar(&self, player: &PlayerId, message: &StyledText) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("action_bar")?;
        world.calls.push(HostCall::ActionBar {
            player: player.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    fn set_spectator(&self, player: &PlayerId) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("set_spectator")?;
        world.require_player(player, "set_spectator")?.spectator = true;
        world.calls.push(HostCall::Spectator(player.clone()));
        Ok(())
    }

    fn teleport(&self, player: &PlayerId, target: &Location) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("teleport")?;
        world.require_player(player, "teleport")?.snapshot.location = target.clone();
        world.calls.push(HostCall::Teleport {
            player: player.clone(),
            target: target.clone(),
        });
        Ok(())
    }

    fn teleport_local(&self, player: &PlayerId, x: f64, y: f64, z: f64) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("teleport_local")?;
        let location = &mut world.require_player(player, "teleport_local")?.snapshot.location;
        location.x = x;
        location.y = y;
        location.z = z;
        world.calls.push(HostCall::TeleportLocal {
            player: player.clone(),
            x,
            y,
            z,
        });
        Ok(())
    }

    fn zero_velocity(&self, player: &PlayerId) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("zero_velocity")?;
        world.require_player(player, "zero_velocity")?;
        world.calls.push(HostCall::ZeroVelocity(player.clone()));
        Ok(())
    }

    fn force_respawn(&self, player: &PlayerId) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("force_respawn")?;
        world.require_player(player, "force_respawn")?;
        world.calls.push(HostCall::ForceRespawn(player.clone()));
        Ok(())
    }

    fn enable_immediate_respawn(&self) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("immediate_respawn")?;
        world.calls.push(HostCall::ImmediateRespawn);
        Ok(())
    }

    fn ensure_objective(&self, objective: &str, title: &str) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("ensure_objective")?;
        world.calls.push(HostCall::EnsureObjective {
            objective: objective.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    fn set_line(&self, objective: &str, line: &DisplayLine) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("set_line")?;
        let holder = line.holder();
        world
            .sidebar
            .insert(holder.clone(), (line.slot, line.text.clone()));
        world.calls.push(HostCall::SetLine {
            objective: objective.to_string(),
            slot: line.slot,
            holder,
        });
        Ok(())
    }

    fn remove_line(&self, objective: &str, line: &DisplayLine) -> EffectResult {
        let mut world = lock(&self.world);
        world.check("remove_line")?;
        let holder = line.holder();
        world.sidebar.remove(&holder);
        world.calls.push(HostCall::RemoveLine {
            objective: objective.to_string(),
            holder,
        });
        Ok(())
    }
}
