//! Post-failure pin and recovery.
//!
//! For a short window after a failure every connected player is held at the
//! death location: players outside the radius are teleported back (at most
//! every `teleport_interval_ticks`), players inside have their velocity
//! zeroed every tick so they do not drift out.
//!
//! The controller also queues players that need a second, targeted recovery
//! pass once the host reports them connected again (the dead player's
//! client may ignore the first pass while on the death screen).

use std::sync::Mutex;

use splitrun_types::PinConfig;

use crate::error::absorb;
use crate::host::{GameHost, Location, PlayerId, PlayerSnapshot};
use crate::lock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinReport {
    pub teleported: usize,
    pub steadied: usize,
}

#[derive(Debug, Default)]
struct PinState {
    target: Option<Location>,
    until_ms: i64,
    ticks: u32,
    pending_recovery: Vec<PlayerId>,
}

#[derive(Debug)]
pub struct PinController {
    config: PinConfig,
    state: Mutex<PinState>,
}

impl PinController {
    pub fn new(config: PinConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PinState::default()),
        }
    }

    /// Hold players at the exact failure location `target` until
    /// `failed_at_ms + window_ms`.
    pub fn activate(&self, target: Location, failed_at_ms: i64) {
        let mut state = lock(&self.state);
        state.until_ms = failed_at_ms + self.config.window_ms;
        state.target = Some(target);
        state.ticks = 0;
    }

    /// Drop the pin and any queued recoveries.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.target = None;
        state.ticks = 0;
        state.pending_recovery.clear();
    }

    /// One tick of pin enforcement. The window includes its last
    /// millisecond; the pin expires on the first tick after it.
    pub fn enforce(&self, host: &dyn GameHost, now_ms: i64) -> PinReport {
        let (target, teleport_tick) = {
            let mut state = lock(&self.state);
            let Some(target) = state.target.clone() else {
                return PinReport::default();
            };
            if now_ms > state.until_ms {
                state.target = None;
                tracing::debug!("Pin window closed");
                return PinReport::default();
            }
            let interval = self.config.teleport_interval_ticks.max(1);
            let teleport_tick = state.ticks % interval == 0;
            state.ticks = state.ticks.wrapping_add(1);
            (target, teleport_tick)
        };

        let radius_sq = self.config.radius * self.config.radius;
        let mut report = PinReport::default();
        for player in host.players() {
            let inside = player
                .location
                .distance_sq(&target)
                .is_some_and(|d| d <= radius_sq);
            if inside {
                if absorb(host.zero_velocity(&player.id)) {
                    report.steadied += 1;
                }
            } else if teleport_tick && relocate(host, &player, &target) {
                report.teleported += 1;
            }
        }
        report
    }

    /// Queue `player` for a targeted recovery pass.
    pub fn queue_recovery(&self, player: &PlayerId) {
        let mut state = lock(&self.state);
        if !state.pending_recovery.contains(player) {
            state.pending_recovery.push(player.clone());
        }
    }

    /// Queued players the host now reports as connected. They are removed
    /// from the queue; players still missing stay queued.
    pub fn take_ready(&self, host: &dyn GameHost) -> Vec<PlayerSnapshot> {
        let mut state = lock(&self.state);
        if state.pending_recovery.is_empty() {
            return Vec::new();
        }
        let mut ready = Vec::new();
        state.pending_recovery.retain(|id| match host.player(id) {
            Some(snapshot) => {
                ready.push(snapshot);
                false
            }
            None => true,
        });
        ready
    }

    pub fn pending_recovery(&self) -> Vec<PlayerId> {
        lock(&self.state).pending_recovery.clone()
    }
}

/// Teleport `player` to `target`. If the world-aware teleport fails and the
/// player is already in the target world, retry once in-world.
pub fn relocate(host: &dyn GameHost, player: &PlayerSnapshot, target: &Location) -> bool {
    match host.teleport(&player.id, target) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, player = %player.name, "Teleport failed");
            player.location.world == target.world
                && absorb(host.teleport_local(&player.id, target.x, target.y, target.z))
        }
    }
}
