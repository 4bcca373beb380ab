//! Bringing a dead player back from the death screen.
//!
//! Two implementations, picked from [`RespawnMode`] at construction time:
//!
//! - [`ServerRespawn`] (preferred): asks the host to respawn the player
//!   server-side so the follow-up observer/relocation pass reaches a live
//!   client.
//! - [`ManualRespawn`] (degraded): for hosts that cannot force a respawn.
//!   Nothing is sent; the player leaves the death screen themselves and the
//!   targeted observer pass still runs once they are reported connected.

use splitrun_types::RespawnMode;

use super::{GameHost, PlayerId};
use crate::error::EffectResult;

pub trait RespawnCapability: Send + Sync {
    fn name(&self) -> &'static str;

    fn respawn(&self, host: &dyn GameHost, player: &PlayerId) -> EffectResult;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ServerRespawn;

impl RespawnCapability for ServerRespawn {
    fn name(&self) -> &'static str {
        "server"
    }

    fn respawn(&self, host: &dyn GameHost, player: &PlayerId) -> EffectResult {
        host.force_respawn(player)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ManualRespawn;

impl RespawnCapability for ManualRespawn {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn respawn(&self, _host: &dyn GameHost, player: &PlayerId) -> EffectResult {
        tracing::debug!(player = %player, "Manual respawn mode, waiting for the client");
        Ok(())
    }
}

pub fn respawn_capability(mode: RespawnMode) -> Box<dyn RespawnCapability> {
    match mode {
        RespawnMode::Server => Box::new(ServerRespawn),
        RespawnMode::Manual => Box::new(ManualRespawn),
    }
}
