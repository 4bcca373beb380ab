//! Fixed, ordered set of run checkpoints.

use serde::{Deserialize, Serialize};

/// A checkpoint in the run's progression, bound to a host achievement.
///
/// Variants are declared in run order; [`Milestone::ALL`] preserves that
/// order and the sidebar renders earliest milestones in the highest slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Milestone {
    Iron,
    Nether,
    Fortress,
    BlazeRod,
    End,
    Dragon,
}

impl Milestone {
    pub const ALL: [Milestone; 6] = [
        Milestone::Iron,
        Milestone::Nether,
        Milestone::Fortress,
        Milestone::BlazeRod,
        Milestone::End,
        Milestone::Dragon,
    ];

    /// Short label used in chat, on the sidebar and as the ledger key.
    pub const fn label(self) -> &'static str {
        match self {
            Milestone::Iron => "IRON",
            Milestone::Nether => "NETHER",
            Milestone::Fortress => "FORT",
            Milestone::BlazeRod => "BLAZE",
            Milestone::End => "END",
            Milestone::Dragon => "DRAGON",
        }
    }

    /// Host achievement whose completion marks this milestone.
    pub const fn achievement_id(self) -> &'static str {
        match self {
            Milestone::Iron => "minecraft:story/smelt_iron",
            Milestone::Nether => "minecraft:story/enter_the_nether",
            Milestone::Fortress => "minecraft:nether/find_fortress",
            Milestone::BlazeRod => "minecraft:nether/obtain_blaze_rod",
            Milestone::End => "minecraft:story/enter_the_end",
            Milestone::Dragon => "minecraft:end/kill_dragon",
        }
    }

    /// Reaching the terminal milestone completes the run.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Milestone::Dragon)
    }
}

impl std::fmt::Display for Milestone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
