//! Per-player damage tallies with throttled log lines.
//!
//! Every counted hit goes into the running total. Only the human readable
//! log line is rate limited, per (player, damage type), with a longer
//! cooldown for damage-over-time sources that tick many times a second.

use std::sync::Mutex;

use hashbrown::HashMap;
use splitrun_types::DamageConfig;
use splitrun_types::formatting::short_id;

use crate::host::{DamageSource, PlayerId};
use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageVerdict {
    /// Source is excluded; nothing recorded.
    Excluded,
    /// Added to the tally. `log` is true when the cooldown allows a log line.
    Counted { log: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub total: f32,
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    total: f32,
    /// Order of this player's first counted hit in the run.
    order: u64,
}

#[derive(Debug, Default)]
struct DamageState {
    last_logged: HashMap<(PlayerId, String), i64>,
    totals: HashMap<PlayerId, Tally>,
    /// Survives resets so disconnected players keep their name.
    names: HashMap<PlayerId, String>,
    next_order: u64,
}

#[derive(Debug)]
pub struct DamageAggregator {
    config: DamageConfig,
    state: Mutex<DamageState>,
}

impl DamageAggregator {
    pub fn new(config: DamageConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DamageState::default()),
        }
    }

    pub fn is_excluded(&self, source: &DamageSource) -> bool {
        self.config
            .excluded_sources
            .iter()
            .any(|s| source.kind_matches(s))
    }

    pub fn cooldown_for(&self, source: &DamageSource) -> i64 {
        if self.config.dot_sources.iter().any(|s| source.kind_matches(s)) {
            self.config.dot_cooldown_ms
        } else {
            self.config.default_cooldown_ms
        }
    }

    pub fn remember_name(&self, player: &PlayerId, name: &str) {
        lock(&self.state)
            .names
            .insert(player.clone(), name.to_string());
    }

    /// Count one hit. The caller gates on the run being live.
    pub fn record(
        &self,
        player: &PlayerId,
        source: &DamageSource,
        amount: f32,
        now_ms: i64,
    ) -> DamageVerdict {
        if self.is_excluded(source) {
            return DamageVerdict::Excluded;
        }
        let cooldown = self.cooldown_for(source);

        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let order = state.next_order;
        let tally = state.totals.entry(player.clone()).or_insert(Tally {
            total: 0.0,
            order,
        });
        tally.total += amount.max(0.0);
        if tally.order == order {
            state.next_order += 1;
        }

        let key = (player.clone(), source.kind.clone());
        let log = match state.last_logged.get(&key) {
            Some(&last) if now_ms - last < cooldown => false,
            _ => {
                state.last_logged.insert(key, now_ms);
                true
            }
        };
        DamageVerdict::Counted { log }
    }

    pub fn total_for(&self, player: &PlayerId) -> f32 {
        lock(&self.state)
            .totals
            .get(player)
            .map_or(0.0, |t| t.total)
    }

    /// Clear totals and cooldowns for a new run. Names are kept.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.totals.clear();
        state.last_logged.clear();
        state.next_order = 0;
    }

    /// Top players by total damage taken. Equal totals rank by who was hit first.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let state = lock(&self.state);
        let mut rows: Vec<_> = state.totals.iter().collect();
        rows.sort_by(|(_, a), (_, b)| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.order.cmp(&b.order))
        });

        rows.into_iter()
            .take(self.config.leaderboard_size)
            .enumerate()
            .map(|(i, (id, tally))| LeaderboardEntry {
                rank: i + 1,
                player_id: id.clone(),
                name: state
                    .names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| short_id(id.as_str())),
                total: tally.total,
            })
            .collect()
    }
}
