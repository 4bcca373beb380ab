//! Milestone splits and personal bests.
//!
//! [`MilestoneTracker`] owns the split records of the current run. Each
//! periodic cycle it asks the host which milestones connected players have
//! reached and records the first one seen per milestone. [`BestSplits`]
//! holds the fastest time per milestone across every persisted run.

use std::collections::BTreeMap;
use std::sync::Mutex;

use splitrun_types::Milestone;

use crate::host::{GameHost, PlayerId};
use crate::ledger::{StoredBest, StoredSplit};
use crate::lock;
use crate::run::RunStateMachine;

/// First completion of a milestone in the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRecord {
    pub milestone: Milestone,
    pub player_id: PlayerId,
    pub player_name: String,
    /// Elapsed ms since run start.
    pub time_ms: i64,
    /// Best that was in effect when this split was recorded.
    pub previous_best: Option<i64>,
}

impl SplitRecord {
    /// Signed difference against the previous best, if there was one.
    pub fn delta_ms(&self) -> Option<i64> {
        self.previous_best.map(|best| self.time_ms - best)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestOrigin {
    /// Set during the run that has not been written to the ledger yet.
    CurrentRun,
    Run(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestSplit {
    pub time_ms: i64,
    pub origin: BestOrigin,
}

/// Outcome of a split beating (or setting) the best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonalBest {
    pub previous: Option<i64>,
    pub time_ms: i64,
}

impl PersonalBest {
    /// How much faster than the previous best, `None` for a first record.
    pub fn improvement_ms(&self) -> Option<i64> {
        self.previous.map(|prev| prev - self.time_ms)
    }
}

/// Best time per milestone, keyed by label.
///
/// Labels that do not map to a known [`Milestone`] are kept as loaded so
/// rewriting the ledger never drops them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestSplits {
    by_label: BTreeMap<String, BestSplit>,
}

impl BestSplits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, milestone: Milestone) -> Option<&BestSplit> {
        self.by_label.get(milestone.label())
    }

    pub fn time_ms(&self, milestone: Milestone) -> Option<i64> {
        self.get(milestone).map(|b| b.time_ms)
    }

    /// Record `time_ms` if it is strictly faster than the current best.
    /// Ties keep the existing best.
    pub fn offer(&mut self, milestone: Milestone, time_ms: i64) -> Option<PersonalBest> {
        let previous = self.time_ms(milestone);
        if previous.is_some_and(|prev| time_ms >= prev) {
            return None;
        }
        self.by_label.insert(
            milestone.label().to_string(),
            BestSplit {
                time_ms,
                origin: BestOrigin::CurrentRun,
            },
        );
        Some(PersonalBest { previous, time_ms })
    }

    /// Attribute bests set during the current run to `run_id`.
    pub fn resolve_current(&mut self, run_id: &str) {
        for best in self.by_label.values_mut() {
            if best.origin == BestOrigin::CurrentRun {
                best.origin = BestOrigin::Run(run_id.to_string());
            }
        }
    }

    pub fn from_stored(stored: &BTreeMap<String, StoredBest>) -> Self {
        let by_label = stored
            .iter()
            .map(|(label, best)| {
                let origin = match &best.run_id {
                    Some(id) => BestOrigin::Run(id.clone()),
                    None => BestOrigin::Unknown,
                };
                (
                    label.clone(),
                    BestSplit {
                        time_ms: best.time_ms,
                        origin,
                    },
                )
            })
            .collect();
        Self { by_label }
    }

    /// Fold ledger bests into these. The faster time wins per label and a
    /// tie keeps the entry already held, so bests set this run survive a
    /// late load.
    pub fn merge_stored(&mut self, stored: &BTreeMap<String, StoredBest>) {
        for (label, best) in Self::from_stored(stored).by_label {
            match self.by_label.get(&label) {
                Some(held) if held.time_ms <= best.time_ms => {}
                _ => {
                    self.by_label.insert(label, best);
                }
            }
        }
    }

    pub fn to_stored(&self) -> BTreeMap<String, StoredBest> {
        self.by_label
            .iter()
            .map(|(label, best)| {
                let run_id = match &best.origin {
                    BestOrigin::Run(id) => Some(id.clone()),
                    BestOrigin::CurrentRun | BestOrigin::Unknown => None,
                };
                (
                    label.clone(),
                    StoredBest {
                        time_ms: best.time_ms,
                        run_id,
                    },
                )
            })
            .collect()
    }
}

/// A newly recorded split plus its personal-best outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitEvent {
    pub record: SplitRecord,
    pub personal_best: Option<PersonalBest>,
}

#[derive(Debug, Default)]
pub struct MilestoneTracker {
    splits: Mutex<BTreeMap<Milestone, SplitRecord>>,
}

impl MilestoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        lock(&self.splits).clear();
    }

    pub fn get(&self, milestone: Milestone) -> Option<SplitRecord> {
        lock(&self.splits).get(&milestone).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<Milestone, SplitRecord> {
        lock(&self.splits).clone()
    }

    /// Ledger form of the current splits.
    pub fn stored(&self) -> BTreeMap<String, StoredSplit> {
        lock(&self.splits)
            .values()
            .map(|r| {
                (
                    r.milestone.label().to_string(),
                    StoredSplit {
                        time_ms: r.time_ms,
                        player: r.player_name.clone(),
                        player_uuid: r.player_id.to_string(),
                    },
                )
            })
            .collect()
    }

    /// Record every milestone some connected player has newly reached.
    ///
    /// Players are scanned in roster order, so when several complete the
    /// same milestone in one cycle the first listed wins. Stops as soon as
    /// the run is no longer live.
    pub fn check(
        &self,
        host: &dyn GameHost,
        run: &RunStateMachine,
        now_ms: i64,
        bests: &Mutex<BestSplits>,
    ) -> Vec<SplitEvent> {
        let mut events = Vec::new();
        let roster = host.players();
        if roster.is_empty() {
            return events;
        }

        for milestone in Milestone::ALL {
            if lock(&self.splits).contains_key(&milestone) {
                continue;
            }
            let achievement = milestone.achievement_id();
            if !host.achievement_exists(achievement) {
                continue;
            }
            let Some(player) = roster
                .iter()
                .find(|p| host.has_achievement(&p.id, achievement))
            else {
                continue;
            };

            let recorded = run.with_running(|snapshot| {
                let mut splits = lock(&self.splits);
                if splits.contains_key(&milestone) {
                    return None;
                }
                let time_ms = snapshot.elapsed_ms(now_ms);
                let mut bests = lock(bests);
                let previous_best = bests.time_ms(milestone);
                let personal_best = bests.offer(milestone, time_ms);
                let record = SplitRecord {
                    milestone,
                    player_id: player.id.clone(),
                    player_name: player.name.clone(),
                    time_ms,
                    previous_best,
                };
                splits.insert(milestone, record.clone());
                Some(SplitEvent {
                    record,
                    personal_best,
                })
            });

            match recorded {
                None => break,
                Some(None) => continue,
                Some(Some(event)) => {
                    tracing::info!(
                        milestone = %milestone,
                        player = %event.record.player_name,
                        time_ms = event.record.time_ms,
                        pb = event.personal_best.is_some(),
                        "Split recorded"
                    );
                    events.push(event);
                }
            }
        }
        events
    }
}
