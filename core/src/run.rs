//! Run state machine.
//!
//! Phases only move forward within a run:
//! - NotStarted: no run exists, the next qualifying join starts one
//! - Running: timer live, splits and damage accumulate
//! - Failed / Completed: terminal, timer frozen at `end_ms`
//!
//! The only way back to NotStarted is an explicit [`RunStateMachine::reset`].

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::host::{Location, PlayerId};
use crate::ledger::LedgerEntry;
use crate::lock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    #[default]
    NotStarted,
    Running,
    Failed,
    Completed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Failed | RunPhase::Completed)
    }

    /// Ledger `endReason` for terminal phases.
    pub fn end_reason(self) -> Option<&'static str> {
        match self {
            RunPhase::Failed => Some("FAILED"),
            RunPhase::Completed => Some("COMPLETED"),
            _ => None,
        }
    }
}

/// Where and how the run-ending death happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSite {
    pub player_id: PlayerId,
    pub player_name: String,
    pub location: Location,
    /// Human readable cause (attacker or projectile description).
    pub cause: String,
    /// Raw damage type name.
    pub damage_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub phase: RunPhase,
    pub start_ms: i64,
    pub end_ms: Option<i64>,
    pub failure: Option<FailureSite>,
    /// Dead player (failed) or winner (completed).
    pub ended_by: Option<String>,
}

impl RunSnapshot {
    /// Elapsed run time, frozen once terminal and never negative.
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        match (self.phase, self.end_ms) {
            (RunPhase::NotStarted, _) => 0,
            (RunPhase::Running, _) | (_, None) => (now_ms - self.start_ms).max(0),
            (_, Some(end)) => (end - self.start_ms).max(0),
        }
    }

    /// `run-<start>-<end>` once the run has ended.
    pub fn run_id(&self) -> Option<String> {
        self.end_ms
            .map(|end| LedgerEntry::run_id_for(self.start_ms, end))
    }
}

#[derive(Debug, Default)]
pub struct RunStateMachine {
    state: Mutex<RunSnapshot>,
    /// Set by the single winner of a terminal transition.
    terminal_claimed: AtomicBool,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RunPhase {
        lock(&self.state).phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == RunPhase::Running
    }

    pub fn snapshot(&self) -> RunSnapshot {
        lock(&self.state).clone()
    }

    /// Start a run at `now_ms` if none exists.
    ///
    /// `clear_run_data` runs while the phase lock is held so per-run data
    /// is wiped in the same critical section that resets `start_ms`.
    pub fn start_with(&self, now_ms: i64, clear_run_data: impl FnOnce()) -> bool {
        let mut state = lock(&self.state);
        if state.phase != RunPhase::NotStarted {
            return false;
        }
        clear_run_data();
        *state = RunSnapshot {
            phase: RunPhase::Running,
            start_ms: now_ms,
            ..RunSnapshot::default()
        };
        self.terminal_claimed.store(false, Ordering::SeqCst);
        tracing::info!(start_ms = now_ms, "[RUN] started");
        true
    }

    /// Run `f` only while the run is live, holding the phase lock so no
    /// terminal transition can interleave.
    pub fn with_running<R>(&self, f: impl FnOnce(&RunSnapshot) -> R) -> Option<R> {
        let state = lock(&self.state);
        (state.phase == RunPhase::Running).then(|| f(&state))
    }

    /// Transition to Failed. Returns the final snapshot for the one caller
    /// that wins; every other caller gets `None`.
    pub fn fail(&self, now_ms: i64, site: FailureSite) -> Option<RunSnapshot> {
        let mut state = lock(&self.state);
        if !self.claim_terminal(&state, "fail") {
            return None;
        }
        state.phase = RunPhase::Failed;
        state.end_ms = Some(now_ms);
        state.ended_by = Some(site.player_name.clone());
        tracing::info!(
            player = %site.player_name,
            cause = %site.cause,
            world = %site.location.world,
            "[RUN] failed"
        );
        state.failure = Some(site);
        Some(state.clone())
    }

    /// Transition to Completed. Same exactly-once contract as [`Self::fail`].
    pub fn complete(&self, now_ms: i64, winner: &str) -> Option<RunSnapshot> {
        let mut state = lock(&self.state);
        if !self.claim_terminal(&state, "complete") {
            return None;
        }
        state.phase = RunPhase::Completed;
        state.end_ms = Some(now_ms);
        state.ended_by = Some(winner.to_string());
        tracing::info!(winner = %winner, elapsed_ms = state.elapsed_ms(now_ms), "[RUN] completed");
        Some(state.clone())
    }

    /// Return to NotStarted. Only a terminal run is reset unless `force`.
    pub fn reset(&self, force: bool) -> bool {
        let mut state = lock(&self.state);
        let allowed = match state.phase {
            RunPhase::NotStarted => false,
            RunPhase::Running => force,
            RunPhase::Failed | RunPhase::Completed => true,
        };
        if allowed {
            *state = RunSnapshot::default();
            self.terminal_claimed.store(false, Ordering::SeqCst);
            tracing::info!(force, "[RUN] reset");
        }
        allowed
    }

    fn claim_terminal(&self, state: &RunSnapshot, trigger: &str) -> bool {
        if state.phase != RunPhase::Running {
            tracing::debug!(trigger, phase = ?state.phase, "Terminal trigger ignored");
            return false;
        }
        let claimed = self
            .terminal_claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !claimed {
            tracing::debug!(trigger, "Terminal transition already claimed");
        }
        claimed
    }
}
