//! Run lifecycle coordinator.
//!
//! One [`Coordinator`] per process owns every piece of run state and is
//! shared by reference with the host's event callbacks. Callbacks may fire
//! concurrently with each other and with the tick driver; each component
//! guards its own state and the run state machine arbitrates terminal
//! transitions.
//!
//! Lock order, where locks nest: run phase, then splits, then bests. No
//! lock is held across a host effector call except inside the renderer's
//! own cache.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use splitrun_types::{Milestone, SplitrunConfig, StyledText};

use crate::clock::Clock;
use crate::config::resolve_ledger_path;
use crate::damage::{DamageAggregator, DamageVerdict, LeaderboardEntry};
use crate::display::{DisplayLine, DisplayRenderer, build_lines};
use crate::error::absorb;
use crate::host::{DamageSource, GameHost, PlayerSnapshot, RespawnCapability, respawn_capability};
use crate::ledger::{Ledger, LedgerEntry};
use crate::lock;
use crate::messages;
use crate::pin::{PinController, relocate};
use crate::run::{FailureSite, RunPhase, RunSnapshot, RunStateMachine};
use crate::splits::{BestSplits, MilestoneTracker, SplitEvent, SplitRecord};

pub struct Coordinator<H: GameHost> {
    host: H,
    clock: Arc<dyn Clock>,
    config: SplitrunConfig,
    ledger: Ledger,
    ledger_loaded: AtomicBool,
    bests: Mutex<BestSplits>,
    run: RunStateMachine,
    splits: MilestoneTracker,
    damage: DamageAggregator,
    pin: PinController,
    display: DisplayRenderer,
    respawn: Box<dyn RespawnCapability>,
    ticks: AtomicU32,
}

impl<H: GameHost> Coordinator<H> {
    pub fn new(host: H, clock: Arc<dyn Clock>, config: SplitrunConfig) -> Self {
        let ledger = Ledger::new(resolve_ledger_path(&config));
        let respawn = respawn_capability(config.respawn);
        tracing::debug!(
            ledger = %ledger.path().display(),
            respawn = respawn.name(),
            "Coordinator created"
        );
        Self {
            host,
            clock,
            ledger,
            ledger_loaded: AtomicBool::new(false),
            bests: Mutex::new(BestSplits::new()),
            run: RunStateMachine::new(),
            splits: MilestoneTracker::new(),
            damage: DamageAggregator::new(config.damage.clone()),
            pin: PinController::new(config.pin.clone()),
            display: DisplayRenderer::new(config.display.clone()),
            respawn,
            ticks: AtomicU32::new(0),
            config,
        }
    }

    // --- Event handlers ---

    /// A player connected. Starts a run if none exists.
    pub fn on_player_join(&self, player: &PlayerSnapshot) {
        self.damage.remember_name(&player.id, &player.name);
        self.ensure_ledger_loaded();
        absorb(self.host.enable_immediate_respawn());
        self.start_new_run();
        self.render();
    }

    /// One game tick. Runs recovery and pin enforcement every tick and the
    /// periodic cycle every `periodic_interval_ticks`.
    pub fn on_tick(&self) {
        let now = self.clock.now_ms();
        self.process_recoveries();

        if self.run.phase() == RunPhase::Failed {
            self.pin.enforce(&self.host, now);
        }

        let interval = self.config.periodic_interval_ticks.max(1);
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        if tick % interval == 0 {
            self.periodic();
        }
    }

    /// Elapsed readout, milestone checks and a sidebar refresh.
    pub fn periodic(&self) {
        let now = self.clock.now_ms();
        let snapshot = self.run.snapshot();
        if snapshot.phase == RunPhase::NotStarted {
            return;
        }

        let readout = messages::action_bar(snapshot.phase, snapshot.elapsed_ms(now));
        for player in self.host.players() {
            absorb(self.host.send_action_bar(&player.id, &readout));
        }

        if snapshot.phase == RunPhase::Running {
            let events = self.splits.check(&self.host, &self.run, now, &self.bests);
            for event in events {
                self.announce_split(&event);
                if event.record.milestone.is_terminal() {
                    self.complete_run(now, &event.record.player_name);
                }
            }
        }

        self.render();
    }

    /// Damage about to be applied to `player`. Ignored unless a run is live.
    pub fn on_damage(&self, player: &PlayerSnapshot, source: &DamageSource, amount: f32) {
        if !self.run.is_running() {
            return;
        }
        self.damage.remember_name(&player.id, &player.name);
        let now = self.clock.now_ms();
        if let DamageVerdict::Counted { log: true } =
            self.damage.record(&player.id, source, amount, now)
        {
            self.broadcast(&messages::damage_line(player, source, amount));
        }
    }

    /// `player` died. The first qualifying death of a live run fails it.
    /// Returns true for the death that ended the run.
    pub fn on_death(&self, player: &PlayerSnapshot, source: &DamageSource) -> bool {
        if self.damage.is_excluded(source) {
            tracing::debug!(player = %player.name, kind = %source.kind, "Excluded death ignored");
            return false;
        }

        let site = FailureSite {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            location: player.location.clone(),
            cause: source.describe_cause(),
            damage_type: source.kind.clone(),
        };
        let now = self.clock.now_ms();
        match self.run.fail(now, site) {
            Some(snapshot) => {
                self.handle_failure(&snapshot, now);
                true
            }
            None => false,
        }
    }

    // --- Run control ---

    /// Start a run if none exists. Per-run data is cleared atomically with
    /// the new start time.
    pub fn start_new_run(&self) -> bool {
        let now = self.clock.now_ms();
        self.run.start_with(now, || {
            self.splits.clear();
            self.damage.reset();
            self.pin.clear();
        })
    }

    /// Return to NotStarted so the next join starts a fresh run. A live run
    /// is only reset when `force` is set.
    pub fn reset_run(&self, force: bool) -> bool {
        if !self.run.reset(force) {
            return false;
        }
        self.pin.clear();
        self.render();
        true
    }

    // --- Accessors ---

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &SplitrunConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn phase(&self) -> RunPhase {
        self.run.phase()
    }

    pub fn run_snapshot(&self) -> RunSnapshot {
        self.run.snapshot()
    }

    pub fn splits(&self) -> BTreeMap<Milestone, SplitRecord> {
        self.splits.snapshot()
    }

    pub fn best_splits(&self) -> BestSplits {
        lock(&self.bests).clone()
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.damage.leaderboard()
    }

    pub fn rendered_lines(&self) -> BTreeMap<i32, DisplayLine> {
        self.display.rendered()
    }

    // --- Internals ---

    fn broadcast(&self, message: &StyledText) {
        absorb(self.host.broadcast(message));
    }

    /// Load bests from the ledger once per process. A failed load is
    /// retried on the next call; a retry that lands mid-run merges into
    /// the bests already held rather than replacing them.
    fn ensure_ledger_loaded(&self) {
        if self
            .ledger_loaded
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        match self.ledger.load() {
            Ok(file) => {
                lock(&self.bests).merge_stored(&file.best_splits);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load ledger");
                self.broadcast(&messages::load_failed_notice(&e));
                self.ledger_loaded.store(false, Ordering::SeqCst);
            }
        }
    }

    fn announce_split(&self, event: &SplitEvent) {
        self.broadcast(&messages::split(&event.record));
        if let Some(pb) = &event.personal_best {
            self.broadcast(&messages::personal_best(&event.record, pb));
        }
    }

    fn complete_run(&self, now: i64, winner: &str) {
        let Some(snapshot) = self.run.complete(now, winner) else {
            return;
        };
        self.pin.clear();
        for line in messages::completed_banner(snapshot.elapsed_ms(now), winner) {
            self.broadcast(&line);
        }
        self.broadcast_leaderboard();
        self.persist(&snapshot);
        self.render();
    }

    fn handle_failure(&self, snapshot: &RunSnapshot, now: i64) {
        let Some(site) = &snapshot.failure else {
            return;
        };
        absorb(self.host.enable_immediate_respawn());

        self.pin
            .activate(site.location.clone(), snapshot.end_ms.unwrap_or(now));
        self.pin.queue_recovery(&site.player_id);

        let anchor = site.location.relocation_anchor();
        for player in self.host.players() {
            absorb(self.host.set_spectator(&player.id));
            relocate(&self.host, &player, &anchor);
        }

        for line in messages::failed_banner(site) {
            self.broadcast(&line);
        }
        self.broadcast_leaderboard();
        self.persist(snapshot);
        self.render();
    }

    /// Second, player-targeted pass for players queued at failure time.
    fn process_recoveries(&self) {
        for player in self.pin.take_ready(&self.host) {
            absorb(self.respawn.respawn(&self.host, &player.id));
            if self.run.phase() != RunPhase::Failed {
                continue;
            }
            absorb(self.host.set_spectator(&player.id));
            if let Some(site) = self.run.snapshot().failure {
                relocate(&self.host, &player, &site.location.relocation_anchor());
            }
            tracing::debug!(player = %player.name, "Targeted recovery applied");
        }
    }

    fn broadcast_leaderboard(&self) {
        for line in messages::leaderboard(&self.damage.leaderboard()) {
            self.broadcast(&line);
        }
    }

    /// Append the finished run to the ledger. Failures are reported, never
    /// fatal; in-memory bests stay authoritative.
    fn persist(&self, snapshot: &RunSnapshot) {
        let (Some(run_id), Some(end_ms), Some(reason)) = (
            snapshot.run_id(),
            snapshot.end_ms,
            snapshot.phase.end_reason(),
        ) else {
            return;
        };

        let entry = LedgerEntry {
            run_id: run_id.clone(),
            start_ms: snapshot.start_ms,
            end_ms,
            duration_ms: (end_ms - snapshot.start_ms).max(0),
            failed: snapshot.phase == RunPhase::Failed,
            completed: snapshot.phase == RunPhase::Completed,
            end_reason: reason.to_string(),
            end_player: snapshot.ended_by.clone(),
            splits: self.splits.stored(),
        };
        let stored_bests = {
            let mut bests = lock(&self.bests);
            bests.resolve_current(&run_id);
            bests.to_stored()
        };

        match self.ledger.append(&entry, stored_bests) {
            Ok(()) => {
                tracing::info!(run_id = %run_id, reason, "Run saved");
                self.broadcast(&messages::saved_notice(&run_id));
            }
            Err(e) => {
                tracing::warn!(error = %e, run_id = %run_id, "Failed to save run");
                self.broadcast(&messages::save_failed_notice(&e));
            }
        }
    }

    fn render(&self) {
        let phase = self.run.phase();
        let splits = self.splits.snapshot();
        let desired = {
            let bests = lock(&self.bests);
            build_lines(self.display.config(), phase, &splits, &bests)
        };
        self.display.render(&self.host, desired);
    }
}
