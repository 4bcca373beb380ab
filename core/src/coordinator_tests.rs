//! Scenario tests for the coordinator
//!
//! Drives whole runs against the in-memory host: split/PB announcements
//! across runs, exactly-once failure under contention, pin and recovery,
//! ledger persistence across restarts.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::clock::ManualClock;
use crate::coordinator::Coordinator;
use crate::host::memory::{HostCall, MemoryHost};
use crate::host::{DamageSource, Location, PlayerId, PlayerSnapshot};
use crate::ledger::Ledger;
use crate::run::RunPhase;
use splitrun_types::{Milestone, RespawnMode, SplitrunConfig};

const OVERWORLD: &str = "minecraft:overworld";

static LEDGER_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_ledger() -> PathBuf {
    let n = LEDGER_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "splitrun-coordinator-test-{}-{}",
        std::process::id(),
        n
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("runs.json")
}

fn player(id: &str, name: &str) -> PlayerSnapshot {
    PlayerSnapshot {
        id: PlayerId::new(id),
        name: name.to_string(),
        location: Location::new(OVERWORLD, 0.5, 64.0, 0.5),
        health: 20.0,
        max_health: 20.0,
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    coordinator: Coordinator<MemoryHost>,
    ledger_path: PathBuf,
}

fn harness_with(ledger_path: PathBuf, configure: impl FnOnce(&mut SplitrunConfig)) -> Harness {
    let mut config = SplitrunConfig {
        ledger_path: Some(ledger_path.clone()),
        ..SplitrunConfig::default()
    };
    configure(&mut config);
    let clock = Arc::new(ManualClock::new(0));
    let coordinator = Coordinator::new(MemoryHost::new(), clock.clone(), config);
    Harness {
        clock,
        coordinator,
        ledger_path,
    }
}

fn harness() -> Harness {
    harness_with(temp_ledger(), |_| {})
}

impl Harness {
    fn host(&self) -> &MemoryHost {
        self.coordinator.host()
    }

    fn join(&self, p: &PlayerSnapshot) {
        self.host().join(p.clone());
        self.coordinator.on_player_join(p);
    }

    fn broadcasts(&self) -> Vec<String> {
        self.host()
            .take_calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Broadcast(text) => Some(text.plain()),
                _ => None,
            })
            .collect()
    }

    /// Fail the live run, reset it and start a new one at `start_ms`.
    fn next_run(&self, p: &PlayerSnapshot, start_ms: i64) {
        self.clock.advance(1_000);
        self.coordinator.on_death(p, &DamageSource::new("lava"));
        assert!(self.coordinator.reset_run(false));
        self.host().revoke_all();
        self.clock.set(start_ms);
        self.coordinator.on_player_join(p);
        assert_eq!(self.coordinator.run_snapshot().start_ms, start_ms);
        self.host().take_calls();
    }
}

#[test]
fn test_join_starts_run_once() {
    let h = harness();
    h.clock.set(5_000);
    h.join(&player("a", "Alex"));
    h.clock.set(6_000);
    h.join(&player("b", "Steve"));

    let snap = h.coordinator.run_snapshot();
    assert_eq!(snap.phase, RunPhase::Running);
    assert_eq!(snap.start_ms, 5_000);
    assert!(h.host().calls().contains(&HostCall::ImmediateRespawn));
    assert!(h.ledger_path.exists());
}

#[test]
fn test_split_deltas_and_personal_bests_across_runs() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    h.host().take_calls();

    h.clock.set(120_000);
    h.host().grant(&alex.id, Milestone::Iron.achievement_id());
    h.coordinator.periodic();
    let out = h.broadcasts();
    assert!(out.contains(&"⏱ SPLIT IRON: 00:02:00 (first record) — Alex".to_string()));
    assert!(out.contains(&"🏁 NEW PB IRON: 00:02:00 (first record) — Alex".to_string()));

    h.next_run(&alex, 1_000_000);
    h.clock.set(1_090_000);
    h.host().grant(&alex.id, Milestone::Iron.achievement_id());
    h.coordinator.periodic();
    let out = h.broadcasts();
    assert!(out.contains(&"⏱ SPLIT IRON: 00:01:30 (-00:00:30) — Alex".to_string()));
    assert!(out.contains(&"🏁 NEW PB IRON: 00:01:30 (-00:00:30) — Alex".to_string()));

    h.next_run(&alex, 2_000_000);
    h.clock.set(2_095_000);
    h.host().grant(&alex.id, Milestone::Iron.achievement_id());
    h.coordinator.periodic();
    let out = h.broadcasts();
    assert!(out.contains(&"⏱ SPLIT IRON: 00:01:35 (+00:00:05) — Alex".to_string()));
    assert!(!out.iter().any(|l| l.contains("NEW PB")));
    assert_eq!(h.coordinator.best_splits().time_ms(Milestone::Iron), Some(90_000));
}

#[test]
fn test_bests_survive_restart() {
    let path = temp_ledger();
    let alex = player("a", "Alex");
    {
        let h = harness_with(path.clone(), |_| {});
        h.join(&alex);
        h.clock.set(75_000);
        h.host().grant(&alex.id, Milestone::Iron.achievement_id());
        h.coordinator.periodic();
        h.clock.set(80_000);
        assert!(h.coordinator.on_death(&alex, &DamageSource::new("fall")));
    }

    let h = harness_with(path.clone(), |_| {});
    h.join(&alex);
    assert_eq!(h.coordinator.best_splits().time_ms(Milestone::Iron), Some(75_000));

    let file = Ledger::new(&path).read().unwrap().unwrap();
    assert_eq!(file.runs.len(), 1);
    let run = &file.runs[0];
    assert_eq!(run.run_id, "run-0-80000");
    assert!(run.failed && !run.completed);
    assert_eq!(run.end_reason, "FAILED");
    assert_eq!(run.end_player.as_deref(), Some("Alex"));
    assert_eq!(run.splits["IRON"].time_ms, 75_000);
    assert_eq!(file.best_splits["IRON"].run_id.as_deref(), Some("run-0-80000"));
}

#[test]
fn test_concurrent_deaths_fail_once() {
    let h = harness();
    let players: Vec<_> = (0..8)
        .map(|i| player(&format!("p{}", i), &format!("Player{}", i)))
        .collect();
    for p in &players {
        h.join(p);
    }
    h.host().take_calls();

    let winners: usize = std::thread::scope(|s| {
        let handles: Vec<_> = players
            .iter()
            .map(|p| {
                let coordinator = &h.coordinator;
                s.spawn(move || coordinator.on_death(p, &DamageSource::new("mob")))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count()
    });

    assert_eq!(winners, 1);
    assert_eq!(h.coordinator.phase(), RunPhase::Failed);
    let out = h.broadcasts();
    assert_eq!(out.iter().filter(|l| *l == "RUN FAILED").count(), 1);
    assert_eq!(Ledger::new(&h.ledger_path).read().unwrap().unwrap().runs.len(), 1);

    let snap = h.coordinator.run_snapshot();
    let failure = snap.failure.unwrap();
    assert_eq!(snap.ended_by.as_deref(), Some(failure.player_name.as_str()));
}

#[test]
fn test_failure_forces_spectator_and_relocates() {
    let h = harness();
    let alex = player("a", "Alex");
    let steve = player("b", "Steve");
    h.join(&alex);
    h.join(&steve);
    h.host()
        .move_to(&steve.id, Location::new("minecraft:the_nether", 40.0, 70.0, 40.0));

    let mut dead = alex.clone();
    dead.location = Location::new(OVERWORLD, 10.7, 63.9, -2.2);
    h.clock.set(30_000);
    assert!(h.coordinator.on_death(&dead, &DamageSource::new("lava")));

    assert!(h.host().is_spectator(&alex.id));
    assert!(h.host().is_spectator(&steve.id));
    let anchor = Location::new(OVERWORLD, 10.0, 64.0, -3.0);
    assert!(h.host().calls().contains(&HostCall::Teleport {
        player: steve.id.clone(),
        target: anchor,
    }));
    let out = h.broadcasts();
    assert!(out.contains(&"💀 DEATH: Alex @ 10 63 -3 in minecraft:overworld — cause: lava (lava)".to_string()));
    assert!(out.iter().any(|l| l.starts_with("[Splits] Saved run run-0-30000")));
}

#[test]
fn test_pin_holds_players_for_window() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    h.clock.set(10_000);
    h.coordinator.on_death(&alex, &DamageSource::new("mob"));
    // first tick runs the targeted recovery pass
    h.coordinator.on_tick();
    h.host().take_calls();

    let away = Location::new(OVERWORLD, 50.0, 64.0, 50.0);
    h.host().move_to(&alex.id, away.clone());
    h.clock.set(12_000);
    h.coordinator.on_tick();
    h.coordinator.on_tick();
    let teleports = h
        .host()
        .take_calls()
        .into_iter()
        .filter(|c| matches!(c, HostCall::Teleport { .. }))
        .count();
    assert_eq!(teleports, 1);

    // back inside the radius: velocity zeroed instead
    h.coordinator.on_tick();
    assert!(h.host().take_calls().contains(&HostCall::ZeroVelocity(alex.id.clone())));

    // the window runs through failure + 5000 ms inclusive
    h.host().move_to(&alex.id, away);
    h.clock.set(15_001);
    h.coordinator.on_tick();
    h.coordinator.on_tick();
    let calls = h.host().take_calls();
    assert!(!calls.iter().any(|c| matches!(c, HostCall::Teleport { .. } | HostCall::ZeroVelocity(_))));
}

#[test]
fn test_dead_player_recovered_once_reconnected() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    h.host().leave(&alex.id);
    h.clock.set(5_000);
    h.coordinator.on_death(&alex, &DamageSource::new("mob"));
    h.host().take_calls();

    h.coordinator.on_tick();
    assert!(!h.host().calls().iter().any(|c| matches!(c, HostCall::ForceRespawn(_))));

    h.host().join(alex.clone());
    h.coordinator.on_tick();
    let calls = h.host().take_calls();
    assert_eq!(calls.first(), Some(&HostCall::ForceRespawn(alex.id.clone())));
    assert!(calls.contains(&HostCall::Spectator(alex.id.clone())));

    h.coordinator.on_tick();
    assert!(!h.host().take_calls().iter().any(|c| matches!(c, HostCall::ForceRespawn(_))));
}

#[test]
fn test_manual_respawn_sends_no_force_respawn() {
    let h = harness_with(temp_ledger(), |c| c.respawn = RespawnMode::Manual);
    let alex = player("a", "Alex");
    h.join(&alex);
    h.coordinator.on_death(&alex, &DamageSource::new("mob"));
    h.coordinator.on_tick();
    assert!(!h.host().calls().iter().any(|c| matches!(c, HostCall::ForceRespawn(_))));
    assert!(h.host().is_spectator(&alex.id));
}

#[test]
fn test_generic_kill_never_fails_run() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    assert!(!h.coordinator.on_death(&alex, &DamageSource::new("genericKill")));
    assert_eq!(h.coordinator.phase(), RunPhase::Running);
}

#[test]
fn test_dragon_completes_run_and_blocks_death() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    for m in Milestone::ALL {
        h.host().grant(&alex.id, m.achievement_id());
    }
    h.clock.set(3_600_000);
    h.coordinator.periodic();

    assert_eq!(h.coordinator.phase(), RunPhase::Completed);
    assert_eq!(h.coordinator.splits().len(), Milestone::ALL.len());
    let out = h.broadcasts();
    assert!(out.contains(&"🏆 RUN COMPLETED! Time: 01:00:00 — by Alex".to_string()));

    assert!(!h.coordinator.on_death(&alex, &DamageSource::new("lava")));
    assert_eq!(h.coordinator.phase(), RunPhase::Completed);

    let file = Ledger::new(&h.ledger_path).read().unwrap().unwrap();
    assert_eq!(file.runs[0].end_reason, "COMPLETED");
    assert_eq!(file.runs[0].splits.len(), Milestone::ALL.len());
}

#[test]
fn test_damage_logging_and_leaderboard() {
    let h = harness();
    let alex = player("a", "Alex");
    let steve = player("b", "Steve");
    h.join(&alex);
    h.join(&steve);
    h.host().take_calls();

    let zombie = DamageSource::new("mob");
    h.clock.set(1_000);
    h.coordinator.on_damage(&alex, &zombie, 2.0);
    h.clock.set(1_200);
    h.coordinator.on_damage(&alex, &zombie, 3.0);
    let fire = DamageSource::new("onFire");
    for i in 0..7 {
        h.clock.set(2_000 + i * 500);
        h.coordinator.on_damage(&steve, &fire, 1.0);
    }

    let out = h.broadcasts();
    assert_eq!(out.iter().filter(|l| l.starts_with("[Damage] Alex")).count(), 1);
    assert_eq!(out.iter().filter(|l| l.starts_with("[Damage] Steve")).count(), 3);

    h.host().leave(&alex.id);
    h.coordinator.on_death(&steve, &DamageSource::new("onFire"));
    let board = h.coordinator.leaderboard();
    assert_eq!(board[0].name, "Steve");
    assert_eq!(board[0].total, 7.0);
    assert_eq!(board[1].name, "Alex");
    assert_eq!(board[1].total, 5.0);
    assert!(h.broadcasts().contains(&"#2 Alex — 5.0 ♥".to_string()));
}

#[test]
fn test_damage_ignored_outside_live_run() {
    let h = harness();
    let alex = player("a", "Alex");
    h.coordinator.on_damage(&alex, &DamageSource::new("mob"), 5.0);
    assert!(h.coordinator.leaderboard().is_empty());
    assert!(h.host().calls().is_empty());
}

#[test]
fn test_sidebar_tracks_run_state() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    let lines = h.coordinator.rendered_lines();
    assert_eq!(lines[&15].text.plain(), "IRON --:--:--");
    assert_eq!(h.host().sidebar().len(), Milestone::ALL.len());

    h.clock.set(61_000);
    h.host().grant(&alex.id, Milestone::Iron.achievement_id());
    h.coordinator.periodic();
    assert_eq!(h.coordinator.rendered_lines()[&15].text.plain(), "IRON 00:01:01");

    h.coordinator.on_death(&alex, &DamageSource::new("mob"));
    let lines = h.coordinator.rendered_lines();
    assert_eq!(lines[&15].text.plain(), "FAILED");
    assert_eq!(lines[&14].text.plain(), "IRON 00:01:01");
    assert_eq!(h.host().sidebar().len(), Milestone::ALL.len() + 1);

    // unchanged state: no sidebar traffic
    h.host().take_calls();
    h.coordinator.periodic();
    assert!(!h.host().calls().iter().any(|c| matches!(
        c,
        HostCall::SetLine { .. } | HostCall::RemoveLine { .. }
    )));
    assert_eq!(
        h.host().calls().iter().filter(|c| matches!(c, HostCall::EnsureObjective { .. })).count(),
        0
    );
}

#[test]
fn test_action_bar_readout() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    h.host().take_calls();
    h.clock.set(62_500);
    for _ in 0..20 {
        h.coordinator.on_tick();
    }
    let bars: Vec<_> = h
        .host()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            HostCall::ActionBar { message, .. } => Some(message.plain()),
            _ => None,
        })
        .collect();
    assert_eq!(bars, vec!["00:01:02".to_string()]);
}

#[test]
fn test_unreadable_ledger_reported_not_fatal() {
    let path = temp_ledger();
    std::fs::create_dir_all(&path).unwrap();
    let h = harness_with(path, |_| {});
    let alex = player("a", "Alex");
    h.join(&alex);

    assert_eq!(h.coordinator.phase(), RunPhase::Running);
    assert!(h.host().broadcasts().iter().any(|l| l.starts_with("[Splits] Failed to load runs.json")));

    h.coordinator.on_death(&alex, &DamageSource::new("mob"));
    assert!(h.host().broadcasts().iter().any(|l| l.starts_with("[Splits] Failed to save run")));
}

#[test]
fn test_late_ledger_load_keeps_current_run_bests() {
    let path = temp_ledger();
    std::fs::create_dir_all(&path).unwrap();
    let h = harness_with(path.clone(), |_| {});
    let alex = player("a", "Alex");
    h.join(&alex);

    h.clock.set(60_000);
    h.host().grant(&alex.id, Milestone::Iron.achievement_id());
    h.coordinator.periodic();
    assert_eq!(h.coordinator.best_splits().time_ms(Milestone::Iron), Some(60_000));

    // ledger becomes readable; the next join retries the load mid-run
    std::fs::remove_dir_all(&path).unwrap();
    h.clock.set(61_000);
    h.join(&player("b", "Steve"));
    assert_eq!(h.coordinator.phase(), RunPhase::Running);
    assert_eq!(h.coordinator.best_splits().time_ms(Milestone::Iron), Some(60_000));

    h.clock.set(70_000);
    assert!(h.coordinator.on_death(&alex, &DamageSource::new("mob")));
    let file = Ledger::new(&path).read().unwrap().unwrap();
    assert_eq!(file.runs[0].splits["IRON"].time_ms, 60_000);
    assert_eq!(file.best_splits["IRON"].time_ms, 60_000);
    assert_eq!(file.best_splits["IRON"].run_id.as_deref(), Some("run-0-70000"));
}

#[test]
fn test_reset_requires_terminal_or_force() {
    let h = harness();
    let alex = player("a", "Alex");
    h.join(&alex);
    assert!(!h.coordinator.reset_run(false));
    assert!(h.coordinator.reset_run(true));
    assert_eq!(h.coordinator.phase(), RunPhase::NotStarted);

    h.clock.set(9_000);
    h.coordinator.on_player_join(&alex);
    assert_eq!(h.coordinator.run_snapshot().start_ms, 9_000);
    assert!(h.coordinator.splits().is_empty());
}
