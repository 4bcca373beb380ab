//! Scenario replay for the run coordinator.
//!
//! Reads a JSON list of timestamped events, feeds them to a [`Coordinator`]
//! backed by [`MemoryHost`] and a manual clock, and prints every chat
//! broadcast as plain text followed by a run summary.
//!
//! ```json
//! [
//!   { "at_ms": 0,      "event": { "type": "join", "id": "a1", "name": "Alex" } },
//!   { "at_ms": 90000,  "event": { "type": "grant", "id": "a1", "milestone": "IRON" } },
//!   { "at_ms": 90000,  "event": { "type": "ticks", "count": 20 } },
//!   { "at_ms": 120000, "event": { "type": "death", "id": "a1", "source": { "kind": "lava" } } }
//! ]
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use splitrun_core::config::{load_config, resolve_ledger_path};
use splitrun_core::{
    Coordinator, DamageSource, GameHost, HostCall, Location, ManualClock, MemoryHost, PlayerId,
    PlayerSnapshot,
};
use splitrun_types::Milestone;
use splitrun_types::formatting::{format_amount, format_clock};
use tracing_subscriber::EnvFilter;

const DEFAULT_WORLD: &str = "minecraft:overworld";

#[derive(Parser)]
#[command(version, about = "Replay a scripted run against an in-memory host")]
struct Cli {
    /// Scenario file (JSON list of `{ at_ms, event }`)
    scenario: PathBuf,

    /// Config TOML; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ledger path, overriding the config
    #[arg(short, long)]
    ledger: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Step {
    at_ms: i64,
    event: ScenarioEvent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ScenarioEvent {
    Join {
        id: String,
        name: String,
        #[serde(default)]
        location: Option<Location>,
    },
    Leave {
        id: String,
    },
    Move {
        id: String,
        location: Location,
    },
    Grant {
        id: String,
        milestone: Milestone,
    },
    Damage {
        id: String,
        source: DamageSource,
        amount: f32,
    },
    Death {
        id: String,
        source: DamageSource,
    },
    Ticks {
        count: u32,
    },
    Reset {
        #[serde(default)]
        force: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if let Ok(path) = std::env::var("SPLITRUN_LOG_PATH")
        && let Ok(file) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(file)
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load config");
                std::process::exit(1);
            }
        },
        None => Default::default(),
    };
    if let Some(ledger) = cli.ledger {
        config.ledger_path = Some(ledger);
    }

    let steps: Vec<Step> = match fs::read_to_string(&cli.scenario)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
    {
        Ok(steps) => steps,
        Err(e) => {
            tracing::error!(error = %e, path = %cli.scenario.display(), "Failed to read scenario");
            std::process::exit(1);
        }
    };

    let ledger_path = resolve_ledger_path(&config);
    let clock = Arc::new(ManualClock::new(0));
    let coordinator = Coordinator::new(MemoryHost::new(), clock.clone(), config);
    tracing::info!(steps = steps.len(), ledger = %ledger_path.display(), "Replaying scenario");

    for step in steps {
        clock.set(step.at_ms);
        apply(&coordinator, step.event);
        print_broadcasts(step.at_ms, coordinator.host());
    }

    print_summary(&coordinator, clock.as_ref(), &ledger_path);
}

fn apply(coordinator: &Coordinator<MemoryHost>, event: ScenarioEvent) {
    let host = coordinator.host();
    match event {
        ScenarioEvent::Join { id, name, location } => {
            let snapshot = PlayerSnapshot {
                id: PlayerId::new(id),
                name,
                location: location.unwrap_or_else(|| Location::new(DEFAULT_WORLD, 0.5, 64.0, 0.5)),
                health: 20.0,
                max_health: 20.0,
            };
            host.join(snapshot.clone());
            coordinator.on_player_join(&snapshot);
        }
        ScenarioEvent::Leave { id } => host.leave(&PlayerId::new(id)),
        ScenarioEvent::Move { id, location } => host.move_to(&PlayerId::new(id), location),
        ScenarioEvent::Grant { id, milestone } => {
            host.grant(&PlayerId::new(id), milestone.achievement_id())
        }
        ScenarioEvent::Damage { id, source, amount } => {
            let Some(player) = connected(host, &id) else {
                return;
            };
            host.set_health(&player.id, (player.health - amount).max(0.0));
            coordinator.on_damage(&player, &source, amount);
        }
        ScenarioEvent::Death { id, source } => {
            let Some(player) = connected(host, &id) else {
                return;
            };
            coordinator.on_death(&player, &source);
        }
        ScenarioEvent::Ticks { count } => {
            for _ in 0..count {
                coordinator.on_tick();
            }
        }
        ScenarioEvent::Reset { force } => {
            if !coordinator.reset_run(force) {
                tracing::warn!(force, "Reset ignored in current phase");
            }
        }
    }
}

fn connected(host: &MemoryHost, id: &str) -> Option<PlayerSnapshot> {
    let player = host.player(&PlayerId::new(id));
    if player.is_none() {
        tracing::warn!(player = %id, "Event for a player that is not connected");
    }
    player
}

fn print_broadcasts(at_ms: i64, host: &MemoryHost) {
    for call in host.take_calls() {
        if let HostCall::Broadcast(text) = call {
            println!("[{}] {}", format_clock(at_ms), text);
        }
    }
}

fn print_summary(coordinator: &Coordinator<MemoryHost>, clock: &ManualClock, ledger: &std::path::Path) {
    use splitrun_core::Clock;

    let snapshot = coordinator.run_snapshot();
    println!();
    println!("phase:   {:?}", snapshot.phase);
    println!("elapsed: {}", format_clock(snapshot.elapsed_ms(clock.now_ms())));
    if let Some(by) = &snapshot.ended_by {
        println!("ended by: {}", by);
    }

    let bests = coordinator.best_splits();
    let splits = coordinator.splits();
    for milestone in Milestone::ALL {
        let split = splits
            .get(&milestone)
            .map(|r| format!("{} by {}", format_clock(r.time_ms), r.player_name))
            .unwrap_or_else(|| "-".to_string());
        let best = bests
            .time_ms(milestone)
            .map(format_clock)
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<7} {:<24} best {}", milestone.label(), split, best);
    }

    for entry in coordinator.leaderboard() {
        println!("  #{} {} {}", entry.rank, entry.name, format_amount(entry.total));
    }
    println!("ledger:  {}", ledger.display());
}
