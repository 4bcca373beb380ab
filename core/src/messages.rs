//! Chat and action-bar message builders.

use splitrun_types::formatting::{format_amount, format_clock, format_delta, format_health};
use splitrun_types::{StyledText, TextColor};

use crate::damage::LeaderboardEntry;
use crate::host::{DamageSource, PlayerSnapshot};
use crate::run::{FailureSite, RunPhase};
use crate::splits::{PersonalBest, SplitRecord};

const RULE: &str = "══════════════════════════════";

fn rule(color: TextColor) -> StyledText {
    StyledText::plain_colored(RULE, color)
}

/// `[Damage] <name> took <amt> ♥ from <attacker> (<cause>) | HP: <hp>/<max>`
pub fn damage_line(player: &PlayerSnapshot, source: &DamageSource, amount: f32) -> StyledText {
    StyledText::new()
        .text("[Damage] ", TextColor::DarkGray)
        .text(player.name.as_str(), TextColor::White)
        .text(" took ", TextColor::Gray)
        .text(format!("{} ♥", format_amount(amount)), TextColor::Red)
        .text(" from ", TextColor::Gray)
        .text(source.describe_attacker(), TextColor::Gold)
        .text(format!(" ({})", source.describe_cause()), TextColor::DarkGray)
        .text(
            format!(" | HP: {}", format_health(player.health, player.max_health)),
            TextColor::Gray,
        )
}

/// Leaderboard block, one message per line. Empty when nobody took damage.
pub fn leaderboard(entries: &[LeaderboardEntry]) -> Vec<StyledText> {
    if entries.is_empty() {
        return Vec::new();
    }
    let mut lines = Vec::with_capacity(entries.len() + 4);
    lines.push(StyledText::new());
    lines.push(StyledText::new().bold("═══ Most damage taken (this run) ═══", TextColor::Gold));
    for entry in entries {
        lines.push(
            StyledText::new()
                .text(format!("#{} ", entry.rank), TextColor::Gold)
                .text(entry.name.as_str(), TextColor::White)
                .text(" — ", TextColor::DarkGray)
                .text(format!("{} ♥", format_amount(entry.total)), TextColor::Red),
        );
    }
    lines.push(rule(TextColor::Gold));
    lines.push(StyledText::new());
    lines
}

/// `⏱ SPLIT <LABEL>: <time> (<±delta>|first record) — <player>`
pub fn split(record: &SplitRecord) -> StyledText {
    let text = StyledText::new()
        .bold("⏱ SPLIT ", TextColor::Aqua)
        .bold(record.milestone.label(), TextColor::White)
        .text(": ", TextColor::Gray)
        .text(format_clock(record.time_ms), TextColor::Gold)
        .text(" (", TextColor::DarkGray);
    let text = match record.delta_ms() {
        Some(delta) => {
            let color = if delta <= 0 {
                TextColor::Green
            } else {
                TextColor::Red
            };
            text.text(format_delta(delta), color)
        }
        None => text.italic("first record", TextColor::Gray),
    };
    text.text(")", TextColor::DarkGray)
        .text(" — ", TextColor::DarkGray)
        .text(record.player_name.as_str(), TextColor::White)
}

/// `🏁 NEW PB <LABEL>: <time> (-<improvement>|first record) — <player>`
pub fn personal_best(record: &SplitRecord, pb: &PersonalBest) -> StyledText {
    let text = StyledText::new()
        .bold("🏁 NEW PB ", TextColor::Green)
        .bold(record.milestone.label(), TextColor::White)
        .text(": ", TextColor::Gray)
        .text(format_clock(pb.time_ms), TextColor::Gold)
        .text(" (", TextColor::DarkGray);
    let text = match pb.improvement_ms() {
        Some(gain) => text.text(format!("-{}", format_clock(gain)), TextColor::Green),
        None => text.italic("first record", TextColor::Gray),
    };
    text.text(")", TextColor::DarkGray)
        .text(" — ", TextColor::DarkGray)
        .text(record.player_name.as_str(), TextColor::White)
}

/// Completion announcement framed by rules, one message per line.
pub fn completed_banner(elapsed_ms: i64, winner: &str) -> Vec<StyledText> {
    vec![
        StyledText::new(),
        rule(TextColor::Green),
        StyledText::new()
            .bold("🏆 RUN COMPLETED! ", TextColor::Green)
            .text("Time: ", TextColor::Gray)
            .bold(format_clock(elapsed_ms), TextColor::Gold)
            .text(" — by ", TextColor::DarkGray)
            .text(winner, TextColor::White),
        rule(TextColor::Green),
        StyledText::new(),
    ]
}

/// Failure announcement, broadcast once per failed run.
pub fn failed_banner(site: &FailureSite) -> Vec<StyledText> {
    let (x, y, z) = site.location.block();
    vec![
        StyledText::new(),
        rule(TextColor::DarkRed),
        StyledText::new().bold("☠☠☠  END RUN  ☠☠☠", TextColor::DarkRed),
        StyledText::new().bold("RUN FAILED", TextColor::Red),
        rule(TextColor::DarkRed),
        StyledText::new()
            .bold("💀 DEATH: ", TextColor::Red)
            .text(site.player_name.as_str(), TextColor::White)
            .text(format!(" @ {} {} {}", x, y, z), TextColor::Gray)
            .text(format!(" in {}", site.location.world), TextColor::Gray)
            .text(" — cause: ", TextColor::DarkGray)
            .text(site.cause.as_str(), TextColor::Gold)
            .text(format!(" ({})", site.damage_type), TextColor::DarkGray),
        StyledText::plain_colored("Everyone has been forced into SPECTATOR.", TextColor::Gray),
        StyledText::new().italic("Better luck next time.", TextColor::DarkGray),
        rule(TextColor::DarkRed),
        StyledText::new(),
    ]
}

/// Elapsed time readout; prefixed with the outcome once the run has ended.
pub fn action_bar(phase: RunPhase, elapsed_ms: i64) -> StyledText {
    let prefix = match phase {
        RunPhase::Completed => Some(StyledText::new().bold("RUN COMPLETED ", TextColor::Green)),
        RunPhase::Failed => Some(StyledText::new().bold("RUN FAILED ", TextColor::DarkRed)),
        RunPhase::NotStarted | RunPhase::Running => None,
    };
    let time = StyledText::plain_colored(format_clock(elapsed_ms), TextColor::Gold);
    match prefix {
        Some(prefix) => prefix.text("— ", TextColor::DarkGray).append(time),
        None => time,
    }
}

pub fn saved_notice(run_id: &str) -> StyledText {
    StyledText::plain_colored(format!("[Splits] Saved run {}", run_id), TextColor::DarkGray)
}

pub fn save_failed_notice(error: &dyn std::fmt::Display) -> StyledText {
    StyledText::plain_colored(format!("[Splits] Failed to save run: {}", error), TextColor::Red)
}

pub fn load_failed_notice(error: &dyn std::fmt::Display) -> StyledText {
    StyledText::plain_colored(
        format!("[Splits] Failed to load runs.json: {}", error),
        TextColor::Red,
    )
}
