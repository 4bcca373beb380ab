//! Live sidebar rendering.
//!
//! Each render computes the full desired set of lines from run state, diffs
//! it against what was last issued, and only touches slots whose content
//! changed. The host surface merges lines with identical visible text, so
//! every line carries an invisible marker derived from its slot.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use splitrun_types::formatting::{UNKNOWN_CLOCK, format_clock, format_delta};
use splitrun_types::{DisplayConfig, Milestone, StyledText, TextColor};

use crate::error::absorb;
use crate::host::GameHost;
use crate::lock;
use crate::run::RunPhase;
use crate::splits::{BestSplits, SplitRecord};

const MARKER_PREFIX: char = '\u{2063}';
const MARKER_ZERO: char = '\u{200B}';
const MARKER_ONE: char = '\u{200C}';

/// Zero-width disambiguator for `slot`: a separator followed by the slot's
/// bits as zero-width characters.
pub fn slot_marker(slot: i32) -> String {
    let bits = format!("{:b}", slot as u32);
    std::iter::once(MARKER_PREFIX)
        .chain(bits.chars().map(|b| if b == '1' { MARKER_ONE } else { MARKER_ZERO }))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub slot: i32,
    pub text: StyledText,
}

impl DisplayLine {
    pub fn new(slot: i32, text: StyledText) -> Self {
        Self { slot, text }
    }

    /// Key under which the host stores this line: visible text plus the
    /// slot marker. Unique per slot even when visible text repeats.
    pub fn holder(&self) -> String {
        let mut holder = self.text.plain();
        holder.push_str(&slot_marker(self.slot));
        holder
    }
}

/// Compute the sidebar for the current state.
///
/// A terminal run gets a status line at the top slot; milestones follow in
/// run order downward and stop before slot 0.
pub fn build_lines(
    config: &DisplayConfig,
    phase: RunPhase,
    splits: &BTreeMap<Milestone, SplitRecord>,
    bests: &BestSplits,
) -> BTreeMap<i32, DisplayLine> {
    let mut lines = BTreeMap::new();
    let mut slot = config.top_slot;

    let status = match phase {
        RunPhase::Completed => Some(StyledText::new().bold("COMPLETED", TextColor::Green)),
        RunPhase::Failed => Some(StyledText::new().bold("FAILED", TextColor::DarkRed)),
        RunPhase::NotStarted | RunPhase::Running => None,
    };
    if let Some(text) = status {
        lines.insert(slot, DisplayLine::new(slot, text));
        slot -= 1;
    }

    for milestone in Milestone::ALL {
        if slot <= 0 {
            break;
        }
        let text = milestone_text(milestone, splits.get(&milestone), bests)
            .truncated(config.max_line_chars);
        lines.insert(slot, DisplayLine::new(slot, text));
        slot -= 1;
    }
    lines
}

fn milestone_text(
    milestone: Milestone,
    record: Option<&SplitRecord>,
    bests: &BestSplits,
) -> StyledText {
    let label = format!("{} ", milestone.label());
    let Some(record) = record else {
        let best = bests
            .time_ms(milestone)
            .map(format_clock)
            .unwrap_or_else(|| UNKNOWN_CLOCK.to_string());
        return StyledText::new()
            .text(label, TextColor::DarkGray)
            .text(best, TextColor::Gray);
    };

    let text = StyledText::new()
        .text(label, TextColor::White)
        .text(format_clock(record.time_ms), TextColor::Gold);
    match record.delta_ms() {
        None => text,
        Some(delta) => {
            let color = if delta <= 0 {
                TextColor::Green
            } else {
                TextColor::Red
            };
            text.text(" (", TextColor::DarkGray)
                .text(format_delta(delta), color)
                .text(")", TextColor::DarkGray)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayChange {
    /// Line currently shown at this slot, if any; removed before `line` is set.
    pub previous: Option<DisplayLine>,
    pub line: DisplayLine,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayDiff {
    pub removed: Vec<DisplayLine>,
    pub changed: Vec<DisplayChange>,
}

impl DisplayDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Slots to clear and slots to (re)issue. Unchanged slots appear in neither.
pub fn diff_lines(
    previous: &BTreeMap<i32, DisplayLine>,
    desired: &BTreeMap<i32, DisplayLine>,
) -> DisplayDiff {
    let removed = previous
        .iter()
        .filter(|(slot, _)| !desired.contains_key(slot))
        .map(|(_, line)| line.clone())
        .collect();
    let changed = desired
        .iter()
        .filter(|(slot, line)| previous.get(slot) != Some(line))
        .map(|(slot, line)| DisplayChange {
            previous: previous.get(slot).cloned(),
            line: line.clone(),
        })
        .collect();
    DisplayDiff { removed, changed }
}

#[derive(Debug)]
pub struct DisplayRenderer {
    config: DisplayConfig,
    objective_ready: AtomicBool,
    /// Lines the host confirmed, by slot. Kept across runs.
    rendered: Mutex<BTreeMap<i32, DisplayLine>>,
}

impl DisplayRenderer {
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            config,
            objective_ready: AtomicBool::new(false),
            rendered: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn rendered(&self) -> BTreeMap<i32, DisplayLine> {
        lock(&self.rendered).clone()
    }

    /// Bring the host sidebar in line with `desired`. Returns the diff that
    /// was applied.
    pub fn render(&self, host: &dyn GameHost, desired: BTreeMap<i32, DisplayLine>) -> DisplayDiff {
        let objective = self.config.objective.as_str();
        if !self.objective_ready.load(Ordering::SeqCst)
            && absorb(host.ensure_objective(objective, &self.config.title))
        {
            self.objective_ready.store(true, Ordering::SeqCst);
        }

        let mut rendered = lock(&self.rendered);
        let diff = diff_lines(&rendered, &desired);

        for line in &diff.removed {
            if absorb(host.remove_line(objective, line)) {
                rendered.remove(&line.slot);
            }
        }
        for change in &diff.changed {
            if let Some(old) = &change.previous {
                absorb(host.remove_line(objective, old));
                rendered.remove(&old.slot);
            }
            if absorb(host.set_line(objective, &change.line)) {
                rendered.insert(change.line.slot, change.line.clone());
            }
        }
        diff
    }
}
