pub mod clock;
pub mod config;
pub mod coordinator;
pub mod damage;
pub mod display;
pub mod error;
pub mod host;
pub mod ledger;
pub mod messages;
pub mod pin;
pub mod run;
pub mod splits;

#[cfg(test)]
mod coordinator_tests;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::Coordinator;
pub use error::{ConfigError, EffectResult, EffectorError, LedgerError};
pub use host::memory::{HostCall, MemoryHost};
pub use host::{Attacker, DamageSource, GameHost, Location, PlayerId, PlayerSnapshot};
pub use ledger::{Ledger, LedgerEntry, LedgerFile};
pub use run::{FailureSite, RunPhase, RunSnapshot};
pub use splits::{BestSplit, BestSplits, SplitRecord};
pub use splitrun_types::{Milestone, SplitrunConfig, StyledText, TextColor};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
