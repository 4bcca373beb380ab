use std::path::PathBuf;

use thiserror::Error;

/// Failure reading or writing `runs.json`. Never fatal: callers log it and
/// keep the in-memory state authoritative.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A host effector call that did not happen.
#[derive(Debug, Error)]
pub enum EffectorError {
    #[error("host does not support {capability}")]
    Unsupported { capability: &'static str },
    #[error("{capability} failed: {reason}")]
    Failed {
        capability: &'static str,
        reason: String,
    },
}

pub type EffectResult = Result<(), EffectorError>;

/// Log and discard an effector failure at the call site.
pub(crate) fn absorb(result: EffectResult) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Effector call skipped");
            false
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Serialize error for {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
}
