//! Persistent run ledger (`runs.json`).
//!
//! The ledger is append-only: every failed or completed run is pushed onto
//! `runs` together with a snapshot of the best split per milestone. Writes go
//! through a temp file and a rename so a crash mid-write leaves the previous
//! file intact.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

pub const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFile {
    pub version: u32,
    #[serde(default)]
    pub runs: Vec<LedgerEntry>,
    #[serde(default)]
    pub best_splits: BTreeMap<String, StoredBest>,
}

impl Default for LedgerFile {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            runs: Vec::new(),
            best_splits: BTreeMap::new(),
        }
    }
}

/// One finished run. Never rewritten once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub run_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_ms: i64,
    pub failed: bool,
    pub completed: bool,
    /// `FAILED` or `COMPLETED`
    pub end_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_player: Option<String>,
    /// Keyed by milestone label.
    #[serde(default)]
    pub splits: BTreeMap<String, StoredSplit>,
}

impl LedgerEntry {
    pub fn run_id_for(start_ms: i64, end_ms: i64) -> String {
        format!("run-{}-{}", start_ms, end_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSplit {
    pub time_ms: i64,
    pub player: String,
    pub player_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBest {
    pub time_ms: i64,
    /// `None` only for a best set by the run being appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Handle to the ledger file. Holds no cached content: every call reads or
/// writes the file directly.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger, creating an empty one on disk if none exists.
    ///
    /// Unparseable content is reported as an empty ledger so the coordinator
    /// starts with no bests instead of refusing to run.
    pub fn load(&self) -> Result<LedgerFile, LedgerError> {
        match self.read_raw()? {
            None => {
                let fresh = LedgerFile::default();
                self.write_atomic(&fresh)?;
                tracing::info!(path = %self.path.display(), "Created empty ledger");
                Ok(fresh)
            }
            Some(content) => match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) => {
                    tracing::info!(
                        path = %self.path.display(),
                        runs = file.runs.len(),
                        bests = file.best_splits.len(),
                        "Loaded ledger"
                    );
                    Ok(file)
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %self.path.display(), "Failed to parse ledger, starting empty");
                    Ok(LedgerFile::default())
                }
            },
        }
    }

    /// Current file content, `None` if missing or unparseable.
    pub fn read(&self) -> Result<Option<LedgerFile>, LedgerError> {
        Ok(self
            .read_raw()?
            .and_then(|content| serde_json::from_str(&content).ok()))
    }

    /// Append `entry` and replace the stored bests with `best_splits`.
    pub fn append(
        &self,
        entry: &LedgerEntry,
        best_splits: BTreeMap<String, StoredBest>,
    ) -> Result<(), LedgerError> {
        let mut file = match self.read_raw()? {
            None => LedgerFile::default(),
            Some(content) => match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) => file,
                Err(e) => {
                    self.quarantine(&e);
                    LedgerFile::default()
                }
            },
        };

        file.version = LEDGER_VERSION;
        file.runs.push(entry.clone());
        file.best_splits = best_splits;
        self.write_atomic(&file)
    }

    fn read_raw(&self) -> Result<Option<String>, LedgerError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LedgerError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Keep an unreadable ledger as `<name>.bad` instead of overwriting it.
    fn quarantine(&self, parse_error: &serde_json::Error) {
        let bad = sibling(&self.path, ".bad");
        match fs::rename(&self.path, &bad) {
            Ok(()) => tracing::warn!(
                error = %parse_error,
                moved_to = %bad.display(),
                "Ledger unreadable, preserved before rewrite"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                parse_error = %parse_error,
                "Ledger unreadable and could not be preserved"
            ),
        }
    }

    fn write_atomic(&self, file: &LedgerFile) -> Result<(), LedgerError> {
        let io_err = |path: &Path, source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let content = serde_json::to_string_pretty(file)?;
        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;

        if let Err(e) = fs::rename(&tmp, &self.path) {
            tracing::warn!(error = %e, "Atomic ledger replace failed, copying instead");
            fs::copy(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
            let _ = fs::remove_file(&tmp);
        }
        Ok(())
    }
}

/// `runs.json` -> `runs.json<suffix>` in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("runs.json"));
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn temp_ledger_path() -> PathBuf {
        let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "splitrun-ledger-test-{}-{}",
            std::process::id(),
            n
        ));
        let _ = fs::remove_dir_all(&dir);
        dir.join("splits").join("runs.json")
    }

    fn entry(start: i64, end: i64, failed: bool) -> LedgerEntry {
        let mut splits = BTreeMap::new();
        splits.insert(
            "IRON".to_string(),
            StoredSplit {
                time_ms: 90_000,
                player: "Alex".to_string(),
                player_uuid: "0f8e1c2a-1111".to_string(),
            },
        );
        LedgerEntry {
            run_id: LedgerEntry::run_id_for(start, end),
            start_ms: start,
            end_ms: end,
            duration_ms: end - start,
            failed,
            completed: !failed,
            end_reason: if failed { "FAILED" } else { "COMPLETED" }.to_string(),
            end_player: Some("Alex".to_string()),
            splits,
        }
    }

    fn best(time_ms: i64, run_id: &str) -> StoredBest {
        StoredBest {
            time_ms,
            run_id: Some(run_id.to_string()),
        }
    }

    #[test]
    fn test_load_missing_creates_empty_file() {
        let path = temp_ledger_path();
        let ledger = Ledger::new(&path);

        let file = ledger.load().unwrap();
        assert_eq!(file, LedgerFile::default());
        assert!(path.exists());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert!(raw["runs"].as_array().unwrap().is_empty());
        assert!(raw["bestSplits"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_reload_round_trip() {
        let path = temp_ledger_path();
        let ledger = Ledger::new(&path);
        ledger.load().unwrap();

        let entries: Vec<_> = (0..3)
            .map(|i| entry(i * 1_000_000, i * 1_000_000 + 500_000, i % 2 == 0))
            .collect();
        let mut bests = BTreeMap::new();
        for e in &entries {
            bests.insert("IRON".to_string(), best(90_000, &e.run_id));
            ledger.append(e, bests.clone()).unwrap();
        }

        let reloaded = Ledger::new(&path).load().unwrap();
        assert_eq!(reloaded.runs, entries);
        assert_eq!(reloaded.best_splits, bests);
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[test]
    fn test_schema_uses_camel_case() {
        let path = temp_ledger_path();
        let ledger = Ledger::new(&path);
        let e = entry(0, 120_000, false);
        let mut bests = BTreeMap::new();
        bests.insert("IRON".to_string(), best(90_000, &e.run_id));
        ledger.append(&e, bests).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let run = &raw["runs"][0];
        assert_eq!(run["runId"], "run-0-120000");
        assert_eq!(run["durationMs"], 120_000);
        assert_eq!(run["endReason"], "COMPLETED");
        assert_eq!(run["splits"]["IRON"]["playerUuid"], "0f8e1c2a-1111");
        assert_eq!(raw["bestSplits"]["IRON"]["timeMs"], 90_000);
        assert_eq!(raw["bestSplits"]["IRON"]["runId"], "run-0-120000");
    }

    #[test]
    fn test_malformed_ledger_loads_empty_and_is_preserved() {
        let path = temp_ledger_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        let ledger = Ledger::new(&path);

        assert_eq!(ledger.load().unwrap(), LedgerFile::default());
        assert_eq!(ledger.read().unwrap(), None);

        ledger.append(&entry(0, 10, true), BTreeMap::new()).unwrap();
        assert_eq!(
            fs::read_to_string(sibling(&path, ".bad")).unwrap(),
            "{ not json"
        );
        assert_eq!(ledger.read().unwrap().unwrap().runs.len(), 1);
    }

    #[test]
    fn test_missing_sections_default() {
        let path = temp_ledger_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"version":1}"#).unwrap();

        let file = Ledger::new(&path).load().unwrap();
        assert!(file.runs.is_empty());
        assert!(file.best_splits.is_empty());
    }
}
