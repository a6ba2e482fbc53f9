//! Durable progress and score snapshots
//!
//! The whole mutable state of the engine (every rater session plus the
//! aggregate scores) is one [`Snapshot`], written wholesale after every
//! mutation. The file layout is:
//!
//! ```json
//! {
//!   "rater_sessions": {"alice": {"order": [3, 0, 2, 1], "current_index": 1}},
//!   "aggregate_scores": {"w1": 2, "w2": -1}
//! }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Per-rater progress through their own task ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaterSession {
    /// Permutation of task indices, drawn once on first contact
    pub order: Vec<usize>,
    /// Number of submissions accepted so far
    pub current_index: usize,
}

impl RaterSession {
    pub fn new(order: Vec<usize>) -> Self {
        Self {
            order,
            current_index: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.order.len()
    }

    /// Task index the rater should see next, `None` once exhausted
    pub fn pending_task(&self) -> Option<usize> {
        self.order.get(self.current_index).copied()
    }
}

/// Everything that must survive a restart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub rater_sessions: BTreeMap<String, RaterSession>,
    #[serde(default)]
    pub aggregate_scores: BTreeMap<String, i64>,
}

impl Snapshot {
    /// Fresh state: no sessions, every candidate at zero
    pub fn new(candidates: &[String]) -> Self {
        Self {
            rater_sessions: BTreeMap::new(),
            aggregate_scores: candidates.iter().map(|c| (c.clone(), 0)).collect(),
        }
    }

    /// Add missing candidates with a zero score. Unknown stored candidates
    /// are kept. Returns how many entries were added.
    pub fn backfill_candidates(&mut self, candidates: &[String]) -> usize {
        let mut added = 0;
        for candidate in candidates {
            if !self.aggregate_scores.contains_key(candidate) {
                self.aggregate_scores.insert(candidate.clone(), 0);
                added += 1;
            }
        }
        added
    }
}

/// Persistence backend for [`Snapshot`]s
///
/// Implementations are called with the ledger lock held; `save` must not
/// return until the snapshot is durable.
pub trait ProgressStore: Send + Sync {
    /// Read the last saved snapshot, `None` if nothing was ever saved
    fn read_snapshot(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Startup load: stored snapshot (or defaults) with every current
    /// candidate present in the score map
    fn load(&self, candidates: &[String]) -> Result<Snapshot> {
        match self.read_snapshot()? {
            Some(mut snapshot) => {
                let added = snapshot.backfill_candidates(candidates);
                if added > 0 {
                    warn!("Backfilled {} candidate(s) missing from stored scores", added);
                }
                info!(
                    "Restored progress: {} rater session(s), {} scored candidate(s)",
                    snapshot.rater_sessions.len(),
                    snapshot.aggregate_scores.len()
                );
                Ok(snapshot)
            }
            None => {
                info!("No stored progress found, starting fresh");
                Ok(Snapshot::new(candidates))
            }
        }
    }
}

/// Snapshot stored as a pretty-printed JSON file
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so readers never see a partial snapshot. The
/// file and then the directory are fsynced before `save` returns.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl ProgressStore for JsonFileStore {
    fn read_snapshot(&self) -> Result<Option<Snapshot>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let snapshot = serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("corrupt snapshot {}: {}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Storage(format!("failed to create {}: {}", dir.display(), e))
        })?;

        let write = || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(dir)?;
            serde_json::to_writer_pretty(&mut tmp, snapshot)?;
            tmp.write_all(b"\n")?;
            tmp.as_file().sync_all()?;
            tmp.persist(&self.path).map_err(|e| e.error)?;
            sync_dir(dir)
        };

        write().map_err(|e| {
            Error::Storage(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

/// Flush the directory entry so the rename itself survives power loss
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// In-memory store for tests; can be told to fail saves
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing snapshot, as if loaded from disk
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make every subsequent `save` fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last successfully saved snapshot
    pub fn saved(&self) -> Option<Snapshot> {
        self.snapshot.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProgressStore for MemoryStore {
    fn read_snapshot(&self) -> Result<Option<Snapshot>> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected save failure".to_string()));
        }
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))?;
        *guard = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
