//! Rater sessions and scores behind a single lock
//!
//! [`Ledger`] owns the in-memory [`Snapshot`] and the persistence backend.
//! Every read or mutation runs inside [`Ledger::with_lock`]: the closure
//! gets a [`Transaction`], and if it changed anything the whole snapshot is
//! saved before the lock is released. When the closure or the save fails,
//! the transaction's changes are undone, so memory never runs ahead of
//! what is on disk.
//!
//! Composite operations (lookup-or-create, vote + advance) are a single
//! closure, which is why the lock never needs to be re-entered.

use crate::scoring::{self, Vote};
use crate::store::{ProgressStore, RaterSession, Snapshot};
use crate::tasks::{Task, TaskSet};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Result of asking for a rater's next task
#[derive(Debug, Clone, PartialEq)]
pub enum NextTask<'a> {
    Pending {
        /// Number of tasks already submitted
        position: usize,
        total: usize,
        task: &'a Task,
    },
    Completed {
        total: usize,
    },
}

/// A rater's progress through the task set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub position: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.position >= self.total
    }
}

/// A vote on the rater's current task, as posted by the task page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub rater_id: String,
    pub datapoint_id: String,
    pub left_weight: String,
    pub right_weight: String,
    pub vote: Vote,
}

struct LedgerState {
    snapshot: Snapshot,
    rng: StdRng,
}

enum Undo {
    RemoveSession(String),
    SetPosition(String, usize),
    SetScore(String, i64),
}

/// Exclusive view of the ledger state for the duration of one lock
pub struct Transaction<'a> {
    state: &'a mut LedgerState,
    tasks: &'a TaskSet,
    undo: Vec<Undo>,
}

impl<'a> Transaction<'a> {
    pub fn tasks(&self) -> &'a TaskSet {
        self.tasks
    }

    pub fn session(&self, rater_id: &str) -> Option<&RaterSession> {
        self.state.snapshot.rater_sessions.get(rater_id)
    }

    pub fn scores(&self) -> &BTreeMap<String, i64> {
        &self.state.snapshot.aggregate_scores
    }

    /// Existing session, or a new one with a freshly shuffled task order
    pub fn session_or_create(&mut self, rater_id: &str) -> &RaterSession {
        if !self.state.snapshot.rater_sessions.contains_key(rater_id) {
            let mut order: Vec<usize> = (0..self.tasks.len()).collect();
            order.shuffle(&mut self.state.rng);

            info!("Created session for rater {} ({} tasks)", rater_id, order.len());
            self.state
                .snapshot
                .rater_sessions
                .insert(rater_id.to_string(), RaterSession::new(order));
            self.undo.push(Undo::RemoveSession(rater_id.to_string()));
        }
        &self.state.snapshot.rater_sessions[rater_id]
    }

    /// Move a rater forward by one task; returns the new position
    pub fn advance(&mut self, rater_id: &str) -> Result<usize> {
        let session = self
            .state
            .snapshot
            .rater_sessions
            .get_mut(rater_id)
            .ok_or_else(|| Error::NotFound(format!("no session for rater {}", rater_id)))?;

        self.undo
            .push(Undo::SetPosition(rater_id.to_string(), session.current_index));
        session.current_index += 1;

        if session.current_index == session.order.len() {
            info!("Rater {} completed all {} tasks", rater_id, session.order.len());
        }
        Ok(session.current_index)
    }

    /// Apply a vote to the aggregate scores
    pub fn apply_vote(&mut self, left: &str, right: &str, vote: Vote) -> Result<()> {
        let scores = &mut self.state.snapshot.aggregate_scores;
        let before: Vec<(String, i64)> = [left, right]
            .iter()
            .filter_map(|c| scores.get(*c).map(|s| (c.to_string(), *s)))
            .collect();

        scoring::apply_vote(scores, left, right, vote)?;

        debug!(
            "Vote {}={} {}={} -> {}={} {}={}",
            left,
            vote.left_selected,
            right,
            vote.right_selected,
            left,
            scores[left],
            right,
            scores[right]
        );
        self.undo
            .extend(before.into_iter().map(|(c, s)| Undo::SetScore(c, s)));
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        !self.undo.is_empty()
    }

    fn rollback(&mut self) {
        let snapshot = &mut self.state.snapshot;
        for undo in self.undo.drain(..).rev() {
            match undo {
                Undo::RemoveSession(rater_id) => {
                    snapshot.rater_sessions.remove(&rater_id);
                }
                Undo::SetPosition(rater_id, position) => {
                    if let Some(session) = snapshot.rater_sessions.get_mut(&rater_id) {
                        session.current_index = position;
                    }
                }
                Undo::SetScore(candidate, score) => {
                    snapshot.aggregate_scores.insert(candidate, score);
                }
            }
        }
    }
}

/// Process-wide owner of rater sessions and aggregate scores
pub struct Ledger {
    tasks: Arc<TaskSet>,
    store: Arc<dyn ProgressStore>,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Load stored progress and start serving
    pub fn open(
        tasks: Arc<TaskSet>,
        candidates: &[String],
        store: Arc<dyn ProgressStore>,
    ) -> Result<Self> {
        Self::open_with_rng(tasks, candidates, store, StdRng::from_entropy())
    }

    /// Same as [`Ledger::open`] with a reproducible shuffle source
    pub fn open_with_seed(
        tasks: Arc<TaskSet>,
        candidates: &[String],
        store: Arc<dyn ProgressStore>,
        seed: u64,
    ) -> Result<Self> {
        Self::open_with_rng(tasks, candidates, store, StdRng::seed_from_u64(seed))
    }

    fn open_with_rng(
        tasks: Arc<TaskSet>,
        candidates: &[String],
        store: Arc<dyn ProgressStore>,
        rng: StdRng,
    ) -> Result<Self> {
        let snapshot = store.load(candidates)?;

        let stale = snapshot
            .rater_sessions
            .values()
            .filter(|s| s.order.len() != tasks.len() || s.order.iter().any(|&i| i >= tasks.len()))
            .count();
        if stale > 0 {
            warn!(
                "{} stored session(s) do not match the current task set ({} tasks); \
                 the experiment definition has probably changed",
                stale,
                tasks.len()
            );
        }

        Ok(Self {
            tasks,
            store,
            state: Mutex::new(LedgerState { snapshot, rng }),
        })
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Run `f` with exclusive access; persist if it changed anything
    ///
    /// On error from `f` or from the save, every change made by `f` is
    /// rolled back before the lock is released.
    pub fn with_lock<T>(&self, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| Error::Internal("ledger lock poisoned".to_string()))?;

        let mut txn = Transaction {
            state: &mut *guard,
            tasks: self.tasks.as_ref(),
            undo: Vec::new(),
        };

        let result = match f(&mut txn) {
            Ok(value) if txn.is_dirty() => match self.store.save(&txn.state.snapshot) {
                Ok(()) => Ok(value),
                Err(e) => {
                    error!("Failed to persist progress, rolling back: {}", e);
                    Err(e)
                }
            },
            other => other,
        };

        if result.is_err() {
            txn.rollback();
        }
        result
    }

    /// Next task for a rater, creating their session on first contact
    pub fn next_task(&self, rater_id: &str) -> Result<NextTask<'_>> {
        let rater_id = validate_rater_id(rater_id)?;
        let (position, pending) = self.with_lock(|txn| {
            let session = txn.session_or_create(rater_id);
            Ok((session.current_index, session.pending_task()))
        })?;

        let total = self.tasks.len();
        match pending {
            None => Ok(NextTask::Completed { total }),
            Some(index) => {
                let task = self.tasks.get(index).ok_or_else(|| {
                    Error::Internal(format!(
                        "rater {} references task {} but only {} exist",
                        rater_id, index, total
                    ))
                })?;
                Ok(NextTask::Pending {
                    position,
                    total,
                    task,
                })
            }
        }
    }

    /// Read-only progress; unseen raters are at position 0
    pub fn status(&self, rater_id: &str) -> Result<Progress> {
        let rater_id = validate_rater_id(rater_id)?;
        let position = self.with_lock(|txn| {
            Ok(txn.session(rater_id).map(|s| s.current_index).unwrap_or(0))
        })?;
        Ok(Progress {
            position,
            total: self.tasks.len(),
        })
    }

    /// Advance a rater by one task; fails with `NotFound` for unseen raters
    pub fn advance(&self, rater_id: &str) -> Result<usize> {
        let rater_id = validate_rater_id(rater_id)?;
        self.with_lock(|txn| txn.advance(rater_id))
    }

    /// Apply a vote to the aggregate scores and persist
    pub fn apply_vote(&self, left: &str, right: &str, vote: Vote) -> Result<()> {
        self.with_lock(|txn| txn.apply_vote(left, right, vote))
    }

    /// Record a vote on the rater's current task and advance them
    ///
    /// The submission must name the task the rater is currently looking
    /// at; anything else (a repeated form post, a stale page) is a
    /// `Conflict` and changes nothing.
    pub fn submit(&self, submission: &Submission) -> Result<Progress> {
        let rater_id = validate_rater_id(&submission.rater_id)?;
        let total = self.tasks.len();

        self.with_lock(|txn| {
            let session = txn
                .session(rater_id)
                .ok_or_else(|| Error::NotFound(format!("no session for rater {}", rater_id)))?;
            let index = session.pending_task().ok_or_else(|| {
                Error::Conflict(format!("rater {} has already completed all tasks", rater_id))
            })?;
            let task = txn.tasks().get(index).ok_or_else(|| {
                Error::Internal(format!("rater {} references unknown task {}", rater_id, index))
            })?;

            if task.datapoint_id != submission.datapoint_id
                || task.left_weight != submission.left_weight
                || task.right_weight != submission.right_weight
            {
                return Err(Error::Conflict(format!(
                    "submission ({}, {} vs {}) does not match the current task for rater {}",
                    submission.datapoint_id,
                    submission.left_weight,
                    submission.right_weight,
                    rater_id
                )));
            }

            txn.apply_vote(&submission.left_weight, &submission.right_weight, submission.vote)?;
            let position = txn.advance(rater_id)?;
            Ok(Progress { position, total })
        })
    }

    /// Copy of the aggregate scores
    pub fn scores(&self) -> Result<BTreeMap<String, i64>> {
        self.with_lock(|txn| Ok(txn.scores().clone()))
    }

    /// Copy of the full in-memory state
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.with_lock(|txn| Ok(txn.state.snapshot.clone()))
    }
}

fn validate_rater_id(rater_id: &str) -> Result<&str> {
    if rater_id.trim().is_empty() {
        return Err(Error::InvalidInput("rater_id must not be empty".to_string()));
    }
    Ok(rater_id)
}
