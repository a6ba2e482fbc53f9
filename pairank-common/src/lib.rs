//! # pairank common library
//!
//! Task-assignment and scoring engine for pairwise rating experiments:
//! - Experiment definition loading and validation
//! - Deterministic task set generation
//! - Durable progress/score snapshots
//! - Additive vote scoring
//! - The locked ledger that serializes every read-modify-persist cycle
//! - Configuration loading

pub mod config;
pub mod error;
pub mod experiment;
pub mod ledger;
pub mod scoring;
pub mod store;
pub mod tasks;

pub use error::{Error, Result};
pub use experiment::{Datapoint, ExperimentDefinition};
pub use ledger::{Ledger, NextTask, Progress, Submission};
pub use store::{JsonFileStore, MemoryStore, ProgressStore, RaterSession, Snapshot};
pub use tasks::{Task, TaskSet};
