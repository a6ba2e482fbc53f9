//! Pairwise task set generation
//!
//! One task per datapoint and unordered candidate pair. Left/right
//! placement follows the candidate enumeration order; per-rater shuffling
//! happens in the ledger, never here.

use crate::experiment::ExperimentDefinition;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

/// A single pairwise comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Stable position in the task set
    pub index: usize,
    pub datapoint_id: String,
    pub input: Map<String, Value>,
    pub left_weight: String,
    pub right_weight: String,
    pub left_output: String,
    pub right_output: String,
}

impl Task {
    /// Prompt text from the datapoint payload
    pub fn input_text(&self) -> Option<&str> {
        self.input.get("text").and_then(Value::as_str)
    }

    /// Input image reference from the datapoint payload
    pub fn input_image(&self) -> Option<&str> {
        self.input.get("image").and_then(Value::as_str)
    }
}

/// Immutable, ordered list of every task in an experiment
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: Vec<Task>,
}

impl TaskSet {
    /// Expand a definition into its full task list
    ///
    /// Ordering: datapoints in definition order, then candidate pairs
    /// `(weights[i], weights[j])` with `i < j` in lexicographic order.
    /// Identical definitions always produce identical task sets.
    pub fn build(definition: &ExperimentDefinition) -> Result<Self> {
        definition.validate()?;

        let weights = &definition.weights;
        let mut outputs = Vec::with_capacity(weights.len());
        for weight in weights {
            let column = definition.outputs.get(weight).ok_or_else(|| {
                Error::Definition(format!("missing output array for candidate {}", weight))
            })?;
            if column.len() < definition.inputs.len() {
                return Err(Error::Definition(format!(
                    "candidate {} has {} outputs but there are {} datapoints",
                    weight,
                    column.len(),
                    definition.inputs.len()
                )));
            }
            outputs.push(column);
        }

        let pairs_per_datapoint = weights.len() * (weights.len() - 1) / 2;
        let mut tasks = Vec::with_capacity(definition.inputs.len() * pairs_per_datapoint);

        for (dp_idx, datapoint) in definition.inputs.iter().enumerate() {
            for i in 0..weights.len() {
                for j in (i + 1)..weights.len() {
                    tasks.push(Task {
                        index: tasks.len(),
                        datapoint_id: datapoint.id.clone(),
                        input: datapoint.input.clone(),
                        left_weight: weights[i].clone(),
                        right_weight: weights[j].clone(),
                        left_output: outputs[i][dp_idx].clone(),
                        right_output: outputs[j][dp_idx].clone(),
                    });
                }
            }
        }

        info!(
            "Built task set: {} tasks ({} datapoints x {} pairs)",
            tasks.len(),
            definition.inputs.len(),
            pairs_per_datapoint
        );

        Ok(Self { tasks })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}
