//! Experiment definition loading
//!
//! The definition is a read-only JSON document:
//!
//! ```json
//! {
//!   "weights": ["w1", "w2", "w3"],
//!   "inputs": [
//!     {"id": "dp1", "input": {"text": "A scenic view", "image": "/static/input1.jpg"}}
//!   ],
//!   "outputs": {
//!     "w1": ["/static/dp1_w1.jpg"],
//!     "w2": ["/static/dp1_w2.jpg"],
//!     "w3": ["/static/dp1_w3.jpg"]
//!   }
//! }
//! ```
//!
//! Output arrays are indexed positionally by datapoint order. Cross-checks
//! between `inputs` and `outputs` happen when the task set is built.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// One input item shown to raters alongside the two candidate outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub id: String,
    /// Free-form payload; `text` and `image` keys are rendered when present
    #[serde(default)]
    pub input: Map<String, Value>,
}

impl Datapoint {
    /// Prompt text, if the payload carries one
    pub fn text(&self) -> Option<&str> {
        self.input.get("text").and_then(Value::as_str)
    }

    /// Input image reference, if the payload carries one
    pub fn image(&self) -> Option<&str> {
        self.input.get("image").and_then(Value::as_str)
    }
}

/// Static description of a rating experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    /// Candidate identifiers ("weights"), in enumeration order
    pub weights: Vec<String>,
    /// Datapoints, in presentation order
    pub inputs: Vec<Datapoint>,
    /// Candidate -> output artifact per datapoint (positional)
    pub outputs: HashMap<String, Vec<String>>,
}

impl ExperimentDefinition {
    /// Load and validate a definition file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Definition(format!("failed to read {}: {}", path.display(), e))
        })?;
        let definition = Self::from_json_str(&content)?;

        info!(
            "Loaded experiment definition from {}: {} candidates, {} datapoints",
            path.display(),
            definition.weights.len(),
            definition.inputs.len()
        );

        Ok(definition)
    }

    /// Parse and validate a definition from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(content)
            .map_err(|e| Error::Definition(format!("malformed definition: {}", e)))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Structural checks on the candidate list
    pub fn validate(&self) -> Result<()> {
        if self.weights.len() < 2 {
            return Err(Error::Definition(format!(
                "at least two candidates are required, found {}",
                self.weights.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.weights.len());
        for weight in &self.weights {
            if weight.is_empty() {
                return Err(Error::Definition("empty candidate identifier".to_string()));
            }
            if !seen.insert(weight.as_str()) {
                return Err(Error::Definition(format!(
                    "duplicate candidate identifier: {}",
                    weight
                )));
            }
        }

        Ok(())
    }
}
