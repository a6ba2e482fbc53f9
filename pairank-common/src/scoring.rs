//! Additive pairwise vote scoring
//!
//! | left | right | effect |
//! |------|-------|--------|
//! | yes  | no    | left +1, right -1 |
//! | no   | yes   | left -1, right +1 |
//! | yes  | yes   | left +1, right +1 |
//! | no   | no    | left -1, right -1 |

use crate::{Error, Result};
use std::collections::BTreeMap;

/// A rater's binary preference on one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub left_selected: bool,
    pub right_selected: bool,
}

impl Vote {
    pub fn new(left_selected: bool, right_selected: bool) -> Self {
        Self {
            left_selected,
            right_selected,
        }
    }

    /// Parse the `"0"`/`"1"` form fields sent by the task page
    pub fn from_form(left_selected: &str, right_selected: &str) -> Result<Self> {
        Ok(Self::new(
            parse_selection("left_selected", left_selected)?,
            parse_selection("right_selected", right_selected)?,
        ))
    }

    /// Score change for (left, right)
    pub fn deltas(&self) -> (i64, i64) {
        (delta(self.left_selected), delta(self.right_selected))
    }
}

fn delta(selected: bool) -> i64 {
    if selected {
        1
    } else {
        -1
    }
}

fn parse_selection(field: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(Error::InvalidInput(format!(
            "{} must be \"0\" or \"1\", got {:?}",
            field, other
        ))),
    }
}

/// Apply a vote to the score map
///
/// Both candidates are checked before anything is modified, so a rejected
/// vote leaves the map untouched.
pub fn apply_vote(
    scores: &mut BTreeMap<String, i64>,
    left: &str,
    right: &str,
    vote: Vote,
) -> Result<()> {
    for candidate in [left, right] {
        if !scores.contains_key(candidate) {
            return Err(Error::InvalidInput(format!("unknown candidate: {}", candidate)));
        }
    }
    if left == right {
        return Err(Error::InvalidInput(format!(
            "a vote needs two distinct candidates, got {} twice",
            left
        )));
    }

    let (left_delta, right_delta) = vote.deltas();
    if let Some(score) = scores.get_mut(left) {
        *score += left_delta;
    }
    if let Some(score) = scores.get_mut(right) {
        *score += right_delta;
    }
    Ok(())
}
