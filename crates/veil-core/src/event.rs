//! Compute events delivered asynchronously by the network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::NamedValues;
use crate::error::{Result, VeilError};
use crate::types::ComputeId;

/// Output party name -> values revealed to that party.
pub type ResultBindings = BTreeMap<String, NamedValues>;

/// Terminal notification of a compute job's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputeEvent {
    Finished {
        compute_id: ComputeId,
        results: ResultBindings,
    },
    Failed {
        compute_id: ComputeId,
        cause: String,
    },
}

impl ComputeEvent {
    /// The compute id this event settles.
    pub fn compute_id(&self) -> ComputeId {
        match self {
            ComputeEvent::Finished { compute_id, .. } | ComputeEvent::Failed { compute_id, .. } => {
                *compute_id
            }
        }
    }

    pub fn into_outcome(self) -> ComputeOutcome {
        match self {
            ComputeEvent::Finished { results, .. } => ComputeOutcome::Finished { results },
            ComputeEvent::Failed { cause, .. } => ComputeOutcome::Failed { cause },
        }
    }
}

/// What waiting on a compute id yields.
///
/// A failed computation is a completed protocol exchange, not an error of the
/// client; use [`into_result`](Self::into_result) to treat it as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeOutcome {
    Finished { results: ResultBindings },
    Failed { cause: String },
}

impl ComputeOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, ComputeOutcome::Finished { .. })
    }

    pub fn into_result(self, compute_id: ComputeId) -> Result<ResultBindings> {
        match self {
            ComputeOutcome::Finished { results } => Ok(results),
            ComputeOutcome::Failed { cause } => {
                Err(VeilError::ComputationFailed { compute_id, cause })
            }
        }
    }
}
