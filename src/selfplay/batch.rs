use serde::{Deserialize, Serialize};

use crate::game::BoardEncoding;
use crate::{Result, SelfPlayError};

/// Boards one worker needs evaluated for the current simulation step.
///
/// May be empty when every live episode hit a terminal leaf; it is still
/// submitted so the worker's request/response sequence stays in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBatch {
    pub worker_id: usize,
    pub boards: Vec<BoardEncoding>,
}

impl RequestBatch {
    pub fn new(worker_id: usize, boards: Vec<BoardEncoding>) -> Self {
        RequestBatch { worker_id, boards }
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}

/// Evaluator output for a `RequestBatch`, aligned with its boards by position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBatch {
    pub worker_id: usize,
    pub policies: Vec<Vec<f32>>,
    pub values: Vec<f32>,
}

impl ResponseBatch {
    pub fn new(worker_id: usize, policies: Vec<Vec<f32>>, values: Vec<f32>) -> Self {
        ResponseBatch {
            worker_id,
            policies,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Checks that both sequences answer exactly `expected` boards
    pub fn check_len(&self, expected: usize) -> Result<()> {
        for got in [self.policies.len(), self.values.len()] {
            if got != expected {
                return Err(SelfPlayError::BatchLength { expected, got });
            }
        }
        Ok(())
    }
}
