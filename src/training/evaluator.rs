//! Evaluator side of the broker
//!
//! The evaluator is polled: a driver loop pulls pending request batches from
//! the `BatchManager`, evaluates them and posts the results back.

use log::{debug, warn};
use std::time::Duration;

use crate::game::BoardEncoding;
use crate::selfplay::{BatchManager, RequestBatch, ResponseBatch};
use crate::{Result, SelfPlayError};

/// Policy/value evaluator, typically a neural network
pub trait Evaluator: Sync {
    /// Evaluates `boards`, returning one policy over the whole action space
    /// and one value per board, in the same order. Values are from the
    /// perspective of the player to move on each board.
    fn evaluate(&self, boards: &[BoardEncoding]) -> Result<(Vec<Vec<f32>>, Vec<f32>)>;
}

/// Uniform policy and zero value for every board.
///
/// Turns self-play into plain visit-count search; used for smoke runs and
/// for generating bootstrap data before a network exists.
#[derive(Debug, Clone, Copy)]
pub struct UniformEvaluator {
    action_size: usize,
}

impl UniformEvaluator {
    pub fn new(action_size: usize) -> Self {
        UniformEvaluator { action_size }
    }
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, boards: &[BoardEncoding]) -> Result<(Vec<Vec<f32>>, Vec<f32>)> {
        let uniform = vec![1.0 / self.action_size as f32; self.action_size];
        Ok((vec![uniform; boards.len()], vec![0.0; boards.len()]))
    }
}

/// Evaluates one request and checks the answer lines up with it.
///
/// Empty requests are answered without calling the evaluator.
pub fn evaluate_batch<E: Evaluator + ?Sized>(
    evaluator: &E,
    request: &RequestBatch,
) -> Result<ResponseBatch> {
    if request.is_empty() {
        return Ok(ResponseBatch::new(request.worker_id, Vec::new(), Vec::new()));
    }
    let (policies, values) = evaluator.evaluate(&request.boards)?;
    let response = ResponseBatch::new(request.worker_id, policies, values);
    response.check_len(request.len())?;
    Ok(response)
}

fn respond<E: Evaluator + ?Sized>(
    manager: &BatchManager,
    evaluator: &E,
    request: RequestBatch,
) -> Result<()> {
    let response = evaluate_batch(evaluator, &request)?;
    match manager.deliver(response) {
        Err(SelfPlayError::Disconnected) => {
            // The worker already exited; its own error surfaces on join
            warn!("worker {} is gone, dropping its results", request.worker_id);
            Ok(())
        }
        other => other,
    }
}

/// Answers every request batch currently queued; returns how many.
pub fn serve_pending<E: Evaluator + ?Sized>(
    manager: &BatchManager,
    evaluator: &E,
) -> Result<usize> {
    let mut served = 0;
    while manager.size() > 0 {
        let request = match manager.next_pending() {
            Ok(request) => request,
            Err(SelfPlayError::NoBatchAvailable) => break,
            Err(e) => return Err(e),
        };
        respond(manager, evaluator, request)?;
        served += 1;
    }
    Ok(served)
}

/// Serves requests until every worker has exited and the queue is drained.
///
/// Blocks up to `idle` at a time while the queue is empty.
pub fn drive_until_done<E: Evaluator + ?Sized>(
    manager: &BatchManager,
    evaluator: &E,
    idle: Duration,
) -> Result<usize> {
    let mut served = 0;
    loop {
        served += serve_pending(manager, evaluator)?;
        if manager.workers_finished() && manager.size() == 0 {
            break;
        }
        if let Some(request) = manager.next_pending_timeout(idle)? {
            respond(manager, evaluator, request)?;
            served += 1;
        }
    }
    debug!("evaluator driver served {} batches", served);
    Ok(served)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Answers one board too few
    struct ShortEvaluator;

    impl Evaluator for ShortEvaluator {
        fn evaluate(&self, boards: &[BoardEncoding]) -> Result<(Vec<Vec<f32>>, Vec<f32>)> {
            let n = boards.len().saturating_sub(1);
            Ok((vec![vec![0.0; 9]; n], vec![0.0; n]))
        }
    }

    #[test]
    fn test_uniform_evaluator() {
        let (policies, values) = UniformEvaluator::new(9)
            .evaluate(&[vec![0; 9], vec![1; 9]])
            .unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(values, vec![0.0, 0.0]);
        assert!((policies[0].iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_request_skips_evaluator() {
        let response = evaluate_batch(&ShortEvaluator, &RequestBatch::new(2, Vec::new())).unwrap();
        assert_eq!(response.worker_id, 2);
        assert!(response.is_empty());
    }

    #[test]
    fn test_misaligned_evaluator_is_rejected() {
        let request = RequestBatch::new(0, vec![vec![0; 9]; 3]);
        assert_matches!(
            evaluate_batch(&ShortEvaluator, &request),
            Err(SelfPlayError::BatchLength { expected: 3, got: 2 })
        );
    }

    #[test]
    fn test_serve_pending_delivers_to_each_worker() {
        let manager = BatchManager::new(2, Duration::from_secs(1));
        let link0 = manager.worker_link(0).unwrap();
        let link1 = manager.worker_link(1).unwrap();
        link1.submit(RequestBatch::new(1, vec![vec![0; 9]; 2])).unwrap();
        link0.submit(RequestBatch::new(0, vec![vec![0; 9]])).unwrap();

        assert_eq!(serve_pending(&manager, &UniformEvaluator::new(9)).unwrap(), 2);
        assert_eq!(manager.size(), 0);
        assert_eq!(link0.await_result().unwrap().len(), 1);
        assert_eq!(link1.await_result().unwrap().len(), 2);
    }
}
