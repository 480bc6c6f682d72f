//! Rolling history of self-play iterations
//!
//! Workers append finished games to the current iteration concurrently. At
//! the end of an iteration the accumulated examples become a new bucket at
//! the front of the history; exports merge the most recent buckets.

use log::{debug, info};
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use crate::data::augmentation::SymmetryTable;
use crate::data::canonical::{canonicalize, merge_duplicate, symmetric_variants};
use crate::data::training_example::TrainingExample;
use crate::game::{BoardEncoding, EncodingLayout};

pub struct TrainingExampleHistory {
    /// Examples of the iteration in progress
    current: Mutex<Vec<TrainingExample>>,
    /// Finished iterations, most recent first
    buckets: Mutex<VecDeque<Vec<TrainingExample>>>,
    table: SymmetryTable,
}

impl TrainingExampleHistory {
    pub fn new(layout: &EncodingLayout) -> Self {
        TrainingExampleHistory {
            current: Mutex::new(Vec::new()),
            buckets: Mutex::new(VecDeque::new()),
            table: SymmetryTable::new(layout),
        }
    }

    /// Adds the examples of one finished game to the current iteration
    pub fn record_game(&self, examples: Vec<TrainingExample>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.extend(examples);
    }

    /// Examples recorded since the last `save_iteration`
    pub fn current_len(&self) -> usize {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Copy of the examples recorded since the last `save_iteration`, in
    /// the order games were recorded
    pub fn current_examples(&self) -> Vec<TrainingExample> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Closes the current iteration into a new bucket and returns its size
    pub fn save_iteration(&self) -> usize {
        let bucket = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *current)
        };
        let size = bucket.len();
        self.push_bucket(bucket);
        size
    }

    pub fn push_bucket(&self, bucket: Vec<TrainingExample>) {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.push_front(bucket);
    }

    /// Drops buckets beyond the `max_iterations` most recent, oldest first
    pub fn retain(&self, max_iterations: usize) {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        while buckets.len() > max_iterations {
            if let Some(dropped) = buckets.pop_back() {
                debug!("dropping history bucket of {} examples", dropped.len());
            }
        }
    }

    /// Copy of the buckets, most recent first
    pub fn buckets(&self) -> Vec<Vec<TrainingExample>> {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.iter().cloned().collect()
    }

    /// Number of buckets held
    pub fn len(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonicalizes the `max_iterations` most recent buckets and merges
    /// duplicate boards, in first-seen order.
    pub fn deduplicated(&self, max_iterations: usize) -> Vec<TrainingExample> {
        let canonical: Vec<TrainingExample> = {
            let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            let raw: Vec<&TrainingExample> =
                buckets.iter().take(max_iterations).flatten().collect();
            raw.par_iter().map(|e| canonicalize(&self.table, e)).collect()
        };

        let mut unique: Vec<TrainingExample> = Vec::new();
        let mut index: HashMap<BoardEncoding, usize> = HashMap::new();
        for example in canonical {
            match index.get(&example.board) {
                Some(&slot) => merge_duplicate(&mut unique[slot], &example),
                None => {
                    index.insert(example.board.clone(), unique.len());
                    unique.push(example);
                }
            }
        }
        unique
    }

    /// Training set for the learner: the deduplicated examples of the
    /// `max_iterations` most recent buckets, each expanded into its eight
    /// symmetric variants.
    pub fn export_training_set(&self, max_iterations: usize) -> Vec<TrainingExample> {
        let unique = self.deduplicated(max_iterations);
        let exported: Vec<TrainingExample> = unique
            .par_iter()
            .flat_map_iter(|e| symmetric_variants(&self.table, e))
            .collect();
        info!(
            "exported {} examples from {} unique positions",
            exported.len(),
            unique.len()
        );
        exported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Game, TicTacToe};

    fn history() -> TrainingExampleHistory {
        TrainingExampleHistory::new(&TicTacToe::layout())
    }

    /// Single stone at `cell`, tagged through `q` so buckets can be told apart
    fn tagged(cell: usize, tag: f32) -> TrainingExample {
        let mut board = vec![0; 9];
        board[cell] = 1;
        TrainingExample::new(board, 1.0, tag, vec![1.0 / 9.0; 9])
    }

    #[test]
    fn test_save_iteration_moves_current_into_bucket() {
        let history = history();
        history.record_game(vec![tagged(0, 0.0), tagged(4, 0.0)]);
        history.record_game(vec![tagged(1, 0.0)]);
        assert_eq!(history.current_len(), 3);

        assert_eq!(history.save_iteration(), 3);
        assert_eq!(history.current_len(), 0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_symmetric_duplicates_merge() {
        let history = history();
        // Four corners are one canonical position
        history.push_bucket(vec![
            tagged(0, 0.0),
            tagged(2, 0.0),
            tagged(6, 0.0),
            tagged(8, 0.0),
        ]);
        history.push_bucket(vec![tagged(4, 0.0)]);

        let unique = history.deduplicated(2);
        assert_eq!(unique.len(), 2);
        let corner = unique.iter().find(|e| e.board[4] == 0).unwrap();
        assert_eq!(corner.times_seen, 4);

        assert_eq!(history.export_training_set(2).len(), 16);
    }

    #[test]
    fn test_export_window_after_retention() {
        let history = history();
        for k in 0..5 {
            // Each bucket holds a distinct position, tagged with its iteration
            history.push_bucket(vec![tagged([0, 1, 4, 0, 1][k], k as f32)]);
            history.retain(2);
        }
        assert_eq!(history.len(), 2);
        let kept = history.buckets();
        assert_eq!(kept[0][0].q, 4.0);
        assert_eq!(kept[1][0].q, 3.0);

        let exported = history.export_training_set(2);
        assert_eq!(exported.len(), 16);
        assert!(exported.iter().all(|e| e.q == 3.0 || e.q == 4.0));

        // A window larger than the history uses what is there
        assert_eq!(history.export_training_set(10).len(), 16);
    }
}
