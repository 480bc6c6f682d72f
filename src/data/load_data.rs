use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::data::training_example::TrainingExample;
use crate::Result;

#[derive(Deserialize)]
struct HistoryRecord {
    iteration: usize,
    #[serde(flatten)]
    example: TrainingExample,
}

/// One record per non-blank line; a missing file yields no records
fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!("'{}' not found, returning nothing", path.display());
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Reads a JSON-lines training set written by `save_training_set`.
///
/// A missing file yields an empty set; blank lines are skipped.
pub fn load_training_set(path: &Path) -> Result<Vec<TrainingExample>> {
    read_json_lines(path)
}

/// Reads history buckets written by `save_history`, oldest iteration
/// first, each paired with its iteration tag.
pub fn load_history(path: &Path) -> Result<Vec<(usize, Vec<TrainingExample>)>> {
    let mut buckets: BTreeMap<usize, Vec<TrainingExample>> = BTreeMap::new();
    for record in read_json_lines::<HistoryRecord>(path)? {
        buckets.entry(record.iteration).or_default().push(record.example);
    }
    info!("loaded {} history buckets from {}", buckets.len(), path.display());
    Ok(buckets.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::save_data::{save_history, save_training_set};

    fn example(cell: usize) -> TrainingExample {
        let mut board = vec![0; 9];
        board[cell] = 1;
        TrainingExample::new(board, -1.0, 0.0, vec![1.0 / 9.0; 9])
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("set.jsonl");
        let mut merged =
            TrainingExample::new(vec![1, -1, 0, 0, 0, 0, 0, 0, 0], 0.5, -0.25, vec![0.5; 2]);
        merged.times_seen = 3;
        let examples = vec![
            TrainingExample::new(vec![0; 9], 1.0, 0.1, vec![0.25; 4]),
            merged,
        ];

        save_training_set(&path, &examples, 0.5).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert!((first["value"].as_f64().unwrap() - 0.55).abs() < 1e-6);
        assert_eq!(load_training_set(&path).unwrap(), examples);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_training_set(&dir.path().join("absent.jsonl")).unwrap().is_empty());
    }

    #[test]
    fn test_history_buckets_keep_their_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        // Most recent first, as the history holds them
        let buckets = vec![vec![example(4)], vec![example(0), example(1)], vec![]];

        save_history(&path, 7, &buckets).unwrap();
        let loaded = load_history(&path).unwrap();

        // Empty buckets leave no lines behind
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], (6, vec![example(0), example(1)]));
        assert_eq!(loaded[1], (7, vec![example(4)]));

        // History lines still read as plain examples
        assert_eq!(load_training_set(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_history(&dir.path().join("absent.jsonl")).unwrap().is_empty());
    }
}
