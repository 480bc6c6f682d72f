use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

use crate::Result;

/// One row of the per-iteration summary log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub timestamp: String,
    pub iteration: usize,
    pub games: usize,
    pub raw_examples: usize,
    pub unique_examples: usize,
    pub exported_examples: usize,
    pub seconds: f64,
}

impl IterationSummary {
    pub fn now(
        iteration: usize,
        games: usize,
        raw_examples: usize,
        unique_examples: usize,
        exported_examples: usize,
        seconds: f64,
    ) -> Self {
        IterationSummary {
            timestamp: Utc::now().to_rfc3339(),
            iteration,
            games,
            raw_examples,
            unique_examples,
            exported_examples,
            seconds,
        }
    }
}

/// Appends `summary` to the CSV at `path`, writing the header when the file is new.
pub fn append_to_results_file(path: &Path, summary: &IterationSummary) -> Result<()> {
    let file_exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    writer.serialize(summary)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        append_to_results_file(&path, &IterationSummary::now(1, 4, 30, 20, 160, 1.5)).unwrap();
        append_to_results_file(&path, &IterationSummary::now(2, 4, 28, 19, 152, 1.2)).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<IterationSummary> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].iteration, 1);
        assert_eq!(rows[1].exported_examples, 152);
    }
}
