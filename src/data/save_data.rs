use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::training_example::TrainingExample;
use crate::Result;

/// Line format: the example's own fields plus the blended value target
#[derive(Serialize)]
struct ExportRecord<'a> {
    #[serde(flatten)]
    example: &'a TrainingExample,
    value: f32,
}

/// History line format: the example tagged with the iteration that produced it
#[derive(Serialize)]
struct HistoryRecord<'a> {
    iteration: usize,
    #[serde(flatten)]
    example: &'a TrainingExample,
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes a training set as JSON lines, one example per line, replacing
/// any existing file. Each line also carries `value`, the target blended
/// with `percent_q` (see `TrainingExample::value_target`).
pub fn save_training_set(
    path: &Path,
    examples: &[TrainingExample],
    percent_q: f32,
) -> Result<()> {
    let mut writer = create_file(path)?;
    for example in examples {
        let record = ExportRecord {
            example,
            value: example.value_target(percent_q),
        };
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!("saved {} training examples to {}", examples.len(), path.display());
    Ok(())
}

/// Writes the history buckets, most recent first, as JSON lines. Bucket `k`
/// (counting from 0) is tagged with iteration `latest_iteration - k`.
pub fn save_history(
    path: &Path,
    latest_iteration: usize,
    buckets: &[Vec<TrainingExample>],
) -> Result<()> {
    let mut writer = create_file(path)?;
    let mut written = 0;
    for (age, bucket) in buckets.iter().enumerate() {
        let iteration = latest_iteration.saturating_sub(age);
        for example in bucket {
            serde_json::to_writer(&mut writer, &HistoryRecord { iteration, example })?;
            writer.write_all(b"\n")?;
            written += 1;
        }
    }
    writer.flush()?;

    info!(
        "saved {} history buckets ({} examples) to {}",
        buckets.len(),
        written,
        path.display()
    );
    Ok(())
}
