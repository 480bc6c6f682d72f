//! Self-play iterations end to end: spawn workers, serve their evaluations,
//! then fold the finished games into the history and export a training set.

use log::info;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data::append_result::{append_to_results_file, IterationSummary};
use crate::data::augmentation::Symmetry;
use crate::data::load_data::load_history;
use crate::data::save_data::{save_history, save_training_set};
use crate::data::TrainingExampleHistory;
use crate::game::Game;
use crate::mcts::SelfPlayConfig;
use crate::selfplay::{BatchManager, WorkerSummary};
use crate::training::evaluator::{drive_until_done, Evaluator};
use crate::Result;

/// How long the evaluator driver blocks on an empty queue between checks
const DRIVER_IDLE: Duration = Duration::from_millis(5);

/// Retained history buckets, rewritten after every iteration
pub const HISTORY_FILE: &str = "history.jsonl";

/// Outcome of one `learn` iteration
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: usize,
    pub games: usize,
    pub raw_examples: usize,
    pub unique_examples: usize,
    pub exported_examples: usize,
    pub seconds: f64,
    pub workers: Vec<WorkerSummary>,
}

/// Plays `num_threads × batch_size` games, recording them into `history`'s
/// current iteration.
pub fn run_iteration<G: Game, E: Evaluator + ?Sized>(
    config: &SelfPlayConfig,
    evaluator: &E,
    history: &Arc<TrainingExampleHistory>,
) -> Result<Vec<WorkerSummary>> {
    config.validate()?;

    let manager = BatchManager::new(config.num_threads, config.evaluation_timeout());
    manager.spawn_workers::<G>(config, Arc::clone(history))?;

    // Join even when the driver failed so no worker outlives the iteration
    let driven = drive_until_done(&manager, evaluator, DRIVER_IDLE);
    let joined = manager.join();
    let served = driven?;
    let summaries = joined?;

    info!(
        "iteration finished: {} games, {} batches served",
        manager.completed_games(),
        served
    );
    Ok(summaries)
}

/// Refills `history` from a file written by a previous `learn` run and
/// returns the latest iteration it held (0 when there was nothing).
pub fn restore_history(
    history: &TrainingExampleHistory,
    path: &Path,
    history_window: usize,
) -> Result<usize> {
    let loaded = load_history(path)?;
    let latest = loaded.last().map(|(iteration, _)| *iteration).unwrap_or(0);
    for (_, bucket) in loaded {
        history.push_bucket(bucket);
    }
    history.retain(history_window);
    info!(
        "resuming after iteration {} with {} history buckets from {}",
        latest,
        history.len(),
        path.display()
    );
    Ok(latest)
}

/// Runs `iterations` rounds of self-play.
///
/// After each round the new games become a history bucket, the history is
/// trimmed to `history_window` and saved to `<out_dir>/history.jsonl`, and
/// the training set over `export_window` is written to
/// `<out_dir>/iteration_<k>.jsonl`. A summary row per round is appended to
/// `<out_dir>/results.csv`.
///
/// With `resume`, the history saved by an earlier run is loaded first and
/// iteration numbering continues after its latest bucket.
pub fn learn<G: Game, E: Evaluator + ?Sized>(
    config: &SelfPlayConfig,
    evaluator: &E,
    iterations: usize,
    out_dir: &Path,
    resume: Option<&Path>,
) -> Result<Vec<IterationReport>> {
    config.validate()?;
    fs::create_dir_all(out_dir)?;
    info!("self-play config: {}", config.to_config_string());

    let history = Arc::new(TrainingExampleHistory::new(&G::layout()));
    let previous = match resume {
        Some(path) => restore_history(&history, path, config.history_window)?,
        None => 0,
    };
    let results_path = out_dir.join("results.csv");
    let history_path = out_dir.join(HISTORY_FILE);
    let mut reports = Vec::with_capacity(iterations);

    for iteration in previous + 1..=previous + iterations {
        info!(
            "starting self-play iteration {} ({} of {})",
            iteration,
            iteration - previous,
            iterations
        );
        let start = Instant::now();

        let workers = run_iteration::<G, E>(config, evaluator, &history)?;
        let raw_examples = history.save_iteration();
        history.retain(config.history_window);
        save_history(&history_path, iteration, &history.buckets())?;
        let exported = history.export_training_set(config.export_window);
        let unique_examples = exported.len() / Symmetry::all().len();
        let path = out_dir.join(format!("iteration_{}.jsonl", iteration));
        save_training_set(&path, &exported, config.percent_q)?;

        let report = IterationReport {
            iteration,
            games: workers.iter().map(|w| w.games).sum(),
            raw_examples,
            unique_examples,
            exported_examples: exported.len(),
            seconds: start.elapsed().as_secs_f64(),
            workers,
        };
        append_to_results_file(
            &results_path,
            &IterationSummary::now(
                report.iteration,
                report.games,
                report.raw_examples,
                report.unique_examples,
                report.exported_examples,
                report.seconds,
            ),
        )?;
        info!(
            "iteration {}: {} games, {} raw / {} unique / {} exported examples in {:.1}s",
            report.iteration,
            report.games,
            report.raw_examples,
            report.unique_examples,
            report.exported_examples,
            report.seconds
        );
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainingExample;
    use crate::game::TicTacToe;

    fn bucket(cell: usize) -> Vec<TrainingExample> {
        let mut board = vec![0; 9];
        board[cell] = 1;
        vec![TrainingExample::new(board, 1.0, cell as f32, vec![1.0 / 9.0; 9])]
    }

    #[test]
    fn test_restore_history_respects_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE);
        save_history(&path, 5, &[bucket(4), bucket(1), bucket(0)]).unwrap();

        let history = TrainingExampleHistory::new(&TicTacToe::layout());
        assert_eq!(restore_history(&history, &path, 2).unwrap(), 5);

        // The oldest bucket (iteration 3) falls outside the window
        let buckets = history.buckets();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0], bucket(4));
        assert_eq!(buckets[1], bucket(1));
    }

    #[test]
    fn test_restore_from_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let history = TrainingExampleHistory::new(&TicTacToe::layout());
        assert_eq!(restore_history(&history, &dir.path().join(HISTORY_FILE), 4).unwrap(), 0);
        assert!(history.is_empty());
    }
}
