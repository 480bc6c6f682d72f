pub mod evaluator;
pub mod session;

pub use evaluator::{
    drive_until_done, evaluate_batch, serve_pending, Evaluator, UniformEvaluator,
};
pub use session::{learn, restore_history, run_iteration, IterationReport, HISTORY_FILE};
