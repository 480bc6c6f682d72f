//! # Self-Play Zero
//!
//! Batched self-play for two-player board games, driven by Monte Carlo Tree
//! Search and an external policy/value evaluator.
//!
//! ## Features
//!
//! - **Game Engine**: rules-engine trait plus Tic-Tac-Toe and Ultimate Tic-Tac-Toe
//! - **Search Engine**: arena-backed PUCT search with a two-phase evaluation protocol
//! - **Self-Play Workers**: lock-step episodes per thread, one evaluation batch per step
//! - **Batch Broker**: channel-based routing between workers and the evaluator
//! - **Training Export**: canonicalized, deduplicated, symmetry-augmented examples
//!
//! ## Usage
//!
//! ```rust,no_run
//! use selfplay_zero::{
//!     game::TicTacToe,
//!     mcts::SelfPlayConfig,
//!     training::{learn, UniformEvaluator},
//! };
//!
//! let config = SelfPlayConfig::default();
//! let evaluator = UniformEvaluator::new(9);
//! let out_dir = std::path::Path::new("selfplay_data");
//! let reports = learn::<TicTacToe, _>(&config, &evaluator, 1, out_dir, None)?;
//! # Ok::<(), selfplay_zero::SelfPlayError>(())
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Rules engines consumed by the search
pub mod game;

/// Monte Carlo Tree Search: tree, selection, episodes, sampling
pub mod mcts;

/// Worker threads and the evaluation batch broker
pub mod selfplay;

/// Training example history, canonicalization and export
pub mod data;

/// Evaluator boundary and self-play iteration driver
pub mod training;

/// Logger setup shared by the binary
pub mod logging;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use data::{TrainingExample, TrainingExampleHistory};
pub use game::{BoardEncoding, Game, GameStatus, Player};
pub use mcts::{Episode, SelfPlayConfig};
pub use selfplay::{BatchManager, RequestBatch, ResponseBatch, Worker};
pub use training::{Evaluator, UniformEvaluator};

// ============================================================================
// ERROR TYPES
// ============================================================================

use std::time::Duration;

/// Main error type for the self-play library
#[derive(Debug, thiserror::Error)]
pub enum SelfPlayError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("node has no legal actions but is not terminal")]
    NoLegalActions,

    #[error("policy length mismatch: expected {expected}, got {got}")]
    PolicyLength { expected: usize, got: usize },

    #[error("result batch length mismatch: expected {expected}, got {got}")]
    BatchLength { expected: usize, got: usize },

    #[error("no pending batch available")]
    NoBatchAvailable,

    #[error("unknown worker id {0}")]
    UnknownWorker(usize),

    #[error("inbox of worker {0} already taken")]
    InboxTaken(usize),

    #[error("worker {worker_id} waited {waited:?} without receiving an evaluation")]
    EvaluationTimeout { worker_id: usize, waited: Duration },

    #[error("batch channel disconnected")]
    Disconnected,

    #[error("illegal action {0}")]
    InvalidAction(usize),

    #[error("evaluation requested while a previous one is still pending")]
    EvaluationPending,

    #[error("no evaluation was requested")]
    NoPendingEvaluation,

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SelfPlayError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
