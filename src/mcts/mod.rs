pub mod episode;
pub mod hyperparameters;
pub mod node;
pub mod sampling;
pub mod selection;

pub use episode::{EvaluationRequest, Episode, TrajectoryStep};
pub use hyperparameters::{SelfPlayConfig, MAX_THREADS};
pub use node::{Node, NodeId, SearchTree};
