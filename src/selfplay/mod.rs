pub mod batch;
pub mod batch_manager;
pub mod worker;

pub use batch::{RequestBatch, ResponseBatch};
pub use batch_manager::{BatchManager, WorkerLink};
pub use worker::{Worker, WorkerSummary};
