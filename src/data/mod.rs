pub mod append_result;
pub mod augmentation;
pub mod canonical;
pub mod history;
pub mod load_data;
pub mod save_data;
pub mod training_example;

pub use history::TrainingExampleHistory;
pub use training_example::TrainingExample;
