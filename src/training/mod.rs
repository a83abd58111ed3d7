pub mod pipeline;

pub use pipeline::{train_and_log_model, CandidateReport, RegistryTarget, TrainingOutcome};
