pub mod factory;
pub mod registry;
pub mod tracker;

pub use factory::{create_registry, create_tracker};
pub use registry::{
    load_model, FileModelRegistry, HttpModelRegistry, ModelLoadOutcome, ModelRegistry, ModelSource,
};
pub use tracker::{FileTracker, InMemoryTracker, NoopTracker};

use crate::error::Result;
use crate::ml::ModelArtifact;

/// Sink for the metrics, parameters and models produced by one training run
pub trait ExperimentTracker: Send + Sync {
    /// Identifier of the current run
    fn run_id(&self) -> &str;

    /// Record a scalar metric; NaN marks an undefined value
    fn log_metric(&self, name: &str, value: f64) -> Result<()>;

    /// Record a hyperparameter or run setting
    fn log_param(&self, name: &str, value: &str) -> Result<()>;

    /// Store a fitted model under `name`
    fn log_model(&self, name: &str, artifact: &ModelArtifact) -> Result<()>;
}
