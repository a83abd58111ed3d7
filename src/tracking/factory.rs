use super::{
    ExperimentTracker, FileModelRegistry, FileTracker, HttpModelRegistry, ModelRegistry,
    NoopTracker,
};
use crate::config::{RegistryBackend, RegistryConfig, TrackingConfig};
use crate::error::{AppError, Result};
use tracing::info;

/// Create the experiment tracker selected by configuration
pub fn create_tracker(config: &TrackingConfig) -> Result<Box<dyn ExperimentTracker>> {
    if !config.enabled {
        info!("Experiment tracking disabled");
        return Ok(Box::new(NoopTracker));
    }

    Ok(Box::new(FileTracker::new(&config.dir, &config.experiment)?))
}

/// Create the model registry selected by configuration, if enabled
pub fn create_registry(config: &RegistryConfig) -> Result<Option<Box<dyn ModelRegistry>>> {
    if !config.enabled {
        return Ok(None);
    }

    let registry: Box<dyn ModelRegistry> = match config.backend {
        RegistryBackend::File => Box::new(FileModelRegistry::new(&config.path)),
        RegistryBackend::Http => {
            let url = config.url.as_deref().ok_or_else(|| {
                AppError::Configuration("registry.url is required for the http backend".to_string())
            })?;
            Box::new(HttpModelRegistry::new(url)?)
        }
    };

    info!(backend = ?config.backend, location = %registry.location(), "Model registry configured");
    Ok(Some(registry))
}
